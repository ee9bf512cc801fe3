//! Closed-form European call valuation.
//!
//! The standard normal CDF is computed via the Abramowitz & Stegun 7.1.26
//! rational approximation of erf (max absolute error ~1.5e-7). The
//! coefficients are fixed so priced values stay reproducible across builds.

use crate::error::DomainError;

/// Black-Scholes price of a European call option.
///
/// # Arguments
/// * `underlying` - Current trade price of the underlying
/// * `strike` - Strike price of the option
/// * `time_to_expiration` - Time to expiration in years
/// * `risk_free_rate` - Annualised risk-free interest rate (e.g., 0.05 for 5%)
/// * `volatility` - Annualised volatility (e.g., 0.20 for 20%)
///
/// Fails when volatility or expiry are non-positive, which leave `d1`
/// undefined; callers treat that as a per-tick skip rather than a fatal
/// condition.
pub fn call_price(
    underlying: f64,
    strike: f64,
    time_to_expiration: f64,
    risk_free_rate: f64,
    volatility: f64,
) -> Result<f64, DomainError> {
    if volatility <= 0.0 {
        return Err(DomainError::NonPositiveVolatility(volatility));
    }
    if time_to_expiration <= 0.0 {
        return Err(DomainError::NonPositiveExpiry(time_to_expiration));
    }

    let sqrt_t = time_to_expiration.sqrt();
    let d1 = ((underlying / strike).ln()
        + (risk_free_rate + 0.5 * volatility * volatility) * time_to_expiration)
        / (volatility * sqrt_t);
    let d2 = d1 - volatility * sqrt_t;

    let discount_factor = (-risk_free_rate * time_to_expiration).exp();

    Ok(underlying * norm_cdf(d1) - strike * discount_factor * norm_cdf(d2))
}

/// Cumulative distribution function for the standard normal distribution.
///
/// Φ(x) = 0.5 * (1 + erf(x/√2))
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function via the Abramowitz & Stegun 7.1.26 polynomial
/// approximation.
fn erf(x: f64) -> f64 {
    // Fixed approximation coefficients
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = x.signum();
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_cdf_at_zero() {
        // The approximation holds the documented error bound at the origin
        assert!((norm_cdf(0.0) - 0.5).abs() < 1.5e-7);
    }

    #[test]
    fn test_norm_cdf_known_values() {
        struct TestCase {
            input: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0
                input: 1.0,
                expected: 0.8413447,
            },
            TestCase {
                // TC1
                input: -1.0,
                expected: 0.1586553,
            },
            TestCase {
                // TC2
                input: 2.0,
                expected: 0.9772499,
            },
            TestCase {
                // TC3
                input: -2.0,
                expected: 0.0227501,
            },
            TestCase {
                // TC4
                input: 0.5,
                expected: 0.6914625,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = norm_cdf(test.input);
            assert!(
                (actual - test.expected).abs() < 1e-6,
                "TC{} failed: {} vs {}",
                index,
                actual,
                test.expected
            );
        }
    }

    #[test]
    fn test_erf_antisymmetric() {
        for x in [0.5, 1.0, 2.0, 3.5] {
            assert_eq!(erf(-x), -erf(x));
        }
    }

    #[test]
    fn test_call_price_reference_values() {
        struct TestCase {
            underlying: f64,
            strike: f64,
            time_to_expiration: f64,
            risk_free_rate: f64,
            volatility: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: default streamed contract, at the money
                underlying: 100.0,
                strike: 100.0,
                time_to_expiration: 0.25,
                risk_free_rate: 0.015,
                volatility: 0.20,
                expected: 4.1702,
            },
            TestCase {
                // TC1: standard test case from the literature
                underlying: 100.0,
                strike: 100.0,
                time_to_expiration: 1.0,
                risk_free_rate: 0.05,
                volatility: 0.20,
                expected: 10.4506,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = call_price(
                test.underlying,
                test.strike,
                test.time_to_expiration,
                test.risk_free_rate,
                test.volatility,
            )
            .unwrap();
            assert!(
                (actual - test.expected).abs() < 1e-3,
                "TC{} failed: {} vs {}",
                index,
                actual,
                test.expected
            );
        }
    }

    #[test]
    fn test_call_price_deep_in_the_money() {
        // Deep ITM value converges to the discounted intrinsic value
        let price = call_price(150.0, 100.0, 0.25, 0.015, 0.20).unwrap();
        let forward_intrinsic = 150.0 - 100.0 * (-0.015_f64 * 0.25).exp();
        assert!((price - forward_intrinsic).abs() < 1e-2);
    }

    #[test]
    fn test_call_price_increases_with_underlying() {
        let lower = call_price(95.0, 100.0, 0.25, 0.015, 0.20).unwrap();
        let higher = call_price(105.0, 100.0, 0.25, 0.015, 0.20).unwrap();
        assert!(higher > lower);
    }

    #[test]
    fn test_call_price_rejects_invalid_inputs() {
        struct TestCase {
            time_to_expiration: f64,
            volatility: f64,
            expected: DomainError,
        }

        let tests = vec![
            TestCase {
                // TC0: zero volatility
                time_to_expiration: 0.25,
                volatility: 0.0,
                expected: DomainError::NonPositiveVolatility(0.0),
            },
            TestCase {
                // TC1: negative volatility
                time_to_expiration: 0.25,
                volatility: -0.2,
                expected: DomainError::NonPositiveVolatility(-0.2),
            },
            TestCase {
                // TC2: expired contract
                time_to_expiration: 0.0,
                volatility: 0.2,
                expected: DomainError::NonPositiveExpiry(0.0),
            },
            TestCase {
                // TC3: negative expiry
                time_to_expiration: -1.0,
                volatility: 0.2,
                expected: DomainError::NonPositiveExpiry(-1.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = call_price(
                100.0,
                100.0,
                test.time_to_expiration,
                0.015,
                test.volatility,
            )
            .unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
