//! US-equity market clock.
//!
//! Every check converts the UTC instant into the exchange timezone (US
//! Eastern) first, so daylight saving is handled by the timezone database
//! rather than a fixed offset.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

/// Whether the cash session is open at the given instant.
///
/// Open on weekdays from 09:00:00 through 16:00:00 local time, inclusive.
/// The morning boundary is hour-granular, so 09:00-09:29 already counts as
/// open; the close is exact, with 16:00:00 the last open second.
pub fn is_open(instant: DateTime<Utc>) -> bool {
    let local = instant.with_timezone(&Eastern);

    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let after_open = local.hour() >= 9;
    let before_close =
        local.hour() < 16 || (local.hour() == 16 && local.minute() == 0 && local.second() == 0);

    after_open && before_close
}

/// Format an instant as the exchange-local timestamp carried by price
/// points, e.g. `3/18/2024, 9:30:05 AM`.
pub fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Eastern)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}
