use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One priced tick: the underlying trade price and the theoretical option
/// value computed from it, stamped with the exchange-local time.
#[derive(Debug, Clone, PartialEq, Constructor, Deserialize, Serialize)]
pub struct PricePoint {
    /// Exchange-local timestamp, formatted for display.
    pub timestamp: String,
    /// Trade price of the underlying.
    pub underlying: f64,
    /// Theoretical call value at this trade price.
    pub option_price: f64,
}

/// Append-ordered buffer of price points for one subscription epoch.
///
/// Points are kept strictly in arrival order with no deduplication, so two
/// ticks sharing a timestamp both appear. Unbounded by default; a count
/// bound can be set to evict oldest points first.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    points: VecDeque<PricePoint>,
    max_points: Option<usize>,
}

impl TimeSeries {
    /// Create an unbounded series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a series retaining at most `max_points`, oldest evicted first.
    pub fn with_max_points(max_points: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(max_points),
            max_points: Some(max_points),
        }
    }

    /// Append a point at the end of the series.
    pub fn append(&mut self, point: PricePoint) {
        // Evict the oldest entry when at the configured bound
        if let Some(max_points) = self.max_points {
            if self.points.len() >= max_points {
                self.points.pop_front();
            }
        }
        self.points.push_back(point);
    }

    /// Remove every point.
    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Owned copy of the points in append order.
    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.points.iter().cloned().collect()
    }

    /// Iterate the points in append order.
    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Most recently appended point.
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// Number of points in the series.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
