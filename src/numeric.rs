/// Small numeric and time helpers used by the resolution engine.
///
/// Nothing here knows about flags or sensor values: means, linear
/// interpolation and timestamp arithmetic only.
use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// Mean
// ---------------------------------------------------------------------------

/// Running arithmetic mean. NaN inputs are ignored.
#[derive(Debug, Clone, Default)]
pub struct MeanCalculator {
    sum: f64,
    count: usize,
}

impl MeanCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        if !value.is_nan() {
            self.sum += value;
            self.count += 1;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the values added so far; NaN when nothing has been added.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

impl FromIterator<f64> for MeanCalculator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut calc = MeanCalculator::new();
        iter.into_iter().for_each(|v| calc.add(v));
        calc
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Linear interpolation of `y` at `x` between `(x0, y0)` and `(x1, y1)`.
///
/// If the two x values coincide the mean of the y values is returned.
pub fn interpolate(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return (y0 + y1) / 2.0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Linear interpolation in time.
pub fn interpolate_at(
    t0: DateTime<Utc>,
    y0: f64,
    t1: DateTime<Utc>,
    y1: f64,
    target: DateTime<Utc>,
) -> f64 {
    interpolate(
        t0.timestamp_millis() as f64,
        y0,
        t1.timestamp_millis() as f64,
        y1,
        target.timestamp_millis() as f64,
    )
}

// ---------------------------------------------------------------------------
// Time arithmetic
// ---------------------------------------------------------------------------

/// Whole seconds from `first` to `second` (negative if `second` is earlier).
pub fn seconds_between(first: DateTime<Utc>, second: DateTime<Utc>) -> i64 {
    (second - first).num_seconds()
}

/// The instant halfway between two timestamps.
pub fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    let half = (end - start).num_milliseconds() / 2;
    start + Duration::milliseconds(half)
}

/// Parses a raw payload as a number. Thousands separators are stripped;
/// anything unparseable yields NaN.
pub fn double_from_string(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
