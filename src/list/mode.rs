//! Measurement mode classification.
//!
//! A series is PERIODIC when its readings arrive in short bursts separated
//! by gaps longer than the continuous limit, and CONTINUOUS otherwise.

use crate::config::ResolutionConfig;
use crate::numeric::seconds_between;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementMode {
    Continuous,
    Periodic,
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementMode::Continuous => write!(f, "CONTINUOUS"),
            MeasurementMode::Periodic => write!(f, "PERIODIC"),
        }
    }
}

/// Lengths of the runs of readings whose consecutive gaps are all within
/// the continuous limit.
pub(crate) fn run_lengths(times: &[DateTime<Utc>], limit_secs: i64) -> Vec<usize> {
    let mut runs = Vec::new();
    let Some(first) = times.first() else {
        return runs;
    };

    let mut previous = *first;
    let mut current = 1;
    for time in &times[1..] {
        if seconds_between(previous, *time) > limit_secs {
            runs.push(current);
            current = 0;
        }
        current += 1;
        previous = *time;
    }
    runs.push(current);
    runs
}

/// Classifies a sorted series of timestamps.
///
/// PERIODIC needs more than one run, and either the mean or the largest
/// run length must not exceed `max_periodic_group_size`. Empty and single
/// reading series are CONTINUOUS.
pub fn classify(times: &[DateTime<Utc>], config: &ResolutionConfig) -> MeasurementMode {
    let runs = run_lengths(times, config.continuous_limit_secs);
    if runs.len() < 2 {
        return MeasurementMode::Continuous;
    }

    let mut mean = 0.0_f64;
    let mut largest = 0;
    for (index, length) in runs.iter().enumerate() {
        mean += (*length as f64 - mean) / (index + 1) as f64;
        largest = largest.max(*length);
    }

    let limit = config.max_periodic_group_size;
    if mean <= limit as f64 || largest <= limit {
        MeasurementMode::Periodic
    } else {
        MeasurementMode::Continuous
    }
}
