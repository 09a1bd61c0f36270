/// Automatic QC results.
///
/// Each automatic QC routine that objects to a value adds a
/// [`RoutineFlag`] to the value's [`AutoQcResult`]. The result reduces to
/// a single overall flag (the most significant one raised) and a combined
/// message. Results are append-only; they are only ever cleared wholesale.
use crate::flag::Flag;
use crate::model::QC_MESSAGE_SEPARATOR;
use serde::{Deserialize, Serialize};

/// A flag raised by one automatic QC routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineFlag {
    /// Name of the routine, e.g. "RangeCheck".
    pub routine: String,
    pub flag: Flag,
    /// What the routine expected, e.g. "0.0 - 40.0".
    pub required: String,
    /// What it found.
    pub actual: String,
}

impl RoutineFlag {
    pub fn new(routine: &str, flag: Flag, required: &str, actual: &str) -> Self {
        RoutineFlag {
            routine: routine.to_string(),
            flag,
            required: required.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Human-readable message for this flag.
    pub fn message(&self) -> String {
        if self.required.is_empty() && self.actual.is_empty() {
            self.routine.clone()
        } else {
            format!("{}: {} (required {})", self.routine, self.actual, self.required)
        }
    }
}

/// Accumulated automatic QC flags for one sensor value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoQcResult {
    flags: Vec<RoutineFlag>,
}

impl AutoQcResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a routine's flag. A routine that has already flagged the
    /// value is not recorded twice.
    pub fn add(&mut self, flag: RoutineFlag) {
        if !self.flags.iter().any(|f| f.routine == flag.routine) {
            self.flags.push(flag);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flags(&self) -> &[RoutineFlag] {
        &self.flags
    }

    /// The most significant flag raised, or GOOD if nothing was raised.
    pub fn overall_flag(&self) -> Flag {
        self.flags
            .iter()
            .map(|f| f.flag)
            .fold(Flag::Good, Flag::worst_of)
    }

    /// All routine messages joined with `;`.
    pub fn all_messages(&self) -> String {
        self.flags
            .iter()
            .map(RoutineFlag::message)
            .collect::<Vec<_>>()
            .join(QC_MESSAGE_SEPARATOR)
    }
}
