//! Core domain types for drill.
//!
//! This module defines the plain data shared by the guide, exercise and
//! routine layers:
//! - Exercise definitions and their text fields
//! - Prepped timing parameters
//! - The phases an exercise moves through

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Exercise Definitions
// ============================================================================

/// A text field from a guide document, decided once when the document is read
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Single(String),
    Lines(Vec<String>),
}

impl TextField {
    /// Collapse to one string, joining lines with newlines
    pub fn into_text(self) -> String {
        match self {
            TextField::Single(text) => text,
            TextField::Lines(lines) => lines.join("\n"),
        }
    }

    /// Expand to an ordered list, wrapping a single string
    pub fn into_list(self) -> Vec<String> {
        match self {
            TextField::Single(text) => vec![text],
            TextField::Lines(lines) => lines,
        }
    }
}

/// Static metadata for one exercise, as parsed from a guide
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tips: Vec<String>,
}

// ============================================================================
// Timing
// ============================================================================

/// The three durations assigned to an exercise when it is prepped.
///
/// Values are counts of the countdown interval (seconds by default).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub read_delay: u64,
    pub duration: u64,
    pub rest: u64,
}

impl Timing {
    /// Sum of all three, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.read_delay
            .saturating_add(self.duration)
            .saturating_add(self.rest)
    }
}

/// Where an exercise is in its run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unprepared,
    Prepared,
    ReadDelay,
    Active,
    Resting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unprepared => "unprepared",
            Phase::Prepared => "prepared",
            Phase::ReadDelay => "get ready",
            Phase::Active => "exercise",
            Phase::Resting => "rest",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Format a number of seconds as `M'SS"`
pub fn format_duration(seconds: u64) -> String {
    format!("{}'{:02}\"", seconds / 60, seconds % 60)
}
