#![forbid(unsafe_code)]

//! Core library for the drill exercise timer.
//!
//! This crate provides:
//! - Exercise guides loaded from YAML, merged into a guide book
//! - The routine file parser
//! - Timed exercises and routines with sound cues
//! - Configuration and logging setup shared by the CLI

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod countdown;
pub mod sound;
pub mod exercise;
pub mod guide;
pub mod routine;
pub mod routine_file;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use countdown::{Countdown, CountdownOutcome};
pub use sound::{CommandSounder, CueSounds, QuietSounder, Sounder, SounderRegistry};
pub use exercise::{Exercise, ExerciseObserver, NoopObserver, RunContext};
pub use guide::{DuplicateWarning, Guide, GuideBook};
pub use routine::{ExerciseSummary, Routine, RoutineSummary};
pub use routine_file::RoutineFile;
