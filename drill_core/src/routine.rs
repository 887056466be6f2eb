//! Exercise routines.
//!
//! A [`Routine`] is an ordered list of prepped exercises, resolved against a
//! [`GuideBook`], that run one after another.

use crate::countdown::DEFAULT_INTERVAL;
use crate::exercise::{Exercise, RunContext};
use crate::guide::GuideBook;
use crate::types::Timing;
use crate::{Error, Result};
use serde::Serialize;
use std::time::Duration;

/// An ordered, fully prepped sequence of exercises
#[derive(Clone, Debug)]
pub struct Routine<'g> {
    name: Option<String>,
    description: Option<String>,
    exercises: Vec<Exercise>,
    guidebook: &'g GuideBook,
    interval: Duration,
}

/// Display/serialization view of a routine
#[derive(Clone, Debug, Serialize)]
pub struct RoutineSummary {
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_time: u64,
    pub exercises: Vec<ExerciseSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExerciseSummary {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub timing: Timing,
}

impl<'g> Routine<'g> {
    /// An empty routine resolving exercises against `guidebook`
    pub fn new(guidebook: &'g GuideBook) -> Self {
        Self {
            name: None,
            description: None,
            exercises: Vec::new(),
            guidebook,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn guidebook(&self) -> &'g GuideBook {
        self.guidebook
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Look up an exercise, prep it and append it.
    ///
    /// Fails with `NotFound` if no guide defines `exercise_id`.
    pub fn add_exercise(
        &mut self,
        exercise_id: &str,
        duration: i64,
        rest: i64,
        read_delay: i64,
    ) -> Result<()> {
        let mut exercise = self.guidebook.get_exercise(exercise_id)?;
        exercise.prep(duration, rest, read_delay)?;
        self.push_exercise(exercise)
    }

    /// Append an exercise that has already been prepped
    pub fn push_exercise(&mut self, mut exercise: Exercise) -> Result<()> {
        if !exercise.is_prepared() {
            return Err(Error::Protocol(format!(
                "Exercise {} must be prepped before it joins a routine",
                exercise.id()
            )));
        }
        exercise.set_interval(self.interval);
        self.exercises.push(exercise);
        Ok(())
    }

    /// Change the length of one time unit for every exercise
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        for exercise in &mut self.exercises {
            exercise.set_interval(interval);
        }
    }

    /// Sum of every exercise's read delay, duration and rest
    pub fn total_time(&self) -> u64 {
        self.exercises
            .iter()
            .filter_map(Exercise::total_duration)
            .fold(0, u64::saturating_add)
    }

    /// Run all the exercises in order.
    ///
    /// An exercise aborted by the observer ends early, and the routine moves
    /// on to the next one.
    pub fn start(&mut self, ctx: &RunContext<'_>) -> Result<()> {
        tracing::info!(
            "Starting routine {} ({} exercises)",
            self.name().unwrap_or("(unnamed)"),
            self.exercises.len()
        );
        for exercise in &mut self.exercises {
            exercise.start(ctx)?;
        }
        tracing::info!("Routine complete");
        Ok(())
    }

    pub fn summary(&self) -> RoutineSummary {
        RoutineSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            total_time: self.total_time(),
            exercises: self
                .exercises
                .iter()
                .filter_map(|exercise| {
                    exercise.timing().map(|timing| ExerciseSummary {
                        id: exercise.id().to_string(),
                        name: exercise.name().to_string(),
                        timing,
                    })
                })
                .collect(),
        }
    }
}
