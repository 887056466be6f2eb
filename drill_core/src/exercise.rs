//! Timed exercises.
//!
//! An [`Exercise`] is built from an [`ExerciseDefinition`] and must be
//! prepped with its durations before it can run. Running it walks through
//! three timed phases on the calling thread:
//!
//! 1. **Read delay** - time to read the instructions
//! 2. **Active** - the exercise itself, with a cue sound on each of the
//!    last few ticks
//! 3. **Rest** - recovery before whatever comes next
//!
//! An observer may abort the active phase from its tick callback; the
//! exercise then skips straight to done without resting.

use crate::countdown::{Countdown, DEFAULT_INTERVAL};
use crate::sound::{CueSounds, Sounder};
use crate::types::{ExerciseDefinition, Phase, Timing};
use crate::{Error, Result};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Ticks with fewer than this many units left get a cue sound
pub const NEAR_END_THRESHOLD: u64 = 5;

/// Remaining counts below this are logged at debug level
const LOG_REMAINING_BELOW: u64 = 10;

/// Receives progress from a running exercise.
///
/// Both methods have no-op defaults.
pub trait ExerciseObserver {
    /// Called on entering each phase, with the phase length in units
    fn on_phase(&self, _exercise: &ExerciseDefinition, _phase: Phase, _units: u64) {}

    /// Called on each active tick. Returning `Break` aborts the exercise.
    fn on_tick(
        &self,
        _exercise: &ExerciseDefinition,
        _elapsed: u64,
        _remaining: u64,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Observer that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ExerciseObserver for NoopObserver {}

/// Collaborators an exercise needs while it runs
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub sounder: &'a dyn Sounder,
    pub observer: &'a dyn ExerciseObserver,
    pub cues: &'a CueSounds,
}

impl<'a> RunContext<'a> {
    pub fn new(
        sounder: &'a dyn Sounder,
        observer: &'a dyn ExerciseObserver,
        cues: &'a CueSounds,
    ) -> Self {
        Self {
            sounder,
            observer,
            cues,
        }
    }

    /// Sounds are cosmetic: a failure is logged, never propagated
    fn play(&self, resource: &str) {
        if let Err(e) = self.sounder.play(resource) {
            tracing::warn!("Failed to play {}: {}", resource, e);
        }
    }
}

/// Durations and countdowns fixed by `prep`
#[derive(Clone, Copy, Debug)]
struct Prepared {
    timing: Timing,
    reading: Countdown,
    active: Countdown,
}

/// One runnable instance of an exercise
#[derive(Clone, Debug)]
pub struct Exercise {
    definition: Arc<ExerciseDefinition>,
    prepared: Option<Prepared>,
    interval: Duration,
    phase: Phase,
}

fn units_to_duration(interval: Duration, units: u64) -> Duration {
    interval.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
}

impl Exercise {
    /// Create an unprepped exercise
    pub fn new(definition: Arc<ExerciseDefinition>) -> Self {
        Self {
            definition,
            prepared: None,
            interval: DEFAULT_INTERVAL,
            phase: Phase::Unprepared,
        }
    }

    pub fn definition(&self) -> &ExerciseDefinition {
        &self.definition
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn tips(&self) -> &[String] {
        &self.definition.tips
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timing(&self) -> Option<Timing> {
        self.prepared.map(|p| p.timing)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// read delay + duration + rest, once prepped
    pub fn total_duration(&self) -> Option<u64> {
        self.timing().map(|t| t.total())
    }

    /// Set the exercise durations.
    ///
    /// * `duration` - time to exercise for
    /// * `rest` - time afterwards to allow the athlete to rest
    /// * `read_delay` - time before, to read and understand the instructions
    ///
    /// All three are in units of the countdown interval and must not be
    /// negative. Prepping again replaces the earlier durations.
    pub fn prep(&mut self, duration: i64, rest: i64, read_delay: i64) -> Result<()> {
        let duration = u64::try_from(duration).map_err(|_| {
            Error::Parse(format!(
                "Not a time traveller: Can't exercise for {} second(s)",
                duration
            ))
        })?;
        let rest = u64::try_from(rest).map_err(|_| {
            Error::Parse(format!(
                "Not a time traveller: Can't rest for {} second(s)",
                rest
            ))
        })?;
        let read_delay = u64::try_from(read_delay).map_err(|_| {
            Error::Parse(format!(
                "Not a time traveller: Can't let the user read for {} second(s)",
                read_delay
            ))
        })?;

        self.prepared = Some(self.build(Timing {
            read_delay,
            duration,
            rest,
        }));
        self.phase = Phase::Prepared;
        Ok(())
    }

    /// Change the length of one time unit, e.g. to run a routine quickly
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        if let Some(prepared) = self.prepared {
            self.prepared = Some(self.build(prepared.timing));
        }
    }

    fn build(&self, timing: Timing) -> Prepared {
        Prepared {
            timing,
            reading: Countdown::new(units_to_duration(self.interval, timing.read_delay))
                .with_interval(self.interval),
            active: Countdown::new(units_to_duration(self.interval, timing.duration))
                .with_interval(self.interval),
        }
    }

    /// Run the exercise, blocking until it is done.
    ///
    /// Fails with a protocol error if the exercise was never prepped.
    pub fn start(&mut self, ctx: &RunContext<'_>) -> Result<()> {
        let Some(prepared) = self.prepared else {
            return Err(Error::Protocol(
                "Can't start an exercise without first preparing it".into(),
            ));
        };

        tracing::info!(
            "Exercise: {}, for {}s",
            self.definition.name,
            prepared.timing.duration
        );
        self.enter(Phase::ReadDelay, prepared.timing.read_delay, ctx);
        prepared.reading.start(|| self.begin_active(prepared, ctx));
        Ok(())
    }

    fn begin_active(&mut self, prepared: Prepared, ctx: &RunContext<'_>) {
        ctx.play(&ctx.cues.start);
        self.enter(Phase::Active, prepared.timing.duration, ctx);

        let definition = Arc::clone(&self.definition);
        let duration = prepared.timing.duration;
        let outcome = prepared.active.start_with_ticks(
            |elapsed| active_tick(&definition, duration, elapsed, ctx),
            || self.finish(prepared, ctx),
        );

        if outcome.is_aborted() {
            ctx.sounder.stop();
            tracing::info!("Exercise {} aborted", self.definition.name);
            self.enter(Phase::Done, 0, ctx);
        }
    }

    fn finish(&mut self, prepared: Prepared, ctx: &RunContext<'_>) {
        ctx.play(&ctx.cues.finish);
        tracing::info!(
            "Finish (exercise {}): {}s rest",
            self.definition.name,
            prepared.timing.rest
        );
        self.enter(Phase::Resting, prepared.timing.rest, ctx);

        let rest = units_to_duration(self.interval, prepared.timing.rest);
        let step = self.interval / 5;
        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= rest {
                break;
            }
            thread::sleep(step.min(rest - elapsed));
        }

        self.enter(Phase::Done, 0, ctx);
    }

    fn enter(&mut self, phase: Phase, units: u64, ctx: &RunContext<'_>) {
        self.phase = phase;
        ctx.observer.on_phase(&self.definition, phase, units);
    }
}

fn active_tick(
    definition: &ExerciseDefinition,
    duration: u64,
    elapsed: u64,
    ctx: &RunContext<'_>,
) -> ControlFlow<()> {
    let remaining = duration.saturating_sub(elapsed);
    if remaining < LOG_REMAINING_BELOW {
        tracing::debug!("{}...", remaining);
    }

    if ctx.observer.on_tick(definition, elapsed, remaining).is_break() {
        return ControlFlow::Break(());
    }

    if remaining > 0 && remaining < NEAR_END_THRESHOLD {
        ctx.play(&ctx.cues.countdown);
    }
    ControlFlow::Continue(())
}
