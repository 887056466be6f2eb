//! Blocking countdown timer.
//!
//! A [`Countdown`] sleeps on the calling thread until its duration has
//! elapsed, reporting each whole interval to a tick callback and calling a
//! finish callback at the end. The tick callback may return
//! `ControlFlow::Break(())` to abort, in which case the finish callback is
//! skipped and `start` returns normally.

use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

/// Interval used when none is given
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Guards the tick boundary against float rounding in `(d - i/2) / i`
const TICK_EPSILON: f64 = 1e-9;

/// How a countdown run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Ran to the end and called the finish callback
    Finished,
    /// A tick callback asked to stop after `at` intervals
    Aborted { at: u64 },
}

impl CountdownOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, CountdownOutcome::Aborted { .. })
    }
}

/// A countdown of a fixed (possibly fractional) duration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    duration: Duration,
    interval: Duration,
}

impl Countdown {
    /// Create a countdown ticking once per second
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Create a countdown from fractional seconds; negative values count as zero
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self::new(Duration::from_secs_f64(seconds.max(0.0)))
    }

    /// Set the tick interval (at least one millisecond)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The highest tick value this countdown will report.
    ///
    /// Ticks are issued while `k * interval <= duration - interval / 2`, so
    /// no tick ever lands on or after the finish time.
    pub fn last_tick(&self) -> u64 {
        let interval = self.interval.as_secs_f64();
        let count = (self.duration.as_secs_f64() - interval / 2.0) / interval + TICK_EPSILON;
        if count < 1.0 {
            0
        } else {
            count.floor() as u64
        }
    }

    /// Run without a tick callback
    pub fn start<F>(&self, on_finish: F) -> CountdownOutcome
    where
        F: FnOnce(),
    {
        self.run(None::<fn(u64) -> ControlFlow<()>>, on_finish)
    }

    /// Run, reporting each elapsed interval to `on_tick`
    pub fn start_with_ticks<T, F>(&self, on_tick: T, on_finish: F) -> CountdownOutcome
    where
        T: FnMut(u64) -> ControlFlow<()>,
        F: FnOnce(),
    {
        self.run(Some(on_tick), on_finish)
    }

    fn run<T, F>(&self, mut on_tick: Option<T>, on_finish: F) -> CountdownOutcome
    where
        T: FnMut(u64) -> ControlFlow<()>,
        F: FnOnce(),
    {
        tracing::info!("Countdown started, duration {:?}", self.duration);
        let started = Instant::now();
        let interval = self.interval.as_secs_f64();
        let last_tick = self.last_tick();
        let poll = self.interval / 10;

        let mut clock = 0u64;
        while clock < last_tick {
            let next = self.interval.mul_f64((clock + 1) as f64);
            while started.elapsed() < next {
                thread::sleep(poll);
            }

            let counted = (started.elapsed().as_secs_f64() / interval).round() as u64;
            clock = counted.clamp(clock + 1, last_tick);
            tracing::debug!("Tick {}", clock);

            if let Some(tick) = on_tick.as_mut() {
                if tick(clock).is_break() {
                    tracing::info!(
                        "Countdown aborted at tick {} (was duration {:?})",
                        clock,
                        self.duration
                    );
                    return CountdownOutcome::Aborted { at: clock };
                }
            }
        }

        // Consume whatever is left after the last whole tick
        let fine = self.interval / 20;
        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.duration {
                break;
            }
            thread::sleep(fine.min(self.duration - elapsed));
        }

        tracing::info!("Countdown finished (duration {:?})", self.duration);
        on_finish();
        CountdownOutcome::Finished
    }
}
