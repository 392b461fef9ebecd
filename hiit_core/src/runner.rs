//! Workout runner: lifecycle around a [`PhaseTimer`].
//!
//! The runner is the single owner of a run's mutable state. All changes go
//! through `start`, `tick`, `pause`, `resume` and `stop`; presenters only
//! ever see copies via [`WorkoutRunner::snapshot`].

use crate::timer::{PhaseTimer, Transition};
use crate::{Clock, Phase, PhaseState, Result, RunnerSnapshot, WorkoutConfig, WorkoutSummary};

/// Something the presenter should react to, produced by `tick`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerEvent {
    PhaseEntered(PhaseState),
    Completed(WorkoutSummary),
}

#[derive(Debug)]
struct ActiveRun {
    timer: PhaseTimer,
    paused_at: Option<u64>,
    /// Set when warm-up ends; shifted forward by every pause
    workout_started_at: Option<u64>,
    total_elapsed: u32,
}

impl ActiveRun {
    /// Instant the run is "looking at": frozen at the pause time while paused
    fn effective_now(&self, now_ms: u64) -> u64 {
        self.paused_at.unwrap_or(now_ms)
    }

    fn elapsed_at(&self, at: u64) -> u32 {
        let computed = match self.workout_started_at {
            Some(started) => u32::try_from(at.saturating_sub(started) / 1000).unwrap_or(u32::MAX),
            None => 0,
        };
        computed.max(self.total_elapsed)
    }
}

/// Drives one workout at a time against a clock
pub struct WorkoutRunner<C: Clock> {
    clock: C,
    run: Option<ActiveRun>,
    epoch: u64,
    last_seen: u64,
}

impl<C: Clock> WorkoutRunner<C> {
    pub fn new(clock: C) -> Self {
        let last_seen = clock.now_ms();
        Self {
            clock,
            run: None,
            epoch: 0,
            last_seen,
        }
    }

    /// Read the clock, holding time still if it went backwards
    fn observe(&mut self) -> u64 {
        let now = self.clock.now_ms();
        if now < self.last_seen {
            tracing::warn!(
                "Clock went backwards by {}ms; treating as no time elapsed",
                self.last_seen - now
            );
            return self.last_seen;
        }
        self.last_seen = now;
        now
    }

    fn peek(&self) -> u64 {
        self.clock.now_ms().max(self.last_seen)
    }

    /// Begin a new run in warm-up, replacing any run in progress
    pub fn start(&mut self, config: WorkoutConfig) -> Result<()> {
        config.validate()?;

        let now = self.observe();
        self.epoch += 1;
        self.run = Some(ActiveRun {
            timer: PhaseTimer::new(config, now),
            paused_at: None,
            workout_started_at: None,
            total_elapsed: 0,
        });

        tracing::info!(
            "Started workout: {}s work / {}s rest, {} exercises x {} rounds",
            config.work_time,
            config.rest_time,
            config.exercises,
            config.rounds
        );
        Ok(())
    }

    /// Recompute timing and apply any due transitions.
    ///
    /// Does nothing while paused or when no run is active.
    pub fn tick(&mut self) -> Vec<RunnerEvent> {
        let now = self.observe();
        let Some(run) = self.run.as_mut() else {
            return Vec::new();
        };
        if run.paused_at.is_some() {
            return Vec::new();
        }

        let warm_up_deadline =
            (run.timer.phase() == Phase::WarmUp).then(|| run.timer.deadline());
        let transitions = run.timer.advance(now);

        if !transitions.is_empty() && run.workout_started_at.is_none() {
            run.workout_started_at = warm_up_deadline;
        }

        let mut events = Vec::with_capacity(transitions.len());
        let mut completed = false;
        for transition in transitions {
            match transition {
                Transition::Entered(state) => events.push(RunnerEvent::PhaseEntered(state)),
                Transition::Complete { finished_at_ms } => {
                    let config = run.timer.config();
                    let summary = WorkoutSummary {
                        work_time: config.work_time,
                        rest_time: config.rest_time,
                        exercises: config.exercises,
                        rounds: config.rounds,
                        total_time: run.elapsed_at(finished_at_ms),
                    };
                    tracing::info!("Workout completed in {}s", summary.total_time);
                    events.push(RunnerEvent::Completed(summary));
                    completed = true;
                }
            }
        }

        if completed {
            self.run = None;
        } else {
            run.total_elapsed = run.elapsed_at(now);
        }

        events
    }

    /// Tick only if `epoch` still names the current run.
    ///
    /// Schedulers capture [`epoch`](Self::epoch) when they arm a wake-up;
    /// a wake-up that fires after `stop` or a restart is dropped.
    pub fn tick_for(&mut self, epoch: u64) -> Vec<RunnerEvent> {
        if epoch != self.epoch {
            tracing::trace!("Ignoring tick for stale epoch {} (now {})", epoch, self.epoch);
            return Vec::new();
        }
        self.tick()
    }

    /// Freeze the run. No-op if already paused or idle.
    pub fn pause(&mut self) {
        let now = self.observe();
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.paused_at.is_some() {
            return;
        }

        run.total_elapsed = run.elapsed_at(now);
        run.paused_at = Some(now);
        tracing::debug!("Paused in {} with {}s left", run.timer.phase(), run.timer.remaining_at(now));
    }

    /// Continue a paused run where it left off. No-op if not paused.
    pub fn resume(&mut self) {
        let now = self.observe();
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let Some(paused_at) = run.paused_at.take() else {
            return;
        };

        let paused_for = now.saturating_sub(paused_at);
        run.timer.shift(paused_for);
        if let Some(started) = run.workout_started_at.as_mut() {
            *started = started.saturating_add(paused_for);
        }
        tracing::debug!("Resumed after {}ms pause", paused_for);
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Abandon the current run without a summary.
    ///
    /// Returns whether a run was actually in progress.
    pub fn stop(&mut self) -> bool {
        self.epoch += 1;
        let stopped = self.run.take().is_some();
        if stopped {
            tracing::info!("Workout stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.paused_at.is_some())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> Option<&WorkoutConfig> {
        self.run.as_ref().map(|run| run.timer.config())
    }

    /// Current position, countdown and aggregates
    pub fn snapshot(&self) -> Option<RunnerSnapshot> {
        let run = self.run.as_ref()?;
        let at = run.effective_now(self.peek());
        let state = run.timer.state_at(at);

        Some(RunnerSnapshot {
            phase: state.phase,
            time_remaining: state.time_remaining,
            current_exercise: state.current_exercise,
            current_round: state.current_round,
            is_paused: run.paused_at.is_some(),
            total_elapsed_seconds: run.elapsed_at(at),
            estimated_time_remaining: estimate_remaining(run.timer.config(), &state),
        })
    }

    /// Approximate seconds left in the whole workout.
    ///
    /// See [`estimate_remaining`] for what the approximation ignores.
    pub fn estimated_time_remaining(&self) -> Option<u64> {
        self.snapshot().map(|s| s.estimated_time_remaining)
    }
}

/// Remaining time in the phase, plus the exercises left in this round,
/// plus the rounds not yet started.
///
/// Every exercise is counted with a following rest, even the last one of a
/// round, which really goes to round reset (or finishes). The figure can
/// therefore overshoot by up to one rest period per round.
pub fn estimate_remaining(config: &WorkoutConfig, state: &PhaseState) -> u64 {
    let per_exercise = u64::from(config.work_time) + u64::from(config.rest_time);
    let exercises_left = u64::from(config.exercises.saturating_sub(state.current_exercise));
    let rounds_left = u64::from(config.rounds.saturating_sub(state.current_round));
    let per_round = u64::from(config.exercises) * per_exercise + u64::from(config.round_reset);

    u64::from(state.time_remaining) + exercises_left * per_exercise + rounds_left * per_round
}
