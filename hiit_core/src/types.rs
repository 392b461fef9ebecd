//! Core domain types for the interval timer.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout configuration and validation
//! - Phases and the per-phase timer state
//! - Runner snapshots and the completion summary
//! - Persisted records (completed workouts, presets)

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Parameters of a single run. Durations are whole seconds.
///
/// Missing fields deserialize to the defaults, so a config file may set
/// only the values it cares about.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkoutConfig {
    pub work_time: u32,
    pub rest_time: u32,
    pub exercises: u32,
    pub rounds: u32,
    pub round_reset: u32,
    pub warm_up_time: u32,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            work_time: 20,
            rest_time: 10,
            exercises: 5,
            rounds: 2,
            round_reset: 10,
            warm_up_time: 10,
        }
    }
}

impl WorkoutConfig {
    /// Check the invariants a run relies on.
    ///
    /// Round reset and warm-up may be zero; everything else must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.exercises < 1 {
            return Err(Error::InvalidConfig("exercises must be at least 1".into()));
        }
        if self.rounds < 1 {
            return Err(Error::InvalidConfig("rounds must be at least 1".into()));
        }
        if self.work_time < 1 {
            return Err(Error::InvalidConfig("work time must be at least 1s".into()));
        }
        if self.rest_time < 1 {
            return Err(Error::InvalidConfig("rest time must be at least 1s".into()));
        }
        Ok(())
    }

    /// Configured length of a phase in seconds
    pub fn phase_duration(&self, phase: Phase) -> u32 {
        match phase {
            Phase::WarmUp => self.warm_up_time,
            Phase::Work => self.work_time,
            Phase::Rest => self.rest_time,
            Phase::RoundReset => self.round_reset,
        }
    }

    /// Planned length of the workout excluding warm-up.
    ///
    /// Counts a rest after every exercise, including the last one of each
    /// round, the same way the setup screen always has.
    pub fn planned_total_seconds(&self) -> u64 {
        let per_exercise = u64::from(self.work_time) + u64::from(self.rest_time);
        per_exercise * u64::from(self.exercises) * u64::from(self.rounds)
            + u64::from(self.round_reset) * u64::from(self.rounds.saturating_sub(1))
    }
}

// ============================================================================
// Phase Types
// ============================================================================

/// One timed segment of a workout
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WarmUp,
    Work,
    Rest,
    RoundReset,
}

impl Phase {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Phase::WarmUp => "Warm-up",
            Phase::Work => "Work",
            Phase::Rest => "Rest",
            Phase::RoundReset => "Round Rest",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Position inside a run: the phase, its countdown, and the counters
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: Phase,
    pub time_remaining: u32,
    pub current_exercise: u32,
    pub current_round: u32,
}

// ============================================================================
// Runner Output Types
// ============================================================================

/// State delivered to the presenter on every tick
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct RunnerSnapshot {
    pub phase: Phase,
    pub time_remaining: u32,
    pub current_exercise: u32,
    pub current_round: u32,
    pub is_paused: bool,
    pub total_elapsed_seconds: u32,
    /// Approximate: assumes a rest follows every exercise, including the
    /// last one of a round which actually goes straight to round reset.
    pub estimated_time_remaining: u64,
}

/// Immutable record of a finished run, handed to persistence
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutSummary {
    pub work_time: u32,
    pub rest_time: u32,
    pub exercises: u32,
    pub rounds: u32,
    pub total_time: u32,
}

// ============================================================================
// Persisted Records
// ============================================================================

/// Round reset and warm-up applied when replaying a history entry,
/// which does not record either.
pub const REPLAY_DEFAULT_ROUND_RESET: u32 = 10;
pub const REPLAY_DEFAULT_WARM_UP: u32 = 10;

/// A completed workout as stored in the history log
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedWorkout {
    pub id: Uuid,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub work_time: u32,
    pub rest_time: u32,
    pub exercises: u32,
    pub rounds: u32,
    pub total_time: u32,
}

impl CompletedWorkout {
    /// Stamp a summary with an id, owner and completion time
    pub fn from_summary(user_id: &str, summary: &WorkoutSummary, date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            date,
            work_time: summary.work_time,
            rest_time: summary.rest_time,
            exercises: summary.exercises,
            rounds: summary.rounds,
            total_time: summary.total_time,
        }
    }

    /// Config that runs this workout again
    pub fn replay_config(&self) -> WorkoutConfig {
        WorkoutConfig {
            work_time: self.work_time,
            rest_time: self.rest_time,
            exercises: self.exercises,
            rounds: self.rounds,
            round_reset: REPLAY_DEFAULT_ROUND_RESET,
            warm_up_time: REPLAY_DEFAULT_WARM_UP,
        }
    }
}

/// A named, reusable workout configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutPreset {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub config: WorkoutConfig,
}
