#![forbid(unsafe_code)]

//! Core domain model and timing logic for the interval timer.
//!
//! This crate provides:
//! - Domain types (workout config, phases, snapshots, summaries)
//! - Clock sources and the phase timer state machine
//! - The workout runner and a session driver for it
//! - Persistence (workout history, presets, CSV export)
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod clock;
pub mod timer;
pub mod runner;
pub mod session;
pub mod config;
pub mod logging;
pub mod history;
pub mod presets;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use timer::{PhaseTimer, Transition};
pub use runner::{estimate_remaining, RunnerEvent, WorkoutRunner};
pub use session::{run_session, Command, SessionEvent, SessionOutcome};
pub use config::Config;
pub use history::{load_workouts, JsonlSink, WorkoutSink};
pub use presets::{JsonPresetStore, PresetStore};
pub use export::export_csv;
