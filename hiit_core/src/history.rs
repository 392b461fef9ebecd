//! Completed-workout history.
//!
//! Workouts are appended to a JSONL (JSON Lines) file with file locking so
//! that several processes can record at once. Reading filters by user and
//! returns the newest workouts first.

use crate::{CompletedWorkout, Result, WorkoutSummary};
use chrono::{Local, NaiveDate, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished workouts
pub trait WorkoutSink {
    /// Persist a summary on behalf of `user_id` and return the stored record
    fn record(&mut self, user_id: &str, summary: &WorkoutSummary) -> Result<CompletedWorkout>;
}

/// JSONL-based workout sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append an already-built record
    pub fn append(&mut self, workout: &CompletedWorkout) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(workout)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended workout {} to history", workout.id);
        Ok(())
    }
}

impl WorkoutSink for JsonlSink {
    fn record(&mut self, user_id: &str, summary: &WorkoutSummary) -> Result<CompletedWorkout> {
        let workout = CompletedWorkout::from_summary(user_id, summary, Utc::now());
        self.append(&workout)?;
        tracing::info!("Recorded {}s workout for {}", workout.total_time, user_id);
        Ok(workout)
    }
}

/// Location of the history log inside a data directory
pub fn history_path(data_dir: &Path) -> PathBuf {
    data_dir.join("workouts.jsonl")
}

/// Read every workout in a history file, skipping lines that do not parse
pub fn read_workouts(path: &Path) -> Result<Vec<CompletedWorkout>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut workouts = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CompletedWorkout>(&line) {
            Ok(workout) => workouts.push(workout),
            Err(e) => {
                tracing::warn!("Failed to parse workout at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} workouts from history", workouts.len());
    Ok(workouts)
}

/// Workouts belonging to `user_id`, newest first
pub fn load_workouts(path: &Path, user_id: &str) -> Result<Vec<CompletedWorkout>> {
    let mut workouts: Vec<_> = read_workouts(path)?
        .into_iter()
        .filter(|w| w.user_id == user_id)
        .collect();
    workouts.sort_by(|a, b| b.date.cmp(&a.date));

    tracing::info!("Loaded {} workouts for {}", workouts.len(), user_id);
    Ok(workouts)
}

/// Find one of the user's workouts by id
pub fn find_workout(path: &Path, user_id: &str, id: uuid::Uuid) -> Result<Option<CompletedWorkout>> {
    Ok(load_workouts(path, user_id)?.into_iter().find(|w| w.id == id))
}

/// Group workouts by local calendar day, newest day first.
///
/// Order within a day follows the input order.
pub fn group_by_day(workouts: &[CompletedWorkout]) -> Vec<(NaiveDate, Vec<&CompletedWorkout>)> {
    let mut groups: Vec<(NaiveDate, Vec<&CompletedWorkout>)> = Vec::new();

    for workout in workouts {
        let day = workout.date.with_timezone(&Local).date_naive();
        match groups.iter_mut().find(|(d, _)| *d == day) {
            Some((_, group)) => group.push(workout),
            None => groups.push((day, vec![workout])),
        }
    }

    groups.sort_by(|a, b| b.0.cmp(&a.0));
    groups
}
