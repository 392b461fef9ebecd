//! CSV export of workout history.

use crate::{CompletedWorkout, Result};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    id: String,
    user_id: &'a str,
    date: String,
    work_time: u32,
    rest_time: u32,
    exercises: u32,
    rounds: u32,
    total_time: u32,
}

impl<'a> From<&'a CompletedWorkout> for CsvRow<'a> {
    fn from(workout: &'a CompletedWorkout) -> Self {
        CsvRow {
            id: workout.id.to_string(),
            user_id: &workout.user_id,
            date: workout.date.to_rfc3339(),
            work_time: workout.work_time,
            rest_time: workout.rest_time,
            exercises: workout.exercises,
            rounds: workout.rounds,
            total_time: workout.total_time,
        }
    }
}

/// Write workouts to a fresh CSV file with a header row.
///
/// The file is synced to disk before returning. Returns the number of rows.
pub fn export_csv(workouts: &[CompletedWorkout], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    if workouts.is_empty() {
        // serialize() only emits headers alongside the first record
        writer.write_record([
            "id", "user_id", "date", "work_time", "rest_time", "exercises", "rounds", "total_time",
        ])?;
    }
    for workout in workouts {
        writer.serialize(CsvRow::from(workout))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} workouts to {:?}", workouts.len(), path);
    Ok(workouts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkoutSummary;
    use chrono::Utc;

    fn workout(total_time: u32) -> CompletedWorkout {
        CompletedWorkout::from_summary(
            "alice",
            &WorkoutSummary {
                work_time: 20,
                rest_time: 10,
                exercises: 5,
                rounds: 2,
                total_time,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("history.csv");

        let count = export_csv(&[workout(290), workout(300)], &path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(
            "id,user_id,date,work_time,rest_time,exercises,rounds,total_time"
        ));

        let reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn test_export_empty_history_still_has_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.csv");

        assert_eq!(export_csv(&[], &path).unwrap(), 0);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("id,user_id"));
    }

    #[test]
    fn test_export_overwrites_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.csv");

        export_csv(&[workout(1), workout(2), workout(3)], &path).unwrap();
        export_csv(&[workout(4)], &path).unwrap();

        let reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.into_records().count(), 1);
    }
}
