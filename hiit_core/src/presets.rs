//! Named workout presets with file locking.
//!
//! All presets live in one JSON document. Reads take a shared lock. Writers
//! hold an exclusive lock on `presets.json.lock` across the whole
//! read-modify-write and rewrite the document through a temp file that is
//! synced and then renamed over the original, so a crash never leaves a
//! half-written file.

use crate::{Error, Result, WorkoutConfig, WorkoutPreset};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// CRUD over presets, keyed by user identity
pub trait PresetStore {
    /// The user's presets, newest first
    fn list(&self, user_id: &str) -> Result<Vec<WorkoutPreset>>;

    fn get(&self, user_id: &str, id: Uuid) -> Result<WorkoutPreset>;

    /// Newest preset of the user with exactly this name
    fn find_by_name(&self, user_id: &str, name: &str) -> Result<Option<WorkoutPreset>>;

    fn create(&mut self, user_id: &str, name: &str, config: WorkoutConfig) -> Result<WorkoutPreset>;

    fn update(
        &mut self,
        user_id: &str,
        id: Uuid,
        name: &str,
        config: WorkoutConfig,
    ) -> Result<WorkoutPreset>;

    fn delete(&mut self, user_id: &str, id: Uuid) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PresetFile {
    #[serde(default)]
    presets: Vec<WorkoutPreset>,
}

/// Preset store backed by a single JSON file
pub struct JsonPresetStore {
    path: PathBuf,
}

impl JsonPresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the document with shared locking.
    ///
    /// A missing file is empty. A corrupted file logs a warning and is
    /// treated as empty.
    fn load(&self) -> Result<PresetFile> {
        if !self.path.exists() {
            return Ok(PresetFile::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str::<PresetFile>(&contents) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse preset file {:?}: {}. Treating as empty.",
                    self.path,
                    e
                );
                Ok(PresetFile::default())
            }
        }
    }

    /// Atomically replace the document
    fn save(&self, doc: &PresetFile) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "preset path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} presets to {:?}", doc.presets.len(), self.path);
        Ok(())
    }

    /// Sidecar file that serializes writers
    fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Load, modify and save back while holding the writer lock
    fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PresetFile) -> Result<T>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.load().and_then(|mut doc| {
            let out = f(&mut doc)?;
            self.save(&doc)?;
            Ok(out)
        });

        lock.unlock()?;
        result
    }
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidConfig("preset name must not be empty".into()));
    }
    Ok(name.to_string())
}

impl PresetStore for JsonPresetStore {
    fn list(&self, user_id: &str) -> Result<Vec<WorkoutPreset>> {
        let mut presets: Vec<_> = self
            .load()?
            .presets
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        presets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(presets)
    }

    fn get(&self, user_id: &str, id: Uuid) -> Result<WorkoutPreset> {
        self.list(user_id)?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(Error::PresetNotFound(id))
    }

    fn find_by_name(&self, user_id: &str, name: &str) -> Result<Option<WorkoutPreset>> {
        let name = name.trim();
        Ok(self.list(user_id)?.into_iter().find(|p| p.name == name))
    }

    fn create(&mut self, user_id: &str, name: &str, config: WorkoutConfig) -> Result<WorkoutPreset> {
        let name = validated_name(name)?;
        config.validate()?;

        let preset = WorkoutPreset {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name,
            created_at: Utc::now(),
            config,
        };

        self.modify(|doc| {
            doc.presets.push(preset.clone());
            Ok(())
        })?;

        tracing::info!("Created preset {:?} ({}) for {}", preset.name, preset.id, user_id);
        Ok(preset)
    }

    fn update(
        &mut self,
        user_id: &str,
        id: Uuid,
        name: &str,
        config: WorkoutConfig,
    ) -> Result<WorkoutPreset> {
        let name = validated_name(name)?;
        config.validate()?;

        let updated = self.modify(|doc| {
            let preset = doc
                .presets
                .iter_mut()
                .find(|p| p.id == id && p.user_id == user_id)
                .ok_or(Error::PresetNotFound(id))?;
            preset.name = name;
            preset.config = config;
            Ok(preset.clone())
        })?;

        tracing::info!("Updated preset {}", id);
        Ok(updated)
    }

    fn delete(&mut self, user_id: &str, id: Uuid) -> Result<()> {
        self.modify(|doc| {
            let before = doc.presets.len();
            doc.presets.retain(|p| !(p.id == id && p.user_id == user_id));
            if doc.presets.len() == before {
                return Err(Error::PresetNotFound(id));
            }
            Ok(())
        })?;

        tracing::info!("Deleted preset {}", id);
        Ok(())
    }
}

/// Resolve a preset by id or, failing that, by name
pub fn resolve_preset(
    store: &impl PresetStore,
    user_id: &str,
    id_or_name: &str,
) -> Result<Option<WorkoutPreset>> {
    if let Ok(id) = Uuid::parse_str(id_or_name.trim()) {
        match store.get(user_id, id) {
            Ok(preset) => return Ok(Some(preset)),
            Err(Error::PresetNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    store.find_by_name(user_id, id_or_name)
}

/// Location of the preset file inside a data directory
pub fn presets_path(data_dir: &Path) -> PathBuf {
    data_dir.join("presets.json")
}
