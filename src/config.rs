use crate::model::{Settings, Song};
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "stopify";
const SETTINGS_FILE: &str = "settings.json";
const QUEUE_FILE: &str = "queue.json";
const LOG_FILE: &str = "stopify.log";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("STOPIFY_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn queue_path() -> Result<PathBuf> {
    Ok(config_root()?.join(QUEUE_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    ensure_config_dir()?;
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Storage slot for the playback queue. An empty queue is stored as an absent
/// slot, never as an empty array.
pub trait QueueStore {
    fn load(&self) -> Result<Vec<Song>>;
    fn save(&mut self, queue: &[Song]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_config_dir() -> Result<Self> {
        Ok(Self::new(queue_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStore for FileQueueStore {
    fn load(&self) -> Result<Vec<Song>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read queue file {}", self.path.display()))?;
        let queue: Vec<Song> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse queue file {}", self.path.display()))?;
        Ok(queue)
    }

    fn save(&mut self, queue: &[Song]) -> Result<()> {
        if queue.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .with_context(|| format!("failed to remove {}", self.path.display()))?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(queue)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory slot holding the serialized queue, shared between clones so a
/// test can "reload" by building a new controller over the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    slot: std::rc::Rc<std::cell::RefCell<Option<String>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: &str) -> Self {
        let store = Self::default();
        *store.slot.borrow_mut() = Some(raw.to_string());
        store
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> Result<Vec<Song>> {
        match self.slot.borrow().as_deref() {
            Some(raw) => serde_json::from_str(raw).context("failed to parse stored queue"),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, queue: &[Song]) -> Result<()> {
        let value = if queue.is_empty() {
            None
        } else {
            Some(serde_json::to_string(queue)?)
        };
        *self.slot.borrow_mut() = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortOrder;
    use tempfile::tempdir;

    fn song(id: u32) -> Song {
        Song {
            id,
            title: format!("song {id}"),
            source_ref: format!("https://www.youtube.com/watch?v=v{id}"),
            year: String::from("2020"),
            added_on: Some(String::from("1 Mei 2020")),
            tags: vec![String::from("b")],
        }
    }

    #[test]
    fn save_and_load_settings_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);

        let settings = Settings {
            volume: 80,
            sort: SortOrder::AddedDesc,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).expect("save");
        let loaded = load_settings_from(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let loaded = load_settings_from(&dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn file_queue_store_removes_slot_when_empty() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileQueueStore::new(dir.path().join("nested").join("queue.json"));

        store.save(&[song(1), song(2)]).expect("save");
        assert!(store.path().exists());
        assert_eq!(store.load().expect("load"), vec![song(1), song(2)]);

        store.save(&[]).expect("save empty");
        assert!(!store.path().exists());
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn corrupt_queue_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("queue.json");
        fs::write(&path, "{not json").expect("write");
        assert!(FileQueueStore::new(path).load().is_err());
    }

    #[test]
    fn memory_store_uses_absent_slot_for_empty_queue() {
        let mut store = MemoryQueueStore::new();
        store.save(&[song(3)]).expect("save");
        assert!(store.raw().is_some());
        store.save(&[]).expect("save");
        assert_eq!(store.raw(), None);
    }
}
