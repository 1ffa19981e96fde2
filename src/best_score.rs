use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Durable integer key-value capability behind the best score.
pub trait ScoreStore: Send {
    fn load(&self, key: &str) -> Result<Option<u64>>;
    fn save(&mut self, key: &str, value: u64) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryScoreStore {
    values: HashMap<String, u64>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.values.get(key).copied())
    }

    fn save(&mut self, key: &str, value: u64) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredScore {
    value: u64,
    #[serde(rename = "updatedAt", alias = "updated_at")]
    updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ScoreStoreFile {
    version: u8,
    scores: HashMap<String, StoredScore>,
}

/// JSON file store. Every save rewrites the whole file.
pub struct JsonFileScoreStore {
    file_path: PathBuf,
}

impl JsonFileScoreStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    fn read_file(&self) -> Result<Option<ScoreStoreFile>> {
        let text = match fs::read_to_string(&self.file_path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read {}", self.file_path.display()))
            }
        };
        let parsed: ScoreStoreFile = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", self.file_path.display()))?;
        if parsed.version != 1 {
            bail!(
                "unsupported version {} at {}",
                parsed.version,
                self.file_path.display()
            );
        }
        Ok(Some(parsed))
    }
}

impl ScoreStore for JsonFileScoreStore {
    fn load(&self, key: &str) -> Result<Option<u64>> {
        Ok(self
            .read_file()?
            .and_then(|file| file.scores.get(key).map(|entry| entry.value)))
    }

    fn save(&mut self, key: &str, value: u64) -> Result<()> {
        let mut payload = match self.read_file() {
            Ok(Some(file)) => file,
            Ok(None) => ScoreStoreFile {
                version: 1,
                scores: HashMap::new(),
            },
            Err(error) => {
                warn!("[best-score] discarding unreadable store: {error:#}");
                ScoreStoreFile {
                    version: 1,
                    scores: HashMap::new(),
                }
            }
        };
        payload.scores.insert(
            key.to_string(),
            StoredScore {
                value,
                updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        );

        if let Some(parent) = non_empty_parent(&self.file_path) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent dir {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&payload)
            .with_context(|| format!("failed to serialize {}", self.file_path.display()))?;
        fs::write(&self.file_path, text)
            .with_context(|| format!("failed to write {}", self.file_path.display()))
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Best score under one key, with an in-memory cache that stands in whenever
/// the store fails.
pub struct BestScore {
    store: Box<dyn ScoreStore>,
    key: String,
    cache: u64,
}

impl BestScore {
    pub fn new(store: Box<dyn ScoreStore>, key: &str) -> Self {
        let cache = match store.load(key) {
            Ok(value) => value.unwrap_or(0),
            Err(error) => {
                warn!("[best-score] store unavailable, using memory only: {error:#}");
                0
            }
        };
        Self {
            store,
            key: key.to_string(),
            cache,
        }
    }

    pub fn in_memory(key: &str) -> Self {
        Self::new(Box::new(MemoryScoreStore::new()), key)
    }

    /// Served from memory; the store is only read in `new`.
    pub fn get(&self) -> u64 {
        self.cache
    }

    pub fn set(&mut self, value: u64) {
        self.cache = value;
        if let Err(error) = self.store.save(&self.key, value) {
            warn!("[best-score] failed to persist {value}: {error:#}");
        }
    }

    /// Raises the best score to `score` if it beats it. Returns true on a new best.
    pub fn offer(&mut self, score: u64) -> bool {
        if score <= self.get() {
            return false;
        }
        info!(score, "[best-score] new best");
        self.set(score);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BEST_SCORE_KEY;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        );
        std::env::temp_dir().join(unique).join("best-score.json")
    }

    struct BrokenStore;

    impl ScoreStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<u64>> {
            bail!("storage disabled")
        }

        fn save(&mut self, _key: &str, _value: u64) -> Result<()> {
            bail!("storage disabled")
        }
    }

    #[test]
    fn file_store_round_trips_between_instances() {
        let path = temp_file("best-score-roundtrip");
        let mut best = BestScore::new(
            Box::new(JsonFileScoreStore::new(path.clone())),
            BEST_SCORE_KEY,
        );
        assert_eq!(best.get(), 0);
        assert!(best.offer(128));
        assert!(!best.offer(64));

        let reopened = BestScore::new(
            Box::new(JsonFileScoreStore::new(path.clone())),
            BEST_SCORE_KEY,
        );
        assert_eq!(reopened.get(), 128);

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let path = temp_file("best-score-keys");
        let mut store = JsonFileScoreStore::new(path.clone());
        store.save("a", 10).expect("save a");
        store.save("b", 20).expect("save b");
        assert_eq!(store.load("a").expect("load a"), Some(10));
        assert_eq!(store.load("b").expect("load b"), Some(20));
        assert_eq!(store.load("c").expect("load c"), None);

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn unsupported_version_is_an_error() {
        let path = temp_file("best-score-version");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::write(&path, r#"{"version": 9, "scores": {}}"#).expect("write file");

        let store = JsonFileScoreStore::new(path.clone());
        assert!(store.load(BEST_SCORE_KEY).is_err());

        let _ = fs::remove_dir_all(&parent);
    }

    #[test]
    fn broken_store_falls_back_to_cache() {
        let mut best = BestScore::new(Box::new(BrokenStore), BEST_SCORE_KEY);
        assert_eq!(best.get(), 0);
        assert!(best.offer(40));
        assert_eq!(best.get(), 40);
        assert!(!best.offer(12));
    }

    struct CountingStore {
        loads: Arc<AtomicUsize>,
        inner: MemoryScoreStore,
    }

    impl ScoreStore for CountingStore {
        fn load(&self, key: &str) -> Result<Option<u64>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(key)
        }

        fn save(&mut self, key: &str, value: u64) -> Result<()> {
            self.inner.save(key, value)
        }
    }

    #[test]
    fn store_is_read_once_at_construction() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut inner = MemoryScoreStore::new();
        inner.save(BEST_SCORE_KEY, 30).expect("seed store");
        let mut best = BestScore::new(
            Box::new(CountingStore {
                loads: Arc::clone(&loads),
                inner,
            }),
            BEST_SCORE_KEY,
        );
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        for score in 0..40u64 {
            best.offer(score);
            assert!(best.get() >= 30);
        }
        assert_eq!(best.get(), 39);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memory_store_starts_empty() {
        let best = BestScore::in_memory(BEST_SCORE_KEY);
        assert_eq!(best.get(), 0);
    }
}
