//! Long-term progress records behind a key-value store
//!
//! Keys:
//! - `progress:<path_id>` - JSON `ProgressRecord`
//! - `packs:unlocked` - highest unlocked pack id (pack 1 is always open)
//! - `pack:<id>:completed` - distinct completed paths in that pack
//!
//! Missing or corrupt values read as defaults; the store is never trusted to
//! be well-formed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::path::PathPack;
use super::session::AttemptSummary;
use crate::error::StoreError;

const UNLOCKED_KEY: &str = "packs:unlocked";
const FIRST_PACK: u32 = 1;

/// Minimal string key-value store (localStorage on the web)
pub trait ProgressStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.values)?)
    }

    /// Corrupt input gives an empty store
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(values) => Self { values },
            Err(e) => {
                log::warn!("Discarding unreadable progress data: {}", e);
                Self::default()
            }
        }
    }
}

impl ProgressStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressRecord {
    pub completed: bool,
    pub best_accuracy: f32,
    pub attempts: u32,
    /// Epoch milliseconds of the latest completion
    pub last_completed_at: Option<f64>,
}

pub struct Progression<S: ProgressStore> {
    store: S,
}

impl<S: ProgressStore> Progression<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load_record(&self, path_id: &str) -> ProgressRecord {
        let key = record_key(path_id);
        let Some(raw) = self.store.get(&key) else {
            return ProgressRecord::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Corrupt progress record `{}`: {}", key, e);
            ProgressRecord::default()
        })
    }

    /// Fold one attempt into the path's record. The first completion of a
    /// path inside `pack` counts toward unlocking the next pack.
    pub fn record_attempt(
        &mut self,
        summary: &AttemptSummary,
        pack: Option<&PathPack>,
        now_ms: f64,
    ) -> Result<ProgressRecord, StoreError> {
        let mut record = self.load_record(&summary.path_id);
        let first_completion = summary.completed && !record.completed;

        record.attempts = record.attempts.saturating_add(1);
        if summary.accuracy.is_finite() {
            record.best_accuracy = record.best_accuracy.max(summary.accuracy.clamp(0.0, 1.0));
        }
        if summary.completed {
            record.completed = true;
            record.last_completed_at = Some(now_ms);
        }
        self.store
            .set(&record_key(&summary.path_id), serde_json::to_string(&record)?);

        if first_completion {
            if let Some(pack) = pack.filter(|p| p.contains(&summary.path_id)) {
                self.count_pack_completion(pack);
            }
        }
        Ok(record)
    }

    fn count_pack_completion(&mut self, pack: &PathPack) {
        let count = self.pack_completed(pack.id) + 1;
        self.store.set(&pack_key(pack.id), count.to_string());

        let next = pack.id + 1;
        if count >= pack.unlock_threshold && self.unlocked_packs() < next {
            self.store.set(UNLOCKED_KEY, next.to_string());
            log::info!("Pack {} unlocked", next);
        }
    }

    /// Highest unlocked pack id, never below the first pack
    pub fn unlocked_packs(&self) -> u32 {
        self.read_number(UNLOCKED_KEY)
            .map_or(FIRST_PACK, |n: u32| n.max(FIRST_PACK))
    }

    pub fn is_pack_unlocked(&self, pack_id: u32) -> bool {
        pack_id <= self.unlocked_packs()
    }

    pub fn pack_completed(&self, pack_id: u32) -> usize {
        self.read_number(&pack_key(pack_id)).unwrap_or(0)
    }

    fn read_number<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match raw.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("Corrupt counter `{}` = {:?}", key, raw);
                None
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

fn record_key(path_id: &str) -> String {
    format!("progress:{}", path_id)
}

fn pack_key(pack_id: u32) -> String {
    format!("pack:{}:completed", pack_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Point;
    use crate::progress::TracingPath;

    fn summary(path_id: &str, accuracy: f32, completed: bool) -> AttemptSummary {
        AttemptSummary {
            path_id: path_id.to_string(),
            progress: if completed { 0.9 } else { 0.4 },
            accuracy,
            completed,
            elapsed_ms: 4000.0,
        }
    }

    fn pack(id: u32, ids: &[&str], unlock_threshold: usize) -> PathPack {
        PathPack {
            id,
            paths: ids
                .iter()
                .map(|id| TracingPath::new(*id, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]))
                .collect(),
            unlock_threshold,
        }
    }

    #[test]
    fn fresh_store_has_first_pack_only() {
        let progression = Progression::new(MemoryStore::new());
        assert_eq!(progression.unlocked_packs(), 1);
        assert!(progression.is_pack_unlocked(1));
        assert!(!progression.is_pack_unlocked(2));
        assert_eq!(progression.load_record("a"), ProgressRecord::default());
    }

    #[test]
    fn attempts_accumulate_and_keep_best_accuracy() {
        let mut progression = Progression::new(MemoryStore::new());
        progression.record_attempt(&summary("a", 0.7, false), None, 1000.0).unwrap();
        let record = progression.record_attempt(&summary("a", 0.5, true), None, 2000.0).unwrap();

        assert_eq!(record.attempts, 2);
        assert_eq!(record.best_accuracy, 0.7);
        assert!(record.completed);
        assert_eq!(record.last_completed_at, Some(2000.0));
        assert_eq!(progression.load_record("a"), record);
    }

    #[test]
    fn completion_is_sticky() {
        let mut progression = Progression::new(MemoryStore::new());
        progression.record_attempt(&summary("a", 0.8, true), None, 1000.0).unwrap();
        let record = progression.record_attempt(&summary("a", 0.2, false), None, 2000.0).unwrap();
        assert!(record.completed);
        assert_eq!(record.last_completed_at, Some(1000.0));
    }

    #[test]
    fn distinct_completions_unlock_next_pack() {
        let pack = pack(1, &["a", "b", "c"], 2);
        let mut progression = Progression::new(MemoryStore::new());

        progression.record_attempt(&summary("a", 0.9, true), Some(&pack), 1.0).unwrap();
        // Repeat completion does not count twice
        progression.record_attempt(&summary("a", 0.9, true), Some(&pack), 2.0).unwrap();
        assert_eq!(progression.pack_completed(1), 1);
        assert_eq!(progression.unlocked_packs(), 1);

        progression.record_attempt(&summary("b", 0.9, true), Some(&pack), 3.0).unwrap();
        assert_eq!(progression.unlocked_packs(), 2);
    }

    #[test]
    fn paths_outside_the_pack_do_not_count() {
        let pack = pack(1, &["a"], 1);
        let mut progression = Progression::new(MemoryStore::new());
        progression.record_attempt(&summary("z", 0.9, true), Some(&pack), 1.0).unwrap();
        assert_eq!(progression.pack_completed(1), 0);
        assert_eq!(progression.unlocked_packs(), 1);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set("progress:a", "{not json".to_string());
        store.set("packs:unlocked", "lots".to_string());
        store.set("pack:1:completed", "-3".to_string());

        let progression = Progression::new(store);
        assert_eq!(progression.load_record("a"), ProgressRecord::default());
        assert_eq!(progression.unlocked_packs(), 1);
        assert_eq!(progression.pack_completed(1), 0);
    }

    #[test]
    fn zero_unlock_counter_still_opens_first_pack() {
        let mut store = MemoryStore::new();
        store.set("packs:unlocked", "0".to_string());
        assert_eq!(Progression::new(store).unlocked_packs(), 1);
    }

    #[test]
    fn memory_store_json_round_trip_and_corruption() {
        let mut progression = Progression::new(MemoryStore::new());
        progression.record_attempt(&summary("a", 0.6, true), None, 5.0).unwrap();
        let json = progression.store().to_json().unwrap();

        let restored = Progression::new(MemoryStore::from_json(&json));
        assert!(restored.load_record("a").completed);

        let broken = MemoryStore::from_json("[1, 2");
        assert_eq!(broken, MemoryStore::new());
    }

    #[test]
    fn record_json_is_camel_case() {
        let record = ProgressRecord {
            completed: true,
            best_accuracy: 0.5,
            attempts: 3,
            last_completed_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("bestAccuracy"));
        assert!(json.contains("lastCompletedAt"));
    }
}
