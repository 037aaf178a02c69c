//! Learned weights and opponent tendencies kept per seat, with best-effort persistence.
//!
//! The in-memory [`BotMemory`] is authoritative for a session. Stores are
//! reached through [`MemoryHandle`], which logs and swallows every failure.

mod queue;
mod store;

pub use queue::{PersistQueue, QueueStats};
pub use store::{InMemoryStore, JsonDirStore, MemoryStore, StoreError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use trufman_core::belief::{OpponentBook, OpponentModel};
use trufman_core::model::player::PlayerPosition;

pub const MEMORY_VERSION: u32 = 1;
pub const DEFAULT_NAMESPACE: &str = "trufman_bot_memory_v1";

/// Storage key of one seat's record.
pub fn seat_key(namespace: &str, seat: PlayerPosition) -> String {
    format!("{namespace}:seat:{}", seat.index())
}

/// Feature key to running adjustment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    weights: BTreeMap<String, f32>,
}

impl WeightTable {
    pub fn get(&self, key: &str) -> f32 {
        self.weights.get(key).copied().unwrap_or(0.0)
    }

    /// Adds `delta` to `key`, keeping the result within `[-limit, limit]`.
    pub fn adjust(&mut self, key: &str, delta: f32, limit: f32) -> f32 {
        if !delta.is_finite() {
            return self.get(key);
        }
        let entry = self.weights.entry(key.to_string()).or_insert(0.0);
        *entry = (*entry + delta).clamp(-limit, limit);
        *entry
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn clear(&mut self) {
        self.weights.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.weights.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

/// The persisted record of one seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMemory {
    pub version: u32,
    #[serde(default)]
    pub weights: WeightTable,
    #[serde(default)]
    pub games: u64,
    #[serde(default)]
    pub opponent_models: BTreeMap<u8, OpponentModel>,
}

impl Default for BotMemory {
    fn default() -> Self {
        Self {
            version: MEMORY_VERSION,
            weights: WeightTable::default(),
            games: 0,
            opponent_models: BTreeMap::new(),
        }
    }
}

impl BotMemory {
    pub fn opponent_book(&self) -> OpponentBook {
        let mut book = OpponentBook::new();
        for (index, model) in &self.opponent_models {
            if let Some(seat) = PlayerPosition::from_index(*index as usize) {
                book.set_model(seat, *model);
            }
        }
        book
    }

    pub fn record_opponents(&mut self, book: &OpponentBook) {
        self.opponent_models = PlayerPosition::LOOP
            .iter()
            .map(|seat| (seat.index() as u8, *book.model(*seat)))
            .collect();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Clone)]
enum Backend {
    Disabled,
    Direct(Arc<dyn MemoryStore>),
    Queued(Arc<PersistQueue>),
}

/// Best-effort access to a store. Never returns an error.
#[derive(Clone)]
pub struct MemoryHandle {
    backend: Backend,
}

impl fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backend {
            Backend::Disabled => "disabled",
            Backend::Direct(_) => "direct",
            Backend::Queued(_) => "queued",
        };
        f.debug_struct("MemoryHandle").field("backend", &kind).finish()
    }
}

impl MemoryHandle {
    /// Keeps everything in memory.
    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
        }
    }

    /// Saves synchronously on the calling thread.
    pub fn direct(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            backend: Backend::Direct(store),
        }
    }

    /// Hands saves to a background writer.
    pub fn queued(queue: Arc<PersistQueue>) -> Self {
        Self {
            backend: Backend::Queued(queue),
        }
    }

    /// The stored record for `key`, or a fresh one when absent, unreadable or outdated.
    pub fn load(&self, key: &str) -> BotMemory {
        let result = match &self.backend {
            Backend::Disabled => Ok(None),
            Backend::Direct(store) => store.load(key),
            Backend::Queued(queue) => queue.load(key),
        };
        match result {
            Ok(Some(memory)) if memory.version == MEMORY_VERSION => memory,
            Ok(Some(memory)) => {
                tracing::warn!(
                    target: "trufman_bot::memory",
                    key,
                    version = memory.version,
                    reason = "version_mismatch",
                    message = "discarding stored record"
                );
                BotMemory::default()
            }
            Ok(None) => BotMemory::default(),
            Err(err) => {
                tracing::warn!(
                    target: "trufman_bot::memory",
                    key,
                    error = %err,
                    reason = "load_failed",
                    message = "continuing with a fresh record"
                );
                BotMemory::default()
            }
        }
    }

    /// Returns whether the record was handed off; failures are logged.
    pub fn save(&self, key: &str, memory: &BotMemory) -> bool {
        match &self.backend {
            Backend::Disabled => true,
            Backend::Direct(store) => match store.save(key, memory) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        target: "trufman_bot::memory",
                        key,
                        error = %err,
                        reason = "save_failed",
                        message = "keeping record in memory only"
                    );
                    false
                }
            },
            Backend::Queued(queue) => {
                queue.submit(key, memory.clone());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trufman_core::model::suit::Suit;

    #[test]
    fn weights_clamp_and_ignore_non_finite_deltas() {
        let mut table = WeightTable::default();
        assert_eq!(table.get("k"), 0.0);
        assert_eq!(table.adjust("k", 3.0, 4.0), 3.0);
        assert_eq!(table.adjust("k", 3.0, 4.0), 4.0);
        assert_eq!(table.adjust("k", f32::NAN, 4.0), 4.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn record_uses_the_documented_field_names() {
        let mut memory = BotMemory::default();
        memory.weights.adjust("v2|isT:1|b:A|pos:0|need:pos|end:0", 0.15, 4.0);
        memory.games = 3;
        let mut book = OpponentBook::new();
        book.observe_bid(&trufman_core::model::bid::Bid::new(
            PlayerPosition::East,
            Suit::Hearts,
            trufman_core::model::rank::Rank::Five,
        ));
        memory.record_opponents(&book);

        let value: serde_json::Value = serde_json::from_str(&memory.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["games"], 3);
        assert!(value["weights"]["v2|isT:1|b:A|pos:0|need:pos|end:0"].is_number());
        assert_eq!(value["opponentModels"]["1"]["bidHistogram"][2], 1);
        assert!(value["opponentModels"]["1"]["overtrumpFrequency"].is_number());

        let restored = BotMemory::from_json(&memory.to_json().unwrap()).unwrap();
        assert_eq!(restored.opponent_book(), book);
    }

    #[test]
    fn missing_fields_default() {
        let memory = BotMemory::from_json(r#"{"version":1}"#).unwrap();
        assert_eq!(memory, BotMemory::default());
    }

    #[test]
    fn disabled_handle_loads_fresh_records() {
        let handle = MemoryHandle::disabled();
        assert_eq!(handle.load("any"), BotMemory::default());
        assert!(handle.save("any", &BotMemory::default()));
    }

    #[test]
    fn outdated_records_are_discarded() {
        let store = Arc::new(InMemoryStore::new());
        let mut old = BotMemory::default();
        old.version = 0;
        old.games = 9;
        store.save("seat", &old).unwrap();
        let handle = MemoryHandle::direct(store);
        assert_eq!(handle.load("seat"), BotMemory::default());
    }

    #[test]
    fn seat_keys_embed_the_namespace() {
        assert_eq!(
            seat_key(DEFAULT_NAMESPACE, PlayerPosition::South),
            "trufman_bot_memory_v1:seat:2"
        );
    }
}
