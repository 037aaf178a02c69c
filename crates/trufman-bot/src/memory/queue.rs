//! Background writer for seat records.
//!
//! Submissions for the same key replace each other while they wait, and a
//! single worker thread performs every write, so two saves of one seat never
//! interleave and only the newest record reaches the store. Keys are written
//! in the order they first entered the queue; a replaced record keeps its
//! key's place.

use super::{BotMemory, MemoryStore, StoreError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub written: u64,
    pub failed: u64,
    pub coalesced: u64,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<String, BotMemory>,
    order: VecDeque<String>,
    in_flight: Option<(String, BotMemory)>,
    shutdown: bool,
    stats: QueueStats,
}

struct Shared {
    store: Arc<dyn MemoryStore>,
    state: Mutex<QueueState>,
    wake: Condvar,
    idle: Condvar,
}

pub struct PersistQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistQueue {
    pub fn new(store: Arc<dyn MemoryStore>) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            store,
            state: Mutex::new(QueueState::default()),
            wake: Condvar::new(),
            idle: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("trufman-persist".into())
            .spawn(move || run_worker(&worker_shared))?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queues `memory` for `key`, replacing any record still waiting for that key.
    pub fn submit(&self, key: &str, memory: BotMemory) {
        let mut state = self.shared.state.lock();
        if state.pending.insert(key.to_string(), memory).is_some() {
            state.stats.coalesced += 1;
        } else {
            state.order.push_back(key.to_string());
        }
        drop(state);
        self.shared.wake.notify_one();
    }

    /// The newest record for `key`, including ones not yet written.
    pub fn load(&self, key: &str) -> Result<Option<BotMemory>, StoreError> {
        {
            let state = self.shared.state.lock();
            if let Some(memory) = state.pending.get(key) {
                return Ok(Some(memory.clone()));
            }
            if let Some((flight_key, memory)) = &state.in_flight {
                if flight_key == key {
                    return Ok(Some(memory.clone()));
                }
            }
        }
        self.shared.store.load(key)
    }

    /// Blocks until every queued record has been attempted.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock();
        while !state.shutdown && (!state.pending.is_empty() || state.in_flight.is_some()) {
            self.shared.idle.wait(&mut state);
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.lock().stats
    }

    /// Writes what is still queued, then stops the worker.
    pub fn shutdown(&self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!(
                    target: "trufman_bot::memory",
                    reason = "worker_panicked",
                    message = "persistence worker exited abnormally"
                );
            }
        }
    }
}

impl Drop for PersistQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        let next = state
            .order
            .pop_front()
            .and_then(|key| state.pending.remove(&key).map(|memory| (key, memory)));
        if let Some((key, memory)) = next {
            state.in_flight = Some((key.clone(), memory.clone()));
            let result =
                MutexGuard::unlocked(&mut state, || shared.store.save(&key, &memory));
            match result {
                Ok(()) => state.stats.written += 1,
                Err(err) => {
                    state.stats.failed += 1;
                    tracing::warn!(
                        target: "trufman_bot::memory",
                        key = %key,
                        error = %err,
                        reason = "save_failed",
                        message = "keeping record in memory only"
                    );
                }
            }
            state.in_flight = None;
            if state.pending.is_empty() {
                shared.idle.notify_all();
            }
            continue;
        }
        if state.shutdown {
            break;
        }
        shared.wake.wait(&mut state);
    }
    shared.idle.notify_all();
}
