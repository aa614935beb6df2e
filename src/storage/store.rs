//! Concurrent task and user store with optional JSON snapshot.

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::storage::{StoreError, StoreResult};
use crate::tasks::model::Task;
use crate::users::model::User;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    tasks: Vec<Task>,
    users: Vec<User>,
    #[serde(default)]
    spent_hashes: Vec<B256>,
}

/// Shared store for tasks and users.
pub struct Store {
    tasks: DashMap<String, Task>,
    /// `taskHash` → id of the task holding it, across all owners.
    task_hashes: DashMap<B256, String>,
    /// Hashes of every task ever verified. Survives task deletion, so a
    /// completed on-chain record pays out once.
    spent_hashes: DashSet<B256>,
    users: DashMap<Address, User>,
    snapshot_path: Option<PathBuf>,
    dirty: AtomicBool,
    write_lock: Mutex<()>,
}

impl Store {
    /// Create an empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            tasks: DashMap::new(),
            task_hashes: DashMap::new(),
            spent_hashes: DashSet::new(),
            users: DashMap::new(),
            snapshot_path: None,
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Open a store, loading the snapshot file if it exists.
    pub fn open(snapshot_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut store = Self::in_memory();
        let Some(path) = snapshot_path else {
            return Ok(store);
        };

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for hash in snapshot.spent_hashes {
                store.spent_hashes.insert(hash);
            }
            for task in snapshot.tasks {
                if let Some(hash) = task.task_hash {
                    store.task_hashes.insert(hash, task.id.clone());
                    if task.verified {
                        store.spent_hashes.insert(hash);
                    }
                }
                store.tasks.insert(task.id.clone(), task);
            }
            for user in snapshot.users {
                store.users.insert(user.address, user);
            }
            tracing::info!(
                path = %path.display(),
                tasks = store.tasks.len(),
                users = store.users.len(),
                spent_hashes = store.spent_hashes.len(),
                "Loaded store snapshot"
            );
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    /// Write the snapshot file now. Blocking.
    pub fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().expect("store write mutex poisoned");

        let mut snapshot = Snapshot {
            tasks: self.tasks.iter().map(|r| r.value().clone()).collect(),
            users: self.users.iter().map(|r| r.value().clone()).collect(),
            spent_hashes: self.spent_hashes.iter().map(|h| *h).collect(),
        };
        snapshot.tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        snapshot.spent_hashes.sort();

        let tmp = path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, &snapshot)?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), tasks = snapshot.tasks.len(), "Saved store snapshot");
        Ok(())
    }

    /// Mark the snapshot stale. The flusher writes it out.
    fn persist(&self) {
        if self.snapshot_path.is_some() {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Whether changes are waiting to be written.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the snapshot on the blocking pool if anything changed.
    pub async fn flush(self: &Arc<Self>) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let store = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || store.save()).await;
        let failed = match result {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to persist store snapshot");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Snapshot writer panicked");
                true
            }
        };
        if failed {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Flush the snapshot every `interval` until shutdown.
    ///
    /// The final write on shutdown is left to the caller's `save`.
    pub async fn run_flusher(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        if self.snapshot_path.is_none() {
            return;
        }
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush().await,
                _ = shutdown.recv() => break,
            }
        }
    }

    fn check_unspent(&self, hash: &B256) -> StoreResult<()> {
        if self.spent_hashes.contains(hash) {
            return Err(StoreError::SpentHash);
        }
        Ok(())
    }

    /// Insert a new task. A hash held by any task, or already verified
    /// once, is rejected.
    pub fn insert_task(&self, task: Task) -> StoreResult<Task> {
        if let Some(hash) = task.task_hash {
            self.check_unspent(&hash)?;
            match self.task_hashes.entry(hash) {
                Entry::Occupied(_) => return Err(StoreError::DuplicateHash),
                Entry::Vacant(slot) => {
                    slot.insert(task.id.clone());
                }
            }
        }
        self.tasks.insert(task.id.clone(), task.clone());
        self.persist();
        Ok(task)
    }

    /// Fetch a task owned by `owner`.
    pub fn get_task(&self, owner: &Address, id: &str) -> Option<Task> {
        self.tasks
            .get(id)
            .filter(|t| t.user_address == *owner)
            .map(|t| t.value().clone())
    }

    /// All tasks of `owner`, newest first.
    pub fn list_tasks(&self, owner: &Address) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|r| r.user_address == *owner)
            .map(|r| r.value().clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Apply `f` to a task owned by `owner` atomically.
    ///
    /// Returns `Ok(None)` when no such task exists. When `f` fails the stored
    /// task is left unchanged.
    pub fn modify_task<F, E>(&self, owner: &Address, id: &str, f: F) -> Result<Option<Task>, E>
    where
        F: FnOnce(&mut Task) -> Result<(), E>,
        E: From<StoreError>,
    {
        let updated = {
            let mut entry = match self.tasks.get_mut(id) {
                Some(entry) if entry.user_address == *owner => entry,
                _ => return Ok(None),
            };

            let mut draft = entry.clone();
            f(&mut draft)?;

            if draft.task_hash != entry.task_hash {
                if let Some(hash) = draft.task_hash {
                    self.check_unspent(&hash)?;
                    match self.task_hashes.entry(hash) {
                        Entry::Occupied(o) if o.get() != id => {
                            return Err(StoreError::DuplicateHash.into())
                        }
                        Entry::Occupied(_) => {}
                        Entry::Vacant(slot) => {
                            slot.insert(id.to_string());
                        }
                    }
                }
                if let Some(old) = entry.task_hash {
                    self.task_hashes.remove(&old);
                }
            }
            if draft.verified && !entry.verified {
                if let Some(hash) = draft.task_hash {
                    self.spent_hashes.insert(hash);
                }
            }

            *entry = draft.clone();
            draft
        };

        self.persist();
        Ok(Some(updated))
    }

    /// Delete a task owned by `owner`. Returns whether anything was removed.
    ///
    /// The hash of a verified task stays spent.
    pub fn delete_task(&self, owner: &Address, id: &str) -> bool {
        let removed = self.tasks.remove_if(id, |_, t| t.user_address == *owner);
        match removed {
            Some((_, task)) => {
                if let Some(hash) = task.task_hash {
                    self.task_hashes.remove_if(&hash, |_, holder| holder == id);
                }
                self.persist();
                true
            }
            None => false,
        }
    }

    /// Whether a verified task ever carried `hash`.
    pub fn is_spent(&self, hash: &B256) -> bool {
        self.spent_hashes.contains(hash)
    }

    /// Tasks of every owner that are completed but not yet verified.
    pub fn completed_unverified(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|r| r.completed && !r.verified && r.task_hash.is_some())
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Upsert a user on login: insert with a zero balance, or refresh
    /// `lastLogin` on an existing record.
    pub fn record_login(&self, address: Address, now: DateTime<Utc>) -> User {
        let user = self
            .users
            .entry(address)
            .and_modify(|u| u.last_login = now)
            .or_insert_with(|| User::new(address, now))
            .value()
            .clone();
        self.persist();
        user
    }

    pub fn get_user(&self, address: &Address) -> Option<User> {
        self.users.get(address).map(|u| u.value().clone())
    }

    /// Add `amount` to a user's balance. Returns `None` for unknown users.
    pub fn adjust_balance(&self, address: &Address, amount: f64) -> Option<User> {
        let user = {
            let mut entry = self.users.get_mut(address)?;
            entry.token_balance += amount;
            entry.value().clone()
        };
        self.persist();
        Some(user)
    }
}
