//! Task Index (spec §4.E) — the aggregate metadata list across tasks,
//! backed by `task_history.json`.
//!
//! Grounded on `conversation_history/cache.rs`'s disk-JSON index
//! read/write pattern, turned from a read-only TTL cache into a live
//! mutable store: `upsert`/`search`/`toggle_favorite`/`delete`/`stats`
//! instead of `load_tasks_index`/`save_tasks_index` alone.

use crate::conversation::types::{IndexStats, SortBy, TaskMetadata, TaskUpdate};
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

fn index_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".ai").join("history").join("task_history.json")
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// In-memory vector of task metadata, read-write-locked (spec §4.E:
/// "concurrent readers use a read lock; writers take an exclusive lock").
/// One instance is sufficient per `repo_root`.
pub struct TaskIndex {
    repo_root: PathBuf,
    records: RwLock<Vec<TaskMetadata>>,
}

impl TaskIndex {
    /// Parse `task_history.json`; a missing file is an empty index, not
    /// an error.
    pub fn load(repo_root: impl Into<PathBuf>) -> CoreResult<Self> {
        let repo_root = repo_root.into();
        let path = index_path(&repo_root);
        let records = match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)
                .map_err(|e| CoreError::Corrupt(format!("{}: {e}", path.display())))?,
            _ => Vec::new(),
        };
        Ok(Self {
            repo_root,
            records: RwLock::new(records),
        })
    }

    pub fn get(&self, task_id: &str) -> Option<TaskMetadata> {
        self.records.read().iter().find(|r| r.task_id == task_id).cloned()
    }

    /// Insert a new record (`created_at = now`) if `task_id` is absent;
    /// otherwise refresh `last_updated` and any fields `update` supplies.
    pub fn upsert(&self, task_id: &str, update: TaskUpdate) -> TaskMetadata {
        let now = now_secs();
        let mut records = self.records.write();

        if let Some(existing) = records.iter_mut().find(|r| r.task_id == task_id) {
            existing.last_updated = now;
            if let Some(v) = update.description {
                existing.description = v;
            }
            if let Some(v) = update.provider {
                existing.provider = v;
            }
            if let Some(v) = update.model {
                existing.model = v;
            }
            if let Some(v) = update.repo_root {
                existing.repo_root = v;
            }
            if let Some(v) = update.tokens_in {
                existing.tokens_in = v;
            }
            if let Some(v) = update.tokens_out {
                existing.tokens_out = v;
            }
            if let Some(v) = update.total_cost {
                existing.total_cost = v;
            }
            if let Some(v) = update.size_bytes {
                existing.size_bytes = v;
            }
            return existing.clone();
        }

        let record = TaskMetadata {
            task_id: task_id.to_string(),
            description: update.description.unwrap_or_default(),
            created_at: now,
            last_updated: now,
            tokens_in: update.tokens_in.unwrap_or(0),
            tokens_out: update.tokens_out.unwrap_or(0),
            total_cost: update.total_cost.unwrap_or(0.0),
            size_bytes: update.size_bytes.unwrap_or(0),
            is_favorited: false,
            provider: update.provider.unwrap_or_default(),
            model: update.model.unwrap_or_default(),
            repo_root: update.repo_root.unwrap_or_default(),
        };
        records.push(record.clone());
        record
    }

    /// Case-insensitive substring match of `query` against `description`;
    /// optional favorites filter; sorted per `sort_by`; capped at `limit`.
    pub fn search(
        &self,
        query: Option<&str>,
        favorites_only: bool,
        sort_by: SortBy,
        limit: usize,
    ) -> Vec<TaskMetadata> {
        let needle = query.map(|q| q.to_lowercase());
        let mut matched: Vec<TaskMetadata> = self
            .records
            .read()
            .iter()
            .filter(|r| !favorites_only || r.is_favorited)
            .filter(|r| match &needle {
                Some(q) => r.description.to_lowercase().contains(q.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        match sort_by {
            SortBy::Newest => matched.sort_by(|a, b| {
                b.last_updated
                    .partial_cmp(&a.last_updated)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            SortBy::Oldest => matched.sort_by(|a, b| {
                a.created_at
                    .partial_cmp(&b.created_at)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            SortBy::Cost => matched.sort_by(|a, b| {
                b.total_cost
                    .partial_cmp(&a.total_cost)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }

        matched.truncate(limit);
        matched
    }

    /// Flip `is_favorited`. Errors with `NotFound` if the task is absent.
    pub fn toggle_favorite(&self, task_id: &str) -> CoreResult<bool> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.task_id == task_id)
            .ok_or_else(|| CoreError::NotFound(format!("task '{task_id}'")))?;
        record.is_favorited = !record.is_favorited;
        Ok(record.is_favorited)
    }

    /// Remove the index row. A missing row is not an error — callers
    /// pair this with `ConversationStore::delete` (spec §4.E).
    pub fn delete(&self, task_id: &str) {
        self.records.write().retain(|r| r.task_id != task_id);
    }

    /// Atomic replace of `task_history.json`.
    pub fn save(&self) -> CoreResult<()> {
        let path = index_path(&self.repo_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&*self.records.read())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        let records = self.records.read();
        IndexStats {
            total_count: records.len(),
            total_tokens: records.iter().map(|r| r.tokens_in + r.tokens_out).sum(),
            total_cost: records.iter().map(|r| r.total_cost).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_index_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = TaskIndex::load(dir.path()).unwrap();
        assert_eq!(index.stats().total_count, 0);
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let index = TaskIndex::load(dir.path()).unwrap();
        let record = index.upsert(
            "t1",
            TaskUpdate {
                description: Some("show me the readme".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(record.description, "show me the readme");
        let created = record.created_at;

        let updated = index.upsert(
            "t1",
            TaskUpdate {
                tokens_in: Some(42),
                ..Default::default()
            },
        );
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.tokens_in, 42);
        assert_eq!(updated.description, "show me the readme");
    }

    #[test]
    fn search_filters_case_insensitively_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let index = TaskIndex::load(dir.path()).unwrap();
        index.upsert("a", TaskUpdate { description: Some("Fix Login Bug".into()), total_cost: Some(1.0), ..Default::default() });
        index.upsert("b", TaskUpdate { description: Some("add README".into()), total_cost: Some(5.0), ..Default::default() });

        let hits = index.search(Some("readme"), false, SortBy::Newest, 100);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task_id, "b");

        let by_cost = index.search(None, false, SortBy::Cost, 100);
        assert_eq!(by_cost[0].task_id, "b");
    }

    #[test]
    fn toggle_favorite_twice_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let index = TaskIndex::load(dir.path()).unwrap();
        index.upsert("a", TaskUpdate::default());
        let before = index.search(None, false, SortBy::Newest, 100);
        index.toggle_favorite("a").unwrap();
        index.toggle_favorite("a").unwrap();
        let after = index.search(None, false, SortBy::Newest, 100);
        assert_eq!(before[0].is_favorited, after[0].is_favorited);
    }

    #[test]
    fn delete_removes_row() {
        let dir = tempfile::tempdir().unwrap();
        let index = TaskIndex::load(dir.path()).unwrap();
        index.upsert("a", TaskUpdate::default());
        index.delete("a");
        assert_eq!(index.stats().total_count, 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = TaskIndex::load(dir.path()).unwrap();
            index.upsert("a", TaskUpdate { description: Some("hi".into()), ..Default::default() });
            index.save().unwrap();
        }
        let reloaded = TaskIndex::load(dir.path()).unwrap();
        assert_eq!(reloaded.stats().total_count, 1);
    }
}
