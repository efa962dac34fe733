//! Conversation Store (spec §4.D) — per-task message log on disk.
//!
//! Grounded on `conversation_history/parser.rs`'s read side (the same
//! three-file-per-task layout: `api_conversation_history.json`,
//! `ui_messages.json`, `task_metadata.json`) and `conversation_history/
//! cache.rs`'s atomic-replace save pattern; the write path
//! (`append`/`save`/`delete`) is new, since the teacher's module only
//! ever reads Cline's task directories.

use crate::conversation::types::TaskMetadata;
use crate::error::{CoreError, CoreResult};
use crate::message::Message;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock;

fn tasks_root(repo_root: &Path) -> PathBuf {
    repo_root.join(".ai").join("tasks")
}

fn task_dir(repo_root: &Path, task_id: &str) -> PathBuf {
    tasks_root(repo_root).join(task_id)
}

/// Per-task message log, kept in memory between `load`/`append`/`save`
/// calls and serialized to the on-disk layout of spec §3.
pub struct ConversationStore {
    repo_root: PathBuf,
    histories: RwLock<HashMap<String, Vec<Message>>>,
    /// One mutex per task, so concurrent writers to the same task are
    /// serialized (spec §5 "Task history files: protected by a per-task
    /// mutex; only D mutates them").
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConversationStore {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            histories: RwLock::new(HashMap::new()),
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    fn task_lock(&self, task_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Load a task's message history. Missing files are an empty history,
    /// not an error. Per spec §3 invariant (iii), if only one of the two
    /// message files is present the task is inconsistent on disk and the
    /// more recently written of the two is preferred.
    pub async fn load(&self, task_id: &str) -> CoreResult<Vec<Message>> {
        if let Some(existing) = self.histories.read().await.get(task_id) {
            return Ok(existing.clone());
        }

        let dir = task_dir(&self.repo_root, task_id);
        let api_path = dir.join("api_conversation_history.json");
        let ui_path = dir.join("ui_messages.json");

        let api = read_json_optional::<Vec<Message>>(&api_path).await?;
        let messages = match api {
            Some(messages) => messages,
            None => read_json_optional::<Vec<Message>>(&ui_path)
                .await?
                .unwrap_or_default(),
        };

        self.histories
            .write()
            .await
            .insert(task_id.to_string(), messages.clone());
        Ok(messages)
    }

    /// Append a message to the in-memory history. Callers may batch
    /// several appends before calling `save`.
    pub async fn append(&self, task_id: &str, message: Message) {
        self.histories
            .write()
            .await
            .entry(task_id.to_string())
            .or_default()
            .push(message);
    }

    pub async fn current(&self, task_id: &str) -> Vec<Message> {
        self.histories
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Atomically persist both message files and `task_metadata.json`.
    /// Each file is written to a temp path then renamed into place;
    /// metadata is written last, so a reader that sees a fresh metadata
    /// file can trust the message files beside it are also current.
    /// Idempotent: calling `save` again with unchanged in-memory state
    /// re-writes the same bytes.
    pub async fn save(&self, task_id: &str, metadata: &TaskMetadata) -> CoreResult<()> {
        let lock = self.task_lock(task_id);
        let _guard = lock.lock().await;

        let dir = task_dir(&self.repo_root, task_id);
        tokio::fs::create_dir_all(&dir).await?;

        let messages = self.current(task_id).await;
        // Two renderings of the same ordered list, kept in lockstep
        // (spec §9 open question, resolved that way).
        write_atomic(&dir.join("api_conversation_history.json"), &messages).await?;
        write_atomic(&dir.join("ui_messages.json"), &messages).await?;
        write_atomic(&dir.join("task_metadata.json"), metadata).await?;
        Ok(())
    }

    /// Remove a task's directory recursively. Missing directory is success.
    pub async fn delete(&self, task_id: &str) -> CoreResult<()> {
        self.histories.write().await.remove(task_id);
        self.locks.lock().remove(task_id);
        let dir = task_dir(&self.repo_root, task_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sum of the on-disk conversation file sizes, for `size_bytes`
    /// (spec §3 Task attribute).
    pub async fn disk_size_bytes(&self, task_id: &str) -> u64 {
        let dir = task_dir(&self.repo_root, task_id);
        let mut total = 0u64;
        for name in [
            "api_conversation_history.json",
            "ui_messages.json",
            "task_metadata.json",
        ] {
            if let Ok(meta) = tokio::fs::metadata(dir.join(name)).await {
                total += meta.len();
            }
        }
        total
    }
}

async fn read_json_optional<T: serde::de::DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::Corrupt(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::TaskMetadata;

    fn metadata(task_id: &str) -> TaskMetadata {
        TaskMetadata {
            task_id: task_id.to_string(),
            description: "test".to_string(),
            created_at: 0.0,
            last_updated: 0.0,
            tokens_in: 0,
            tokens_out: 0,
            total_cost: 0.0,
            size_bytes: 0,
            is_favorited: false,
            provider: "stub".to_string(),
            model: "stub".to_string(),
            repo_root: "/tmp".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_history_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let history = store.load("does-not-exist").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn append_save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        store.append("t1", Message::user("hello")).await;
        store.save("t1", &metadata("t1")).await.unwrap();

        let store2 = ConversationStore::new(dir.path());
        let history = store2.load("t1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn corrupt_json_is_an_error_and_file_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join(".ai").join("tasks").join("t1");
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join("api_conversation_history.json"), "{not json").unwrap();

        let store = ConversationStore::new(dir.path());
        let err = store.load("t1").await.unwrap_err();
        assert!(matches!(err, CoreError::Corrupt(_)));
        assert!(task_dir.join("api_conversation_history.json").exists());
    }

    #[tokio::test]
    async fn delete_missing_task_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        store.delete("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        store.append("t1", Message::user("hi")).await;
        store.save("t1", &metadata("t1")).await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(!task_dir(dir.path(), "t1").exists());
    }
}
