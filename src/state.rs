//! Shared application state for the REST server.
//!
//! Grounded on the teacher's `AppState`: a process-wide struct behind
//! `Arc`, holding the access-log ring buffer (`add_access_log`) and a
//! lazily-populated cache (the teacher's `ISSUE_CACHE`), here
//! generalized to a per-`repo_root` cache of engine/store/index trios
//! instead of a single fixed Jira connection.

use crate::adapter::ModelAdapter;
use crate::config::EngineConfig;
use crate::conversation::{ConversationStore, TaskIndex};
use crate::coordinator::ToolCoordinator;
use crate::engine::TaskEngine;
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Single access log entry for HTTP requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: u64,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub client_ip: String,
}

/// Everything scoped to one `repo_root`: the tool coordinator is
/// process-wide (tools don't vary by repo), but the conversation store,
/// task index, and the engine that binds them together are per-root.
pub struct RepoContext {
    pub engine: Arc<TaskEngine>,
    pub store: Arc<ConversationStore>,
    pub index: Arc<TaskIndex>,
}

pub struct AppState {
    coordinator: Arc<ToolCoordinator>,
    adapter: Arc<dyn ModelAdapter>,
    engine_config: EngineConfig,
    repos: RwLock<HashMap<String, Arc<RepoContext>>>,
    start_time: Instant,
    access_log: RwLock<Vec<AccessLogEntry>>,
    log_counter: RwLock<u64>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<ToolCoordinator>,
        adapter: Arc<dyn ModelAdapter>,
        engine_config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            adapter,
            engine_config,
            repos: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            access_log: RwLock::new(Vec::new()),
            log_counter: RwLock::new(0),
        })
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    /// Look up (or lazily create) the engine/store/index trio for
    /// `repo_root`. Per spec §4.E: "a single process-wide instance per
    /// `repo_root` is sufficient."
    pub fn repo_context(&self, repo_root: &Path) -> CoreResult<Arc<RepoContext>> {
        let canonical = repo_root
            .canonicalize()
            .map_err(|e| CoreError::InvalidPath(format!("repository_path '{}': {e}", repo_root.display())))?;
        let key = canonical.display().to_string();

        if let Some(existing) = self.repos.read().get(&key) {
            return Ok(existing.clone());
        }

        let mut repos = self.repos.write();
        if let Some(existing) = repos.get(&key) {
            return Ok(existing.clone());
        }

        let store = Arc::new(ConversationStore::new(&canonical));
        let index = Arc::new(TaskIndex::load(&canonical)?);
        let engine = Arc::new(TaskEngine::with_config(
            self.coordinator.clone(),
            store.clone(),
            index.clone(),
            self.adapter.clone(),
            self.engine_config.clone(),
        ));
        let context = Arc::new(RepoContext { engine, store, index });
        repos.insert(key, context.clone());
        Ok(context)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn add_access_log(&self, method: String, path: String, status_code: u16, duration_ms: u64, client_ip: String) {
        let mut counter = self.log_counter.write();
        *counter += 1;
        let id = *counter;

        let entry = AccessLogEntry {
            id,
            timestamp: chrono::Local::now().to_rfc3339(),
            method,
            path,
            status_code,
            duration_ms,
            client_ip,
        };

        let mut log = self.access_log.write();
        log.push(entry);
        let len = log.len();
        if len > 1000 {
            log.drain(0..len - 1000);
        }
    }

    pub fn get_access_logs(&self) -> Vec<AccessLogEntry> {
        self.access_log.read().clone()
    }

    pub fn clear_access_logs(&self) {
        self.access_log.write().clear();
    }
}
