//! Task metadata: the record persisted in `task_metadata.json` per task
//! and, in aggregate, in `task_history.json` (spec §3 Task, §4.E).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub task_id: String,
    pub description: String,
    /// Seconds since epoch, fractional.
    pub created_at: f64,
    pub last_updated: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub total_cost: f64,
    pub size_bytes: u64,
    pub is_favorited: bool,
    pub provider: String,
    pub model: String,
    pub repo_root: String,
}

/// Fields a caller may supply to [`crate::conversation::index::TaskIndex::upsert`].
/// Absent fields are left unchanged on update, or default on insert.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub repo_root: Option<String>,
    pub tokens_in: Option<u64>,
    pub tokens_out: Option<u64>,
    pub total_cost: Option<f64>,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Newest,
    Oldest,
    Cost,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub total_count: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Truncate `s` to at most `max_chars` Unicode scalar values, the way
/// `description = truncate(user_input, 100)` (spec §4.G step 1) requires.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
