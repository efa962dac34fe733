//! Session Store: the on-disk representation of a task (spec §3-4.D/E).

pub mod index;
pub mod store;
pub mod types;

pub use index::TaskIndex;
pub use store::ConversationStore;
pub use types::{IndexStats, SortBy, TaskMetadata, TaskUpdate};
