//! 持久化存储实现

pub mod json;
pub mod sqlite;

pub use json::{JsonHistoryStore, JsonPromptStore};
pub use sqlite::SqliteHistoryStore;
