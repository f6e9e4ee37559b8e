pub mod history_store;
pub mod types;

pub use history_store::{HistoryStore, MemoryError};
pub use types::*;
