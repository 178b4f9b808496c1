// Storage module: kv persistence and the price history built on it.

pub mod history;
pub mod sqlite;
pub mod traits;

pub use history::{AppendOutcome, append_price, load_history, summarize};
pub use sqlite::SqliteStorage;
pub use traits::KeyValueStore;
