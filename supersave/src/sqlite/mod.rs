//! SQLite engine repository and schema synchronizer.

mod repo;
mod sync;

pub use repo::SqliteRepository;
pub use sync::{ensure_base_table, sync};
