//! Persistence layer (spec §4.B): a durable, time-indexed store for
//! entries and alerts behind the [`EntryStore`] trait, with an in-memory
//! backend for tests/embedding and a WAL-mode SQLite backend for
//! production use. Grounded in `dashflow-streaming`'s `backends` module,
//! which draws the same trait/memory/sqlite split.

mod continuation;
mod error;
mod memory;
mod sqlite;
mod traits;

pub use continuation::Continuation;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AlertFilter, EntryStore, Order, QueryPage};
