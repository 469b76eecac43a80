//! Adapters binding the store traits to concrete backends.

pub mod gotrue;
pub mod memory_session;
pub mod postgres;

pub use gotrue::GoTrueSessionStore;
pub use memory_session::MemorySessionStore;
pub use postgres::PostgresRecordStore;
