pub mod cache;
pub mod connection;

pub use cache::{LocalCache, MemoryCache, SqliteCache, CACHE_KEY};
pub use connection::Database;
