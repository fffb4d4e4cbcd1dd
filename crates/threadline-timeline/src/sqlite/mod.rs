//! `SQLite` backing for the relational row source.
//!
//! - [`connection`]: pooled connections with WAL pragmas
//! - [`row_source`]: keyset-paged [`RowPageSource`](crate::hydrate::RowPageSource)
//!   over the `messages` table

pub mod connection;
pub mod row_source;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool, PooledConnection};
pub use row_source::SqliteRowSource;
