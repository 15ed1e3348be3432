//! Data source adapters for blockq virtual tables
//!
//! Every adapter implements [`DataSource`] and returns a finite [`RowSet`]
//! whose rows follow the table's stored-column order. Each row set is tagged
//! with a [`Freshness`] so callers can tell live data from fallback data.

pub mod fallback;
pub mod memory;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod rpc;
pub mod snapshot;
pub mod source;

pub use fallback::FallbackSource;
pub use memory::MemorySource;
pub use mock::MockSource;
pub use registry::SourceRegistry;
pub use retry::{retry_async, RetryPolicy};
pub use rpc::{RpcConfig, RpcSource, TokenMint};
pub use snapshot::SnapshotSource;
pub use source::{Cursor, DataSource, Freshness, Row, RowSet};
