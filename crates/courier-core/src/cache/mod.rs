//! Result cache for GET-style invocations.
//!
//! Records are keyed by the canonical request key (resolved URL plus encoded
//! query) and stay fresh for a renewal window. Lookups are answered from
//! memory first, then from an optional [`CacheBackingStore`]. Writes are
//! submitted to a [`TaskExecutor`](crate::executor::TaskExecutor) so callers
//! never wait on them.

pub mod record;
pub mod result_cache;
pub mod store;

pub use record::CacheRecord;
pub use result_cache::ResultCache;
pub use store::{CacheBackingStore, CacheStoreError, SharedMapStore};
