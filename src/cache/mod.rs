//! Versioned local cache
//!
//! Cached query results are stamped with a version tag taken from the
//! [`VersionRegistry`]. A write elsewhere invalidates every cached result of
//! a domain by bumping its version; stale cells are reclaimed lazily on read.
//!
//! # Cell validity
//!
//! | Condition | Result |
//! |-----------|--------|
//! | missing or unparsable | miss |
//! | `now > expireAt` | miss, cell evicted |
//! | `version != registry.cache_key(key)` | miss, cell evicted |
//! | otherwise | hit |

pub mod store;
pub mod version;

pub use store::{CacheCell, Expiry, ExpiringStore};
pub use version::{VersionRegistry, VERSION_STORE_KEY};
