//! Key Cache Module
//!
//! Bounded in-memory cache of loaded key material.
//!
//! ## Responsibilities
//! - At most one entry per key identifier (byte-exact match)
//! - Load-on-miss through a pluggable [`KeyLoader`] backend
//! - Hard capacity ceiling: a full cache rejects new keys, it never evicts
//! - Secure erasure of key material on delete, clear, and teardown
//!
//! ## Data Structure Choice
//! HashMap behind a single parking_lot Mutex:
//! - Every operation, including the backend load on a miss, runs under
//!   the lock, so add/lookup/delete are linearizable
//! - Callers receive copies; the cache is the only owner of cached bytes

mod table;
mod loader;

pub use table::KeyCache;
pub use loader::{FileKeyLoader, KeyLoader};
