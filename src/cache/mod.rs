//! Read-through cache for tracker reads.
//!
//! Reads are memoized by [`Fingerprint`]; mutations pass through and drop the
//! entries they may have changed. The cache can be persisted to disk and is
//! flushed periodically and on close.

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod store;

pub use client::{CacheStore, CachedTrackerClient};
pub use error::CacheError;
pub use fingerprint::Fingerprint;
pub use store::{CacheEntry, DiskImage};
