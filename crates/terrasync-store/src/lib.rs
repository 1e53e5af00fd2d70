//! Terrasync Store - content fingerprinting
//!
//! Provides:
//! - Streaming SHA-256 fingerprints over file bytes
//! - A metadata memo cache (path + mtime + size) that avoids re-hashing
//!   files that have not changed on disk

mod store;

pub use store::ContentStore;
