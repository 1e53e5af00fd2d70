//! Terrasync History - remote version history
//!
//! HTTP client for the versioning server plus a caching, restartable view
//! of a project's version sequence:
//! - [`HistoryClient`] implements the `IRemoteService` port over reqwest
//! - [`VersionLog`] caches fetched versions and enforces the gapless,
//!   strictly-increasing numbering invariant

pub mod client;
pub mod log;

pub use client::HistoryClient;
pub use log::VersionLog;
