//! Terrasync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ProjectInfo`, `Version`, `ProjectDiff`, `Conflict`, `WorkingCopy`
//! - **Port definitions** - Traits for adapters: `IRemoteService`, `IContentStore`,
//!   `ILocalFileSystem`, `ISyncObserver`
//! - **Error taxonomy** - `DomainError` for validation, `SyncError` for sync outcomes
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O beyond the
//! working-copy metadata files it owns. Ports define trait interfaces that
//! adapter crates implement. The sync orchestrator (`terrasync-sync`)
//! coordinates domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
