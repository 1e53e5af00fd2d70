//! Port definitions (hexagonal architecture)
//!
//! These traits define the boundaries between domain logic and the outside
//! world. Adapter crates implement them:
//! - `IRemoteService` - `terrasync-history` (HTTP client to the server)
//! - `IContentStore` - `terrasync-store` (fingerprints + memo cache)
//! - `ILocalFileSystem` - `terrasync-sync` (local file I/O adapter)
//! - `ISyncObserver` - callers wanting progress callbacks (CLI, GUI host)

pub mod content_store;
pub mod local_filesystem;
pub mod observer;
pub mod remote_service;

pub use content_store::IContentStore;
pub use local_filesystem::{FileState, ILocalFileSystem};
pub use observer::{ISyncObserver, NoopObserver, TransferDirection};
pub use remote_service::{FilePayloads, IRemoteService};
