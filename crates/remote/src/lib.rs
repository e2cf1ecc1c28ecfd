//! Remote content-host client layer for boxdrive.
//!
//! This crate provides the pieces the VFS adapter needs to talk to a
//! Dropbox-like content host:
//!
//! - `RemoteMetadata` - the metadata record the host reports for a path
//! - `RemoteClient` - the blocking client interface (list, streams, mutations)
//! - `ClientPool` / `ClientLease` - leased access to pooled connections
//! - `MemoryBackend` / `MemoryRemoteClient` - in-memory backend for tests
//!   and examples, with per-operation call counters
//!
//! The crate deliberately knows nothing about caching or the virtual tree;
//! that lives in the `boxdrive-vfs` crate.

mod client;
mod error;
pub mod memory;
mod metadata;
mod pool;

pub use client::RemoteClient;
pub use error::RemoteError;
pub use memory::{MemoryBackend, MemoryRemoteClient};
pub use metadata::{FileMetadata, FolderMetadata, RemoteMetadata};
pub use pool::{ClientLease, ClientPool};
