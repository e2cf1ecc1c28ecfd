//! Virtual filesystem adapter over a remote content host.
//!
//! This crate reconciles a flat, network-backed metadata API (a Dropbox-like
//! content host) with a synchronous, hierarchical filesystem contract:
//! nodes, listings, metadata, content streams, rename, delete, mkdir.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: Caller (walks nodes, opens streams)
//! Layer 2: RemoteNode (metadata + children caches, mutations)
//! Layer 1: RemoteFileSystem (node identity, client pool, notifications)
//! Layer 0: boxdrive-remote (RemoteClient, ClientPool)
//! ```
//!
//! A node never fetches its own metadata directly: it asks its parent's
//! children cache, so one remote listing serves every sibling. Listings and
//! metadata are cached until a mutation, refresh, or detach invalidates
//! them.
//!
//! # Example
//!
//! ```ignore
//! use boxdrive_remote::{ClientPool, MemoryBackend, MemoryRemoteClient};
//! use boxdrive_vfs::{RemoteFileSystem, RemoteVfsOptions};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let pool = ClientPool::new(move || Ok(Box::new(MemoryRemoteClient::new(backend.clone())) as _));
//! let fs = RemoteFileSystem::new(pool, RemoteVfsOptions::default());
//!
//! for child in fs.root().child_nodes()? {
//!     println!("{} ({})", child.rel_path(), child.kind()?);
//! }
//! ```

pub mod error;
pub mod filesystem;
pub mod kind;
pub mod node;
pub mod options;
pub mod stream;

pub use error::VfsError;
pub use filesystem::RemoteFileSystem;
pub use kind::NodeKind;
pub use node::RemoteNode;
pub use options::{RemoteVfsOptions, DEFAULT_NODE_CACHE_CAPACITY};
pub use stream::{NodeReadStream, NodeWriteStream};
