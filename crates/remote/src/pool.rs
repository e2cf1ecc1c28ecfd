//! Connection pool for remote clients.
//!
//! The pool hands out [`ClientLease`]s: RAII handles that deref to the
//! underlying client and return it to the idle set exactly once when dropped.
//! A lease held across an open content stream extends the client's lease
//! until the stream itself is dropped.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::RemoteClient;
use crate::error::RemoteError;

/// Factory producing new client connections when the pool has no idle one.
type Connector = Box<dyn Fn() -> Result<Box<dyn RemoteClient>, RemoteError> + Send + Sync>;

struct PoolInner {
    /// Builds a fresh connection when the idle set is empty.
    connector: Connector,
    /// Clients not currently leased.
    idle: Mutex<Vec<Box<dyn RemoteClient>>>,
    /// Total connections ever created.
    created: AtomicU64,
    /// Leases currently outstanding.
    outstanding: AtomicU64,
}

/// Pool of connections to the remote content host.
///
/// Cloning is cheap; clones share the same idle set and counters.
#[derive(Clone)]
pub struct ClientPool {
    inner: Arc<PoolInner>,
}

impl ClientPool {
    /// Create a pool around a connector.
    ///
    /// # Arguments
    /// * `connector` - Called to establish a new connection when no idle
    ///   client is available
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Box<dyn RemoteClient>, RemoteError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                connector: Box::new(connector),
                idle: Mutex::new(Vec::new()),
                created: AtomicU64::new(0),
                outstanding: AtomicU64::new(0),
            }),
        }
    }

    /// Lease a client, reusing an idle connection or creating a new one.
    ///
    /// The lease returns the client to the pool when dropped. Connector
    /// failures propagate without changing the outstanding count.
    pub fn acquire(&self) -> Result<ClientLease, RemoteError> {
        let reused: Option<Box<dyn RemoteClient>> = self.inner.idle.lock().pop();
        let client: Box<dyn RemoteClient> = match reused {
            Some(client) => client,
            None => {
                let client: Box<dyn RemoteClient> = (self.inner.connector)()?;
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("created new remote client connection");
                client
            }
        };
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);
        Ok(ClientLease {
            client: Some(client),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of idle clients currently in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Total connections created over the pool's lifetime.
    pub fn created_count(&self) -> u64 {
        self.inner.created.load(Ordering::Relaxed)
    }

    /// Leases currently outstanding (acquired and not yet returned).
    pub fn outstanding_count(&self) -> u64 {
        self.inner.outstanding.load(Ordering::Relaxed)
    }
}

/// RAII lease of one pooled client.
///
/// Derefs to the client; the connection goes back to the idle set exactly
/// once, when the lease is dropped.
pub struct ClientLease {
    /// Present from acquire until drop.
    client: Option<Box<dyn RemoteClient>>,
    pool: Arc<PoolInner>,
}

impl Deref for ClientLease {
    type Target = dyn RemoteClient;

    fn deref(&self) -> &Self::Target {
        self.client
            .as_deref()
            .expect("leased client present until drop")
    }
}

impl DerefMut for ClientLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
            .as_deref_mut()
            .expect("leased client present until drop")
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.idle.lock().push(client);
            self.pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
