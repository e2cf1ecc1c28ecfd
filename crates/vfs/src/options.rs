//! Configuration options for the remote VFS.

/// Default capacity of the node identity cache.
pub const DEFAULT_NODE_CACHE_CAPACITY: usize = 1024;

/// Configuration for a [`RemoteFileSystem`](crate::RemoteFileSystem).
#[derive(Debug, Clone)]
pub struct RemoteVfsOptions {
    /// Remote path the virtual root is mounted on.
    pub root_path: String,
    /// Capacity of the node identity cache; least-recently used nodes are
    /// detached and dropped beyond this.
    pub node_cache_capacity: usize,
}

impl Default for RemoteVfsOptions {
    fn default() -> Self {
        Self {
            root_path: "/".to_string(),
            node_cache_capacity: DEFAULT_NODE_CACHE_CAPACITY,
        }
    }
}

impl RemoteVfsOptions {
    /// Set the remote path the virtual root is mounted on.
    ///
    /// # Arguments
    /// * `root_path` - Absolute path on the remote host
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Set the node identity cache capacity.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of cached nodes
    pub fn with_node_cache_capacity(mut self, capacity: usize) -> Self {
        self.node_cache_capacity = capacity;
        self
    }
}
