//! Filesystem component owning node identity and shared resources.
//!
//! `RemoteFileSystem` is the single owner of node identity: every virtual
//! path resolves to at most one live [`RemoteNode`], held in an LRU cache.
//! Nodes evicted from the cache are detached so a later resolution of the
//! same path starts from unresolved state. The filesystem also owns the
//! client pool and the mount-root prefix, and fans out change notifications
//! to parent nodes after structural mutations.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use boxdrive_remote::{ClientLease, ClientPool};

use crate::error::VfsError;
use crate::kind::NodeKind;
use crate::node::RemoteNode;
use crate::options::RemoteVfsOptions;

/// Virtual filesystem over a remote content host.
pub struct RemoteFileSystem {
    inner: Arc<FsInner>,
}

pub(crate) struct FsInner {
    options: RemoteVfsOptions,
    pool: ClientPool,
    /// Identity cache: relative path to live node.
    nodes: Mutex<LruCache<String, Arc<RemoteNode>>>,
}

impl RemoteFileSystem {
    /// Create a filesystem over a client pool.
    ///
    /// # Arguments
    /// * `pool` - Pool of connections to the remote host
    /// * `options` - Mount-root path and cache sizing
    pub fn new(pool: ClientPool, options: RemoteVfsOptions) -> Self {
        let capacity: NonZeroUsize = NonZeroUsize::new(options.node_cache_capacity)
            .unwrap_or_else(|| NonZeroUsize::new(1).expect("1 is non-zero"));
        Self {
            inner: Arc::new(FsInner {
                options,
                pool,
                nodes: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Resolve a decoded virtual path to its node, creating it if needed.
    ///
    /// # Arguments
    /// * `path` - Absolute virtual path, e.g. `/docs/a.txt`
    pub fn resolve(&self, path: &str) -> Arc<RemoteNode> {
        self.inner.node(normalize_rel(path))
    }

    /// The mount root node. Always exists and is always a folder.
    pub fn root(&self) -> Arc<RemoteNode> {
        self.inner.node(String::new())
    }

    /// The configured options.
    pub fn options(&self) -> &RemoteVfsOptions {
        &self.inner.options
    }

    /// The client pool backing this filesystem.
    pub fn pool(&self) -> &ClientPool {
        &self.inner.pool
    }
}

impl FsInner {
    /// Identity-cached node lookup; creates and caches missing nodes and
    /// detaches whatever the insertion evicts.
    pub(crate) fn node(self: &Arc<Self>, rel_path: String) -> Arc<RemoteNode> {
        let mut evicted: Option<(String, Arc<RemoteNode>)> = None;
        let node: Arc<RemoteNode> = {
            let mut nodes = self.nodes.lock();
            match nodes.get(&rel_path) {
                Some(node) => Arc::clone(node),
                None => {
                    let node: Arc<RemoteNode> =
                        Arc::new(RemoteNode::new(Arc::downgrade(self), rel_path.clone()));
                    evicted = nodes.push(rel_path, Arc::clone(&node));
                    node
                }
            }
        };
        if let Some((path, old)) = evicted {
            tracing::trace!(path = %path, "evicting node from identity cache");
            old.detach();
        }
        node
    }

    /// Resolve the parent handle of a relative path; `None` for the root.
    pub(crate) fn parent_of(self: &Arc<Self>, rel_path: &str) -> Option<Arc<RemoteNode>> {
        parent_rel(rel_path).map(|parent| self.node(parent.to_string()))
    }

    /// Lease a client from the pool.
    pub(crate) fn acquire_client(&self) -> Result<ClientLease, VfsError> {
        Ok(self.pool.acquire()?)
    }

    /// Absolute remote path for a relative virtual path.
    pub(crate) fn abs_path(&self, rel_path: &str) -> String {
        let root: &str = self.options.root_path.trim_end_matches('/');
        if rel_path.is_empty() {
            if root.is_empty() {
                "/".to_string()
            } else {
                root.to_string()
            }
        } else {
            format!("{}/{}", root, rel_path)
        }
    }

    /// Relative virtual path for a server-reported display path.
    pub(crate) fn rel_from_display(&self, display_path: &str) -> String {
        let root: &str = self.options.root_path.trim_end_matches('/');
        // Strip the mount prefix only on a component boundary.
        let remainder: &str = match display_path.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => display_path,
        };
        normalize_rel(remainder)
    }

    /// Detach every cached node strictly below `rel_path`, so the next
    /// access re-resolves against the host.
    pub(crate) fn refresh_subtree(&self, rel_path: &str) {
        let prefix: String = if rel_path.is_empty() {
            String::new()
        } else {
            format!("{}/", rel_path)
        };
        let descendants: Vec<Arc<RemoteNode>> = {
            let nodes = self.nodes.lock();
            nodes
                .iter()
                .filter(|(path, _)| {
                    if rel_path.is_empty() {
                        !path.is_empty()
                    } else {
                        path.starts_with(&prefix)
                    }
                })
                .map(|(_, node)| Arc::clone(node))
                .collect()
        };
        for node in descendants {
            node.detach();
        }
    }

    /// Tell the parent of `rel_path` that the entry vanished.
    pub(crate) fn notify_child_removed(self: &Arc<Self>, rel_path: &str) {
        if let Some(parent) = self.parent_of(rel_path) {
            parent.on_children_changed(base_name(rel_path), NodeKind::Imaginary);
        }
    }

    /// Tell the parent of `rel_path` that an entry appeared or changed type.
    pub(crate) fn notify_child_changed(self: &Arc<Self>, rel_path: &str, kind: NodeKind) {
        if let Some(parent) = self.parent_of(rel_path) {
            parent.on_children_changed(base_name(rel_path), kind);
        }
    }
}

/// Normalize an absolute or relative virtual path to the internal relative
/// form: no leading/trailing slashes, no empty or `.` components.
fn normalize_rel(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<&str>>()
        .join("/")
}

/// Parent of a relative path; `None` for the root, `""` for top-level nodes.
pub(crate) fn parent_rel(rel_path: &str) -> Option<&str> {
    if rel_path.is_empty() {
        return None;
    }
    Some(match rel_path.rfind('/') {
        Some(pos) => &rel_path[..pos],
        None => "",
    })
}

/// Decoded base name of a relative path; `""` for the root.
pub(crate) fn base_name(rel_path: &str) -> &str {
    match rel_path.rfind('/') {
        Some(pos) => &rel_path[pos + 1..],
        None => rel_path,
    }
}
