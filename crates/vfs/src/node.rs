//! Remote nodes: one per virtual path, with lazily-populated caches.
//!
//! A node caches three things: its own metadata record, its resolved kind,
//! and the listing of its children. A node never fetches its own metadata
//! directly; it asks its parent's children cache, so one remote listing
//! serves every sibling. Structural mutations (delete, rename, mkdir) clear
//! the affected caches on success only and notify the parent through the
//! owning filesystem.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;

use boxdrive_remote::{ClientLease, RemoteError, RemoteMetadata};

use crate::error::VfsError;
use crate::filesystem::FsInner;
use crate::kind::NodeKind;
use crate::stream::{NodeReadStream, NodeWriteStream};

/// Cached per-node state. Never held locked across a call into another
/// node or into the network client.
#[derive(Default)]
struct NodeState {
    /// Remote metadata record, if resolved and existing.
    metadata: Option<RemoteMetadata>,
    /// Resolved kind; `None` until first resolution.
    kind: Option<NodeKind>,
    /// Children by decoded name; `None` until first listing, `Some` and
    /// empty after listing an empty folder.
    children: Option<BTreeMap<String, RemoteMetadata>>,
    /// Guard against re-entrant refresh fan-out.
    refreshing: bool,
}

/// One path in the virtual tree.
///
/// Nodes are created and owned by the
/// [`RemoteFileSystem`](crate::RemoteFileSystem); parent and child handles
/// are resolved through it rather than stored, so the node graph carries no
/// ownership cycles.
pub struct RemoteNode {
    fs: Weak<FsInner>,
    /// Decoded path relative to the mount root; `""` for the root.
    rel_path: String,
    /// Decoded base name; `""` for the root.
    name: String,
    state: Mutex<NodeState>,
}

impl RemoteNode {
    pub(crate) fn new(fs: Weak<FsInner>, rel_path: String) -> Self {
        let name: String = crate::filesystem::base_name(&rel_path).to_string();
        Self {
            fs,
            rel_path,
            name,
            state: Mutex::new(NodeState::default()),
        }
    }

    /// Decoded path relative to the mount root; `""` for the root.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// Decoded base name; `""` for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of this node, resolving metadata through the parent if it
    /// is not cached yet.
    ///
    /// A missing path is reported as `NodeKind::Imaginary`, not as an error.
    pub fn kind(&self) -> Result<NodeKind, VfsError> {
        if let Some(kind) = self.state.lock().kind {
            return Ok(kind);
        }
        self.resolve_metadata(false)?;
        self.state
            .lock()
            .kind
            .ok_or_else(|| VfsError::TypeResolution {
                path: self.abs_or_rel(),
            })
    }

    /// Content size from the cached metadata; `None` unless the node is a
    /// resolved file. Never touches the network.
    pub fn content_size(&self) -> Option<u64> {
        match &self.state.lock().metadata {
            Some(RemoteMetadata::File(file)) => Some(file.size),
            _ => None,
        }
    }

    /// Modification time from the cached metadata; `None` unless the node
    /// is a resolved file. Never touches the network.
    pub fn modified_time(&self) -> Option<SystemTime> {
        match &self.state.lock().metadata {
            Some(RemoteMetadata::File(file)) => Some(file.modified),
            _ => None,
        }
    }

    /// Resolve this node's metadata record.
    ///
    /// Non-root nodes ask the parent for their entry by base name; the root
    /// synthesizes a folder record without any remote call.
    fn resolve_metadata(&self, force_refresh: bool) -> Result<(), VfsError> {
        let fs: Arc<FsInner> = self.fs()?;
        match fs.parent_of(&self.rel_path) {
            Some(parent) => {
                let entry: Option<RemoteMetadata> = parent.child_entry(&self.name, force_refresh)?;
                let mut state = self.state.lock();
                match entry {
                    Some(metadata) => {
                        state.kind = Some(if metadata.is_folder() {
                            NodeKind::Folder
                        } else {
                            NodeKind::File
                        });
                        state.metadata = Some(metadata);
                    }
                    None => {
                        state.metadata = None;
                        state.kind = Some(NodeKind::Imaginary);
                    }
                }
            }
            None => {
                // The mount root always exists and is always a folder.
                let mut state = self.state.lock();
                state.metadata = Some(RemoteMetadata::folder("/", fs.abs_path("")));
                state.kind = Some(NodeKind::Folder);
            }
        }
        Ok(())
    }

    /// The children of this node, keyed by decoded name.
    ///
    /// Returns the cached mapping when populated and no refresh was
    /// requested; otherwise performs one remote listing. Placeholder
    /// entries and `.`/`..` pseudo-entries are dropped. An empty folder
    /// caches as an explicit empty mapping. A failed listing leaves the
    /// cache absent, so the next access retries.
    ///
    /// # Arguments
    /// * `force_refresh` - Discard the cached mapping and re-list
    pub fn children(
        &self,
        force_refresh: bool,
    ) -> Result<BTreeMap<String, RemoteMetadata>, VfsError> {
        {
            let mut state = self.state.lock();
            if force_refresh {
                state.children = None;
            }
            if let Some(children) = &state.children {
                return Ok(children.clone());
            }
        }

        let fs: Arc<FsInner> = self.fs()?;
        let abs_path: String = fs.abs_path(&self.rel_path);
        let listed: Result<Vec<RemoteMetadata>, RemoteError> = {
            let mut client: ClientLease = fs.acquire_client()?;
            client.list_files(&abs_path)
        };
        // Client released above; only now inspect the result.
        let entries: Vec<RemoteMetadata> = listed?;

        let mut children: BTreeMap<String, RemoteMetadata> = BTreeMap::new();
        for entry in entries {
            let name: &str = entry.name();
            if name.is_empty() {
                tracing::debug!(path = %abs_path, "dropping invalid directory entry");
                continue;
            }
            if name == "." || name == ".." {
                continue;
            }
            children.insert(name.to_string(), entry);
        }
        tracing::debug!(path = %abs_path, count = children.len(), "listed remote directory");

        self.state.lock().children = Some(children.clone());
        Ok(children)
    }

    /// Look up one child's metadata record; used by child nodes to resolve
    /// themselves.
    ///
    /// The refresh flag is honored only while this node is not itself
    /// mid-refresh: the refresh that is already running has just re-listed,
    /// and children resolving themselves during it must not force another
    /// listing each.
    pub(crate) fn child_entry(
        &self,
        name: &str,
        force_refresh: bool,
    ) -> Result<Option<RemoteMetadata>, VfsError> {
        let effective_refresh: bool = force_refresh && !self.state.lock().refreshing;
        let children: BTreeMap<String, RemoteMetadata> = self.children(effective_refresh)?;
        Ok(children.get(name).cloned())
    }

    /// Names of this node's children, listing them first if needed.
    pub fn child_names(&self) -> Result<Vec<String>, VfsError> {
        if self.kind()? != NodeKind::Folder {
            return Err(VfsError::NotAFolder {
                path: self.abs_or_rel(),
            });
        }
        Ok(self.children(false)?.keys().cloned().collect())
    }

    /// Resolve node handles for all children.
    ///
    /// Handles are resolved through the owning filesystem from each child's
    /// server-reported display path, so node identity stays in one place.
    /// The refresh guard is held for the duration: without it, a folder
    /// with C children and P ancestor levels would pay C×P listings while
    /// the children resolve themselves, instead of one per level.
    pub fn child_nodes(&self) -> Result<Vec<Arc<RemoteNode>>, VfsError> {
        if self.kind()? != NodeKind::Folder {
            return Err(VfsError::NotAFolder {
                path: self.abs_or_rel(),
            });
        }
        let _scope: RefreshScope<'_> = self.begin_refresh_scope();
        let children: BTreeMap<String, RemoteMetadata> = self.children(false)?;
        let fs: Arc<FsInner> = self.fs()?;
        let mut nodes: Vec<Arc<RemoteNode>> = Vec::with_capacity(children.len());
        for metadata in children.values() {
            nodes.push(fs.node(fs.rel_from_display(metadata.display_path())));
        }
        Ok(nodes)
    }

    /// Drop all cached state for this subtree and this node.
    ///
    /// No-op when already mid-refresh, so a child's refresh cannot cascade
    /// back through its ancestors and fan out again.
    pub fn refresh(&self) {
        let _scope: RefreshScope<'_> = match self.try_begin_refresh() {
            Some(scope) => scope,
            None => return,
        };
        if let Some(fs) = self.fs.upgrade() {
            fs.refresh_subtree(&self.rel_path);
        }
        tracing::debug!(path = %self.rel_path, "refreshed node");
        self.detach();
    }

    /// Change notification: a child's existence or type changed.
    ///
    /// A deleted child is dropped from the cached mapping directly; any
    /// other change invalidates the whole mapping, because the notification
    /// carries no metadata record to insert.
    pub fn on_children_changed(&self, child_name: &str, new_kind: NodeKind) {
        let mut state = self.state.lock();
        if new_kind == NodeKind::Imaginary && state.children.is_some() {
            if let Some(children) = state.children.as_mut() {
                children.remove(child_name);
            }
        } else {
            state.children = None;
        }
    }

    /// Change notification: this node's own content or type changed.
    pub fn on_content_changed(&self) -> Result<(), VfsError> {
        self.state.lock().children = None;
        if self.kind()? == NodeKind::Imaginary {
            // Known deleted; no point asking the host.
            self.state.lock().metadata = None;
            return Ok(());
        }
        self.resolve_metadata(true)
    }

    /// Open this node's content for reading.
    ///
    /// The stream holds the pooled client until it is dropped.
    pub fn open_read(&self) -> Result<NodeReadStream, VfsError> {
        let fs: Arc<FsInner> = self.fs()?;
        let abs_path: String = fs.abs_path(&self.rel_path);
        let mut client: ClientLease = fs.acquire_client()?;
        match client.retrieve_file_stream(&abs_path) {
            Ok(Some(stream)) => Ok(NodeReadStream::new(stream, client)),
            // The lease drops right here on both failure paths.
            Ok(None) => Err(VfsError::NotFound { path: abs_path }),
            Err(e) => Err(e.into()),
        }
    }

    /// Open an upload stream replacing this node's content.
    ///
    /// Append mode has no remote primitive and is rejected before any
    /// client is acquired. The stream holds the pooled client until closed
    /// or dropped; call [`NodeWriteStream::close`] to observe upload errors.
    pub fn open_write(&self, append: bool) -> Result<NodeWriteStream, VfsError> {
        if append {
            return Err(VfsError::Unsupported {
                operation: "append-mode write",
            });
        }
        let fs: Arc<FsInner> = self.fs()?;
        let abs_path: String = fs.abs_path(&self.rel_path);
        let mut client: ClientLease = fs.acquire_client()?;
        match client.store_file_stream(&abs_path) {
            Ok(sink) => Ok(NodeWriteStream::new(sink, client)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete this node on the host.
    ///
    /// Caches are updated only when the host confirms the delete; a refusal
    /// or transport error leaves them representing the pre-attempt state.
    pub fn delete(&self) -> Result<(), VfsError> {
        let fs: Arc<FsInner> = self.fs()?;
        let abs_path: String = fs.abs_path(&self.rel_path);
        let is_folder: bool = matches!(
            self.state.lock().metadata,
            Some(RemoteMetadata::Folder(_))
        );
        let removed: Result<bool, RemoteError> = {
            let mut client: ClientLease = fs.acquire_client()?;
            if is_folder {
                client.remove_directory(&abs_path)
            } else {
                client.delete_file(&abs_path)
            }
        };
        if !removed? {
            return Err(VfsError::DeleteFailed { path: abs_path });
        }

        {
            let mut state = self.state.lock();
            state.metadata = None;
            state.kind = Some(NodeKind::Imaginary);
            // A deleted node can have no children.
            state.children = Some(BTreeMap::new());
        }
        fs.notify_child_removed(&self.rel_path);
        tracing::debug!(path = %abs_path, "deleted remote entry");
        Ok(())
    }

    /// Rename this node to the target node's path.
    ///
    /// On success this node represents a vacated path and reports
    /// `Imaginary`; the target path is a distinct node resolved
    /// independently by the filesystem.
    pub fn rename_to(&self, target: &RemoteNode) -> Result<(), VfsError> {
        let fs: Arc<FsInner> = self.fs()?;
        let old_path: String = fs.abs_path(&self.rel_path);
        let new_path: String = fs.abs_path(&target.rel_path);
        let prior_kind: Option<NodeKind> = self.state.lock().kind;
        let renamed: Result<bool, RemoteError> = {
            let mut client: ClientLease = fs.acquire_client()?;
            client.rename(&old_path, &new_path)
        };
        if !renamed? {
            return Err(VfsError::RenameFailed {
                from: old_path,
                to: new_path,
            });
        }

        {
            let mut state = self.state.lock();
            state.metadata = None;
            state.kind = Some(NodeKind::Imaginary);
            state.children = Some(BTreeMap::new());
        }
        fs.notify_child_removed(&self.rel_path);
        fs.notify_child_changed(&target.rel_path, prior_kind.unwrap_or(NodeKind::File));
        tracing::debug!(from = %old_path, to = %new_path, "renamed remote entry");
        Ok(())
    }

    /// Create a folder at this node's path.
    ///
    /// Local caches are left untouched; the next metadata resolution
    /// observes the new folder through a fresh parent listing.
    pub fn create_folder(&self) -> Result<(), VfsError> {
        let fs: Arc<FsInner> = self.fs()?;
        let abs_path: String = fs.abs_path(&self.rel_path);
        let created: Result<bool, RemoteError> = {
            let mut client: ClientLease = fs.acquire_client()?;
            client.make_directory(&abs_path)
        };
        if !created? {
            return Err(VfsError::CreateFolderFailed { path: abs_path });
        }
        fs.notify_child_changed(&self.rel_path, NodeKind::Folder);
        tracing::debug!(path = %abs_path, "created remote folder");
        Ok(())
    }

    /// Drop all cached state; the next access re-resolves from the host.
    ///
    /// Called by the filesystem on identity-cache eviction.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        state.metadata = None;
        state.kind = None;
        state.children = None;
    }

    fn fs(&self) -> Result<Arc<FsInner>, VfsError> {
        self.fs.upgrade().ok_or_else(|| VfsError::FilesystemClosed {
            path: self.rel_path.clone(),
        })
    }

    fn abs_or_rel(&self) -> String {
        match self.fs.upgrade() {
            Some(fs) => fs.abs_path(&self.rel_path),
            None => self.rel_path.clone(),
        }
    }

    /// Set the refresh guard unless it is already held.
    fn try_begin_refresh(&self) -> Option<RefreshScope<'_>> {
        let mut state = self.state.lock();
        if state.refreshing {
            return None;
        }
        state.refreshing = true;
        Some(RefreshScope {
            node: self,
            restore: false,
        })
    }

    /// Set the refresh guard, remembering its previous value.
    fn begin_refresh_scope(&self) -> RefreshScope<'_> {
        let mut state = self.state.lock();
        let restore: bool = state.refreshing;
        state.refreshing = true;
        RefreshScope {
            node: self,
            restore,
        }
    }
}

/// Scope guard restoring the refresh flag on every exit path.
struct RefreshScope<'a> {
    node: &'a RemoteNode,
    restore: bool,
}

impl Drop for RefreshScope<'_> {
    fn drop(&mut self) {
        self.node.state.lock().refreshing = self.restore;
    }
}
