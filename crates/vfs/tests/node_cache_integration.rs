//! Integration tests for node metadata/children caching.
//!
//! Tests drive the full adapter against the counting in-memory backend,
//! covering cache hits, invalidation on mutation, refresh fan-out, change
//! notifications, and pooled-client lease lifetimes.

use std::collections::BTreeMap;
use std::sync::Arc;

use boxdrive_remote::{
    ClientPool, MemoryBackend, MemoryRemoteClient, RemoteClient, RemoteMetadata,
};
use boxdrive_vfs::{NodeKind, RemoteFileSystem, RemoteNode, RemoteVfsOptions, VfsError};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Create a filesystem over a fresh counting backend.
fn memory_fs() -> (Arc<MemoryBackend>, RemoteFileSystem) {
    let backend: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
    let for_pool: Arc<MemoryBackend> = Arc::clone(&backend);
    let pool: ClientPool = ClientPool::new(move || {
        Ok(Box::new(MemoryRemoteClient::new(Arc::clone(&for_pool))) as Box<dyn RemoteClient>)
    });
    (
        backend,
        RemoteFileSystem::new(pool, RemoteVfsOptions::default()),
    )
}

/// Resolve every node in the subtree, returning the number of nodes seen.
fn walk(node: &Arc<RemoteNode>) -> Result<usize, VfsError> {
    let mut count: usize = 1;
    if node.kind()? == NodeKind::Folder {
        for child in node.child_nodes()? {
            count += walk(&child)?;
        }
    }
    Ok(count)
}

// ============================================================================
// Cache hits
// ============================================================================

#[test]
fn test_second_listing_is_a_cache_hit() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");
    backend.add_file("/docs/b.txt", b"bb");

    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    let first: BTreeMap<String, RemoteMetadata> = docs.children(false).unwrap();
    let second: BTreeMap<String, RemoteMetadata> = docs.children(false).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(backend.list_calls(), 1);
}

#[test]
fn test_empty_folder_caches_as_explicit_empty() {
    let (backend, fs) = memory_fs();
    backend.add_folder("/empty");

    let empty: Arc<RemoteNode> = fs.resolve("/empty");
    assert!(empty.children(false).unwrap().is_empty());
    assert!(empty.children(false).unwrap().is_empty());
    assert_eq!(backend.list_calls(), 1);
}

#[test]
fn test_root_is_always_a_folder_with_zero_calls() {
    let (backend, fs) = memory_fs();

    assert_eq!(fs.root().kind().unwrap(), NodeKind::Folder);
    assert_eq!(fs.root().kind().unwrap(), NodeKind::Folder);
    assert_eq!(backend.total_calls(), 0);
}

#[test]
fn test_one_listing_serves_all_siblings() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");
    backend.add_file("/docs/b.txt", b"b");
    backend.add_folder("/docs/sub");

    assert_eq!(fs.resolve("/docs/a.txt").kind().unwrap(), NodeKind::File);
    assert_eq!(fs.resolve("/docs/b.txt").kind().unwrap(), NodeKind::File);
    assert_eq!(fs.resolve("/docs/sub").kind().unwrap(), NodeKind::Folder);
    assert_eq!(
        fs.resolve("/docs/ghost").kind().unwrap(),
        NodeKind::Imaginary
    );
    // One listing of /docs resolved all four siblings.
    assert_eq!(backend.list_calls(), 1);
}

#[test]
fn test_listing_drops_pseudo_and_placeholder_entries() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");
    backend.inject_entry("/docs", RemoteMetadata::folder(".", "/docs"));
    backend.inject_entry("/docs", RemoteMetadata::folder("..", "/"));
    backend.inject_entry("/docs", RemoteMetadata::folder("", ""));

    let children: BTreeMap<String, RemoteMetadata> =
        fs.resolve("/docs").children(false).unwrap();
    let names: Vec<&String> = children.keys().collect();
    assert_eq!(names, vec!["a.txt"]);
}

// ============================================================================
// Mutations
// ============================================================================

#[test]
fn test_delete_serves_imaginary_from_cache() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    assert_eq!(file.kind().unwrap(), NodeKind::File);
    file.delete().unwrap();
    assert_eq!(backend.delete_calls(), 1);

    let calls_before: u64 = backend.total_calls();
    assert_eq!(file.kind().unwrap(), NodeKind::Imaginary);
    assert!(file.children(false).unwrap().is_empty());
    assert_eq!(backend.total_calls(), calls_before);
}

#[test]
fn test_delete_removes_entry_from_parent_cache_without_listing() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");
    backend.add_file("/docs/b.txt", b"b");

    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    assert_eq!(docs.children(false).unwrap().len(), 2);

    fs.resolve("/docs/a.txt").delete().unwrap();

    let listings_before: u64 = backend.list_calls();
    let children: BTreeMap<String, RemoteMetadata> = docs.children(false).unwrap();
    assert_eq!(children.len(), 1);
    assert!(children.contains_key("b.txt"));
    assert_eq!(backend.list_calls(), listings_before);
}

#[test]
fn test_delete_picks_directory_primitive_for_folders() {
    let (backend, fs) = memory_fs();
    backend.add_folder("/docs/sub");

    let sub: Arc<RemoteNode> = fs.resolve("/docs/sub");
    assert_eq!(sub.kind().unwrap(), NodeKind::Folder);
    sub.delete().unwrap();

    assert_eq!(backend.remove_dir_calls(), 1);
    assert_eq!(backend.delete_calls(), 0);
    assert!(!backend.is_folder("/docs/sub"));
}

#[test]
fn test_failed_delete_leaves_caches_untouched() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    assert_eq!(file.kind().unwrap(), NodeKind::File);

    backend.set_fail_mutations(true);
    assert!(matches!(file.delete(), Err(VfsError::DeleteFailed { .. })));

    // The caches still represent the pre-attempt truth, with no re-fetch.
    let calls_before: u64 = backend.total_calls();
    assert_eq!(file.kind().unwrap(), NodeKind::File);
    assert_eq!(file.content_size(), Some(1));
    assert_eq!(backend.total_calls(), calls_before);
}

#[test]
fn test_rename_vacates_the_source_node() {
    let (backend, fs) = memory_fs();
    backend.add_file("/x", b"payload");

    let x: Arc<RemoteNode> = fs.resolve("/x");
    assert_eq!(x.kind().unwrap(), NodeKind::File);

    let y: Arc<RemoteNode> = fs.resolve("/y");
    x.rename_to(&y).unwrap();
    assert_eq!(backend.rename_calls(), 1);
    assert_eq!(backend.file_data("/y"), Some(b"payload".to_vec()));
    assert_eq!(backend.file_data("/x"), None);

    // Immediately after the rename the vacated node answers from cache.
    let calls_before: u64 = backend.total_calls();
    assert_eq!(x.kind().unwrap(), NodeKind::Imaginary);
    assert!(x.children(false).unwrap().is_empty());
    assert_eq!(backend.total_calls(), calls_before);

    // The target path is a distinct node that resolves on its own.
    assert_eq!(y.kind().unwrap(), NodeKind::File);
}

#[test]
fn test_rename_does_not_pin_the_source_to_imaginary() {
    let (backend, fs) = memory_fs();
    backend.add_file("/x", b"payload");

    let x: Arc<RemoteNode> = fs.resolve("/x");
    assert_eq!(x.kind().unwrap(), NodeKind::File);
    x.rename_to(&fs.resolve("/y")).unwrap();
    assert_eq!(x.kind().unwrap(), NodeKind::Imaginary);

    // A refresh forces the next kind() through a fresh resolution.
    let listings_before: u64 = backend.list_calls();
    x.refresh();
    assert_eq!(x.kind().unwrap(), NodeKind::Imaginary);
    assert!(backend.list_calls() > listings_before);

    // And once the path exists again, resolution observes it.
    backend.add_file("/x", b"reborn");
    fs.root().refresh();
    assert_eq!(x.kind().unwrap(), NodeKind::File);
}

#[test]
fn test_failed_rename_keeps_the_source_resolved() {
    let (backend, fs) = memory_fs();
    backend.add_file("/x", b"payload");

    let x: Arc<RemoteNode> = fs.resolve("/x");
    assert_eq!(x.kind().unwrap(), NodeKind::File);

    backend.set_fail_mutations(true);
    let result: Result<(), VfsError> = x.rename_to(&fs.resolve("/y"));
    assert!(matches!(result, Err(VfsError::RenameFailed { .. })));

    let calls_before: u64 = backend.total_calls();
    assert_eq!(x.kind().unwrap(), NodeKind::File);
    assert_eq!(backend.total_calls(), calls_before);
}

#[test]
fn test_create_folder_appears_after_refresh() {
    let (backend, fs) = memory_fs();

    let drafts: Arc<RemoteNode> = fs.resolve("/drafts");
    drafts.create_folder().unwrap();
    assert_eq!(backend.make_dir_calls(), 1);
    assert!(backend.is_folder("/drafts"));

    drafts.refresh();
    assert_eq!(drafts.kind().unwrap(), NodeKind::Folder);
}

#[test]
fn test_failed_create_folder_reports_the_path() {
    let (backend, fs) = memory_fs();
    backend.set_fail_mutations(true);

    let result: Result<(), VfsError> = fs.resolve("/drafts").create_folder();
    match result {
        Err(VfsError::CreateFolderFailed { path }) => assert_eq!(path, "/drafts"),
        other => panic!("expected CreateFolderFailed, got {:?}", other),
    }
}

// ============================================================================
// Change notifications
// ============================================================================

#[test]
fn test_child_removal_notification_drops_one_entry() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");
    backend.add_file("/docs/b.txt", b"b");

    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    assert_eq!(docs.children(false).unwrap().len(), 2);

    let listings_before: u64 = backend.list_calls();
    docs.on_children_changed("a.txt", NodeKind::Imaginary);

    let children: BTreeMap<String, RemoteMetadata> = docs.children(false).unwrap();
    assert_eq!(children.len(), 1);
    assert!(children.contains_key("b.txt"));
    assert_eq!(backend.list_calls(), listings_before);
}

#[test]
fn test_child_addition_notification_invalidates_whole_cache() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    assert_eq!(docs.children(false).unwrap().len(), 1);

    backend.add_file("/docs/new.txt", b"n");
    docs.on_children_changed("new.txt", NodeKind::File);

    // The notification carries no metadata record, so the next listing is
    // a full re-list.
    let children: BTreeMap<String, RemoteMetadata> = docs.children(false).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(backend.list_calls(), 2);
}

#[test]
fn test_content_change_notification_on_deleted_node_skips_the_host() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    file.kind().unwrap();
    file.delete().unwrap();

    let calls_before: u64 = backend.total_calls();
    file.on_content_changed().unwrap();
    assert_eq!(backend.total_calls(), calls_before);
}

#[test]
fn test_content_change_notification_re_resolves_live_nodes() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    assert_eq!(file.content_size(), None);
    file.kind().unwrap();
    assert_eq!(file.content_size(), Some(1));

    // Content grew remotely; the notification forces a re-list.
    backend.add_file("/docs/a.txt", b"abc");
    file.on_content_changed().unwrap();
    assert_eq!(file.content_size(), Some(3));
}

// ============================================================================
// Refresh fan-out
// ============================================================================

#[test]
fn test_refresh_costs_one_listing_per_folder_level() {
    let (backend, fs) = memory_fs();
    backend.add_file("/a/b/f1", b"1");
    backend.add_file("/a/b/f2", b"2");
    backend.add_file("/a/b/f3", b"3");

    // First full walk: one listing for each of /, /a, /a/b.
    assert_eq!(walk(&fs.root()).unwrap(), 6);
    assert_eq!(backend.list_calls(), 3);

    // After a top-level refresh the re-walk costs the same three listings,
    // not one per child per ancestor level.
    fs.root().refresh();
    assert_eq!(walk(&fs.root()).unwrap(), 6);
    assert_eq!(backend.list_calls(), 6);
}

#[test]
fn test_refresh_detaches_cached_descendants() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    assert_eq!(file.kind().unwrap(), NodeKind::File);

    backend.add_file("/docs/a.txt", b"abcde");
    fs.root().refresh();

    // Size is a cached-metadata read; the refresh dropped the stale record.
    assert_eq!(file.content_size(), None);
    assert_eq!(file.kind().unwrap(), NodeKind::File);
    assert_eq!(file.content_size(), Some(5));
}

// ============================================================================
// Listing failures
// ============================================================================

#[test]
fn test_failed_listing_is_retried_on_next_access() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"a");

    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    backend.set_fail_listings(true);
    assert!(docs.children(false).is_err());

    // The failure was not cached; the next access retries and succeeds.
    backend.set_fail_listings(false);
    assert_eq!(docs.children(false).unwrap().len(), 1);
    assert_eq!(backend.list_calls(), 2);
}

// ============================================================================
// Streams and client leases
// ============================================================================

#[test]
fn test_read_stream_holds_the_lease_until_dropped() {
    let (backend, fs) = memory_fs();
    backend.add_file("/docs/a.txt", b"payload");

    let file: Arc<RemoteNode> = fs.resolve("/docs/a.txt");
    let mut stream = file.open_read().unwrap();
    assert_eq!(fs.pool().outstanding_count(), 1);

    let mut content: Vec<u8> = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut content).unwrap();
    assert_eq!(content, b"payload");
    // Consumed to end-of-stream but not closed: still leased.
    assert_eq!(fs.pool().outstanding_count(), 1);

    stream.close();
    assert_eq!(fs.pool().outstanding_count(), 0);
    assert_eq!(fs.pool().idle_count(), 1);
}

#[test]
fn test_read_stream_for_missing_path_releases_the_client() {
    let (_backend, fs) = memory_fs();

    let ghost: Arc<RemoteNode> = fs.resolve("/ghost");
    assert!(matches!(
        ghost.open_read(),
        Err(VfsError::NotFound { .. })
    ));
    assert_eq!(fs.pool().outstanding_count(), 0);
    assert_eq!(fs.pool().idle_count(), 1);
}

#[test]
fn test_write_stream_uploads_on_close() {
    let (backend, fs) = memory_fs();

    let file: Arc<RemoteNode> = fs.resolve("/out.txt");
    let mut stream = file.open_write(false).unwrap();
    std::io::Write::write_all(&mut stream, b"uploaded").unwrap();
    stream.close().unwrap();

    assert_eq!(backend.file_data("/out.txt"), Some(b"uploaded".to_vec()));
    assert_eq!(fs.pool().outstanding_count(), 0);
}

#[test]
fn test_append_write_is_rejected_before_any_client_is_acquired() {
    let (backend, fs) = memory_fs();

    let file: Arc<RemoteNode> = fs.resolve("/out.txt");
    assert!(matches!(
        file.open_write(true),
        Err(VfsError::Unsupported { .. })
    ));
    assert_eq!(fs.pool().created_count(), 0);
    assert_eq!(backend.store_calls(), 0);
}
