//! Example: walk a memory-backed remote tree through the VFS adapter.
//!
//! Usage:
//!   cargo run -p boxdrive-vfs --example tree_walk
//!
//! Seeds an in-memory content host, walks the tree printing each node's
//! kind and size, then exercises a write, a mkdir + refresh, and a delete.

use std::io::{Read, Write};
use std::sync::Arc;

use boxdrive_remote::{ClientPool, MemoryBackend, MemoryRemoteClient, RemoteClient};
use boxdrive_vfs::{NodeKind, RemoteFileSystem, RemoteNode, RemoteVfsOptions, VfsError};

fn main() -> Result<(), VfsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let backend: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
    backend.add_file("/docs/report.txt", b"quarterly numbers");
    backend.add_file("/docs/archive/old.txt", b"stale");
    backend.add_file("/readme.md", b"# boxdrive demo");

    let for_pool: Arc<MemoryBackend> = Arc::clone(&backend);
    let pool: ClientPool = ClientPool::new(move || {
        Ok(Box::new(MemoryRemoteClient::new(Arc::clone(&for_pool))) as Box<dyn RemoteClient>)
    });
    let fs: RemoteFileSystem = RemoteFileSystem::new(pool, RemoteVfsOptions::default());

    println!("initial tree:");
    walk(&fs.root(), 0)?;

    // Read a file through the adapter.
    let report: Arc<RemoteNode> = fs.resolve("/docs/report.txt");
    let mut content: String = String::new();
    report.open_read()?.read_to_string(&mut content)?;
    println!("\n/docs/report.txt -> {:?}", content);

    // Write a new file; the upload completes on close.
    let notes: Arc<RemoteNode> = fs.resolve("/docs/notes.txt");
    let mut upload = notes.open_write(false)?;
    upload.write_all(b"remember the demo")?;
    upload.close()?;

    // Create a folder, then refresh the parent so it shows up.
    fs.resolve("/docs/drafts").create_folder()?;
    let docs: Arc<RemoteNode> = fs.resolve("/docs");
    docs.refresh();

    // Delete the archive; resolving first lets delete() pick the folder
    // primitive from the cached metadata.
    let old: Arc<RemoteNode> = fs.resolve("/docs/archive/old.txt");
    old.kind()?;
    old.delete()?;
    let archive: Arc<RemoteNode> = fs.resolve("/docs/archive");
    archive.kind()?;
    archive.delete()?;

    println!("\nafter changes:");
    walk(&fs.root(), 0)?;

    println!(
        "\nremote calls made: {} (listings: {})",
        backend.total_calls(),
        backend.list_calls()
    );
    Ok(())
}

fn walk(node: &Arc<RemoteNode>, depth: usize) -> Result<(), VfsError> {
    let kind: NodeKind = node.kind()?;
    let name: &str = if node.name().is_empty() {
        "/"
    } else {
        node.name()
    };
    match node.content_size() {
        Some(size) => println!("{}{} ({}, {} bytes)", "  ".repeat(depth), name, kind, size),
        None => println!("{}{} ({})", "  ".repeat(depth), name, kind),
    }
    if kind == NodeKind::Folder {
        for child in node.child_nodes()? {
            walk(&child, depth + 1)?;
        }
    }
    Ok(())
}
