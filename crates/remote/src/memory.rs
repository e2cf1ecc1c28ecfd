//! In-memory remote backend for tests and examples.
//!
//! `MemoryBackend` holds a folder tree behind a mutex and counts every
//! client call per operation, so cache behavior (hits, misses, leaks) is
//! observable from tests. `MemoryRemoteClient` is a cheap handle sharing one
//! backend; the pool connector clones the backend `Arc` per connection.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::client::RemoteClient;
use crate::error::RemoteError;
use crate::metadata::RemoteMetadata;

/// A stored file: content plus server-side modification time.
#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Absolute folder paths; `/` is always present.
    folders: BTreeSet<String>,
    /// Absolute file path to stored record.
    files: BTreeMap<String, MemoryFile>,
    /// Extra listing entries injected verbatim per folder path
    /// (placeholders, `.`/`..` pseudo-entries).
    raw_entries: BTreeMap<String, Vec<RemoteMetadata>>,
}

/// Shared in-memory content host.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    list_calls: AtomicU64,
    retrieve_calls: AtomicU64,
    store_calls: AtomicU64,
    delete_calls: AtomicU64,
    remove_dir_calls: AtomicU64,
    make_dir_calls: AtomicU64,
    rename_calls: AtomicU64,
    /// When set, mutation calls are counted but answer `false`.
    fail_mutations: AtomicBool,
    /// When set, listing calls are counted but fail with a protocol error.
    fail_listings: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend containing only the root folder.
    pub fn new() -> Self {
        let backend: MemoryBackend = Self::default();
        backend.state.lock().folders.insert("/".to_string());
        backend
    }

    /// Create a folder (and its ancestors).
    ///
    /// # Arguments
    /// * `path` - Absolute folder path, e.g. `/docs/reports`
    pub fn add_folder(&self, path: &str) {
        let mut state = self.state.lock();
        Self::insert_folder_chain(&mut state, path);
    }

    /// Store a file (creating parent folders), stamped with the current time.
    ///
    /// # Arguments
    /// * `path` - Absolute file path
    /// * `data` - File content
    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock();
        Self::insert_folder_chain(&mut state, parent_path(path));
        state.files.insert(
            path.to_string(),
            MemoryFile {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
    }

    /// Inject a raw listing entry for a folder, returned verbatim by
    /// `list_files` in addition to the real children.
    ///
    /// # Arguments
    /// * `folder` - Absolute folder path the entry appears under
    /// * `entry` - The record to inject (placeholder, `.`/`..`, ...)
    pub fn inject_entry(&self, folder: &str, entry: RemoteMetadata) {
        self.state
            .lock()
            .raw_entries
            .entry(folder.to_string())
            .or_default()
            .push(entry);
    }

    /// Make every mutation call answer `false` (host refusal).
    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::Relaxed);
    }

    /// Make every listing call fail with a protocol error.
    pub fn set_fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::Relaxed);
    }

    /// Current content of a stored file.
    pub fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).map(|f| f.data.clone())
    }

    /// Whether a folder exists.
    pub fn is_folder(&self, path: &str) -> bool {
        self.state.lock().folders.contains(path)
    }

    /// Number of `list_files` calls made against this backend.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `retrieve_file_stream` calls.
    pub fn retrieve_calls(&self) -> u64 {
        self.retrieve_calls.load(Ordering::Relaxed)
    }

    /// Number of `store_file_stream` calls.
    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::Relaxed)
    }

    /// Number of `delete_file` calls.
    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::Relaxed)
    }

    /// Number of `remove_directory` calls.
    pub fn remove_dir_calls(&self) -> u64 {
        self.remove_dir_calls.load(Ordering::Relaxed)
    }

    /// Number of `make_directory` calls.
    pub fn make_dir_calls(&self) -> u64 {
        self.make_dir_calls.load(Ordering::Relaxed)
    }

    /// Number of `rename` calls.
    pub fn rename_calls(&self) -> u64 {
        self.rename_calls.load(Ordering::Relaxed)
    }

    /// Calls made across all operations.
    pub fn total_calls(&self) -> u64 {
        self.list_calls()
            + self.retrieve_calls()
            + self.store_calls()
            + self.delete_calls()
            + self.remove_dir_calls()
            + self.make_dir_calls()
            + self.rename_calls()
    }

    fn insert_folder_chain(state: &mut MemoryState, path: &str) {
        let mut current = String::new();
        state.folders.insert("/".to_string());
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            state.folders.insert(current.clone());
        }
    }

    fn list(&self, path: &str) -> Result<Vec<RemoteMetadata>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_listings.load(Ordering::Relaxed) {
            return Err(RemoteError::Protocol {
                path: path.to_string(),
                message: "listing failed".to_string(),
            });
        }

        let state = self.state.lock();
        let mut entries: Vec<RemoteMetadata> = Vec::new();
        for folder in &state.folders {
            if folder != path && parent_path(folder) == path {
                entries.push(RemoteMetadata::folder(base_name(folder), folder.clone()));
            }
        }
        for (file, record) in &state.files {
            if parent_path(file) == path {
                entries.push(RemoteMetadata::file(
                    base_name(file),
                    file.clone(),
                    record.data.len() as u64,
                    record.modified,
                ));
            }
        }
        if let Some(raw) = state.raw_entries.get(path) {
            entries.extend(raw.iter().cloned());
        }
        Ok(entries)
    }

    fn retrieve(&self, path: &str) -> Option<Vec<u8>> {
        self.retrieve_calls.fetch_add(1, Ordering::Relaxed);
        self.state.lock().files.get(path).map(|f| f.data.clone())
    }

    /// Commit an upload: store the content and stamp the current time.
    fn commit_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock();
        Self::insert_folder_chain(&mut state, parent_path(path));
        state.files.insert(
            path.to_string(),
            MemoryFile {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
    }

    fn refused(&self) -> bool {
        self.fail_mutations.load(Ordering::Relaxed)
    }

    fn delete_file(&self, path: &str) -> bool {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        if self.refused() {
            return false;
        }
        self.state.lock().files.remove(path).is_some()
    }

    fn remove_directory(&self, path: &str) -> bool {
        self.remove_dir_calls.fetch_add(1, Ordering::Relaxed);
        if self.refused() {
            return false;
        }
        let mut state = self.state.lock();
        if !state.folders.contains(path) || path == "/" {
            return false;
        }
        let prefix: String = format!("{}/", path);
        state.folders.remove(path);
        state.folders.retain(|f| !f.starts_with(&prefix));
        state.files.retain(|f, _| !f.starts_with(&prefix));
        true
    }

    fn make_directory(&self, path: &str) -> bool {
        self.make_dir_calls.fetch_add(1, Ordering::Relaxed);
        if self.refused() {
            return false;
        }
        let mut state = self.state.lock();
        if state.folders.contains(path) || state.files.contains_key(path) {
            return false;
        }
        Self::insert_folder_chain(&mut state, path);
        true
    }

    fn rename(&self, old_path: &str, new_path: &str) -> bool {
        self.rename_calls.fetch_add(1, Ordering::Relaxed);
        if self.refused() {
            return false;
        }
        let mut state = self.state.lock();
        if let Some(record) = state.files.remove(old_path) {
            Self::insert_folder_chain(&mut state, parent_path(new_path));
            state.files.insert(new_path.to_string(), record);
            return true;
        }
        if state.folders.contains(old_path) {
            let old_prefix: String = format!("{}/", old_path);
            let moved_folders: Vec<String> = state
                .folders
                .iter()
                .filter(|f| *f == old_path || f.starts_with(&old_prefix))
                .cloned()
                .collect();
            for folder in moved_folders {
                state.folders.remove(&folder);
                state
                    .folders
                    .insert(format!("{}{}", new_path, &folder[old_path.len()..]));
            }
            let moved_files: Vec<String> = state
                .files
                .keys()
                .filter(|f| f.starts_with(&old_prefix))
                .cloned()
                .collect();
            for file in moved_files {
                if let Some(record) = state.files.remove(&file) {
                    state
                        .files
                        .insert(format!("{}{}", new_path, &file[old_path.len()..]), record);
                }
            }
            Self::insert_folder_chain(&mut state, parent_path(new_path));
            return true;
        }
        false
    }
}

/// Parent of an absolute path; `/` for top-level entries.
fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "/",
    }
}

/// Base name of an absolute path.
fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Client handle over a shared [`MemoryBackend`].
pub struct MemoryRemoteClient {
    backend: Arc<MemoryBackend>,
}

impl MemoryRemoteClient {
    /// Create a client over a shared backend.
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

impl RemoteClient for MemoryRemoteClient {
    fn list_files(&mut self, path: &str) -> Result<Vec<RemoteMetadata>, RemoteError> {
        self.backend.list(path)
    }

    fn retrieve_file_stream(
        &mut self,
        path: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, RemoteError> {
        Ok(self
            .backend
            .retrieve(path)
            .map(|data| Box::new(Cursor::new(data)) as Box<dyn Read + Send>))
    }

    fn store_file_stream(&mut self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError> {
        self.backend.store_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryUploadStream {
            backend: Arc::clone(&self.backend),
            path: path.to_string(),
            buf: Vec::new(),
        }))
    }

    fn delete_file(&mut self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.backend.delete_file(path))
    }

    fn remove_directory(&mut self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.backend.remove_directory(path))
    }

    fn make_directory(&mut self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.backend.make_directory(path))
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<bool, RemoteError> {
        Ok(self.backend.rename(old_path, new_path))
    }
}

/// Upload stream buffering into the backend; commits on flush and on drop.
struct MemoryUploadStream {
    backend: Arc<MemoryBackend>,
    path: String,
    buf: Vec<u8>,
}

impl Write for MemoryUploadStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.backend.commit_file(&self.path, &self.buf);
        Ok(())
    }
}

impl Drop for MemoryUploadStream {
    fn drop(&mut self) {
        self.backend.commit_file(&self.path, &self.buf);
    }
}
