//! Blocking client interface to the remote content host.

use std::io::{Read, Write};

use crate::error::RemoteError;
use crate::metadata::RemoteMetadata;

/// One connection to the remote content host.
///
/// All calls are blocking; a client is leased to one caller at a time through
/// the [`ClientPool`](crate::ClientPool), so methods take `&mut self`.
///
/// Paths are absolute, decoded paths on the remote host (e.g. `/docs/a.txt`).
///
/// The boolean-returning mutations report refusal by the host as `Ok(false)`
/// and transport failure as `Err`; callers translate `false` into their own
/// operation-failed errors.
pub trait RemoteClient: Send {
    /// List the entries of the directory at `path`.
    ///
    /// The returned records may include placeholder entries (empty name) and
    /// `.`/`..` pseudo-entries, depending on the backend.
    fn list_files(&mut self, path: &str) -> Result<Vec<RemoteMetadata>, RemoteError>;

    /// Open a content stream for reading the file at `path`.
    ///
    /// # Returns
    /// `None` if the host has no content for the path.
    fn retrieve_file_stream(
        &mut self,
        path: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, RemoteError>;

    /// Open an upload stream that stores content at `path`.
    ///
    /// The upload completes when the returned stream is dropped; `flush`
    /// commits the bytes written so far.
    fn store_file_stream(&mut self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError>;

    /// Delete the file at `path`.
    fn delete_file(&mut self, path: &str) -> Result<bool, RemoteError>;

    /// Remove the directory at `path`.
    fn remove_directory(&mut self, path: &str) -> Result<bool, RemoteError>;

    /// Create a directory at `path`.
    fn make_directory(&mut self, path: &str) -> Result<bool, RemoteError>;

    /// Rename `old_path` to `new_path`.
    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<bool, RemoteError>;
}
