//! Metadata records reported by the remote content host.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Metadata for a regular file on the remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Decoded base name of the file.
    pub name: String,
    /// Server-reported display path (absolute on the remote host).
    pub display_path: String,
    /// Content size in bytes.
    pub size: u64,
    /// Server-reported modification time.
    pub modified: SystemTime,
}

/// Metadata for a folder on the remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderMetadata {
    /// Decoded base name of the folder.
    pub name: String,
    /// Server-reported display path (absolute on the remote host).
    pub display_path: String,
}

/// Remote-reported descriptor of a path: a file or a folder.
///
/// The host's listing API returns one record per directory entry. Some
/// backends emit placeholder records (empty name) or `.`/`..` pseudo-entries;
/// callers that build directory views are expected to drop those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteMetadata {
    /// A regular file with size and modification time.
    File(FileMetadata),
    /// A folder.
    Folder(FolderMetadata),
}

impl RemoteMetadata {
    /// Build a file record.
    ///
    /// # Arguments
    /// * `name` - Decoded base name
    /// * `display_path` - Server-reported display path
    /// * `size` - Content size in bytes
    /// * `modified` - Server-reported modification time
    pub fn file(
        name: impl Into<String>,
        display_path: impl Into<String>,
        size: u64,
        modified: SystemTime,
    ) -> Self {
        Self::File(FileMetadata {
            name: name.into(),
            display_path: display_path.into(),
            size,
            modified,
        })
    }

    /// Build a folder record.
    ///
    /// # Arguments
    /// * `name` - Decoded base name
    /// * `display_path` - Server-reported display path
    pub fn folder(name: impl Into<String>, display_path: impl Into<String>) -> Self {
        Self::Folder(FolderMetadata {
            name: name.into(),
            display_path: display_path.into(),
        })
    }

    /// Decoded base name of the entry.
    pub fn name(&self) -> &str {
        match self {
            Self::File(f) => &f.name,
            Self::Folder(f) => &f.name,
        }
    }

    /// Server-reported display path of the entry.
    pub fn display_path(&self) -> &str {
        match self {
            Self::File(f) => &f.display_path,
            Self::Folder(f) => &f.display_path,
        }
    }

    /// Whether this record describes a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Whether this record describes a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}
