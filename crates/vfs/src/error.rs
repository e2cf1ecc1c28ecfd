//! Error types for the VFS adapter.

use boxdrive_remote::RemoteError;
use thiserror::Error;

/// Errors that can occur during node operations.
///
/// Remote transport errors propagate unchanged (after the pooled client has
/// been returned); the variants here carry enough path context for a caller
/// to translate them into its own surface.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No content or metadata exists for the requested path.
    #[error("no such file: {path}")]
    NotFound {
        /// The path that was requested.
        path: String,
    },

    /// A children operation was invoked on a non-folder node.
    #[error("not a folder: {path}")]
    NotAFolder {
        /// The path of the non-folder node.
        path: String,
    },

    /// The operation is not supported by the remote backend.
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Description of the unsupported operation.
        operation: &'static str,
    },

    /// The remote host refused to delete the entry.
    #[error("could not delete: {path}")]
    DeleteFailed {
        /// The path that was to be deleted.
        path: String,
    },

    /// The remote host refused to rename the entry.
    #[error("could not rename {from} to {to}")]
    RenameFailed {
        /// The source path.
        from: String,
        /// The target path.
        to: String,
    },

    /// The remote host refused to create the folder.
    #[error("could not create folder: {path}")]
    CreateFolderFailed {
        /// The path of the folder to create.
        path: String,
    },

    /// Node type could not be determined after metadata resolution.
    ///
    /// A confirmed-missing path is reported as `NodeKind::Imaginary`, never
    /// through this variant; seeing it indicates a defect in the adapter or
    /// the backend.
    #[error("could not determine type of {path}")]
    TypeResolution {
        /// The path whose type stayed unresolved.
        path: String,
    },

    /// The owning filesystem was dropped while the node was still in use.
    #[error("filesystem closed while accessing {path}")]
    FilesystemClosed {
        /// The path of the orphaned node.
        path: String,
    },

    /// Transport or protocol error from the remote client.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<std::io::Error> for VfsError {
    fn from(e: std::io::Error) -> Self {
        VfsError::Remote(RemoteError::from(e))
    }
}
