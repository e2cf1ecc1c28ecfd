//! Content streams that tie a pooled client's lease to their lifetime.
//!
//! Both wrappers own the [`ClientLease`] that produced the underlying
//! stream. The lease returns the client to the pool exactly once, when the
//! wrapper is dropped; the stream field is declared before the lease so the
//! remote stream shuts down before its connection goes back to the pool.
//! A wrapper kept alive holds the client out of the pool indefinitely -
//! closing (or dropping) streams is the caller's obligation.

use std::io::{Read, Write};

use boxdrive_remote::{ClientLease, RemoteError};

use crate::error::VfsError;

/// Readable content stream for a node.
pub struct NodeReadStream {
    inner: Box<dyn Read + Send>,
    /// Dropped after `inner`, returning the client to the pool.
    lease: ClientLease,
}

impl NodeReadStream {
    pub(crate) fn new(inner: Box<dyn Read + Send>, lease: ClientLease) -> Self {
        Self { inner, lease }
    }

    /// Close the stream, returning the pooled client. Equivalent to `drop`;
    /// reading to end-of-stream does not release the client by itself.
    pub fn close(self) {
        let NodeReadStream { inner, lease } = self;
        drop(inner);
        drop(lease);
    }
}

impl Read for NodeReadStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Writable upload stream for a node.
///
/// The upload completes when the stream closes. [`close`](Self::close)
/// surfaces completion errors; plain `drop` also completes the upload and
/// returns the client, but discards any error.
pub struct NodeWriteStream {
    /// `Some` until `close` takes it; dropping the sink finishes the upload.
    inner: Option<Box<dyn Write + Send>>,
    /// Dropped after `inner`, returning the client to the pool.
    lease: ClientLease,
}

impl NodeWriteStream {
    pub(crate) fn new(inner: Box<dyn Write + Send>, lease: ClientLease) -> Self {
        Self {
            inner: Some(inner),
            lease,
        }
    }

    /// Finish the upload and return the pooled client.
    pub fn close(self) -> Result<(), VfsError> {
        let NodeWriteStream { inner, lease } = self;
        if let Some(mut sink) = inner {
            sink.flush().map_err(RemoteError::from)?;
        }
        drop(lease);
        Ok(())
    }
}

impl Write for NodeWriteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.as_mut() {
            Some(sink) => sink.write(buf),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write stream already closed",
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}
