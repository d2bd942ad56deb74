//! Reader side of a build-context archive.
//!
//! [`ArchiveStream`] is the read half of the pipe fed by the archive worker.
//! Once the pipe reports end-of-stream, the next poll joins the worker and
//! turns its aggregated errors into one terminal `io::Error` that wraps a
//! [`PodctxError::Traversal`]. A clean archive just ends.

use crate::core::error::{PodctxError, Result, TraversalErrors};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, DuplexStream, ReadBuf};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

/// What the archive worker reports when it exits.
#[derive(Debug, Default)]
pub(crate) struct WorkerOutcome {
    pub(crate) errors: TraversalErrors,
    /// The reader hung up before the archive was complete.
    pub(crate) cancelled: bool,
}

/// Streaming gzipped tar archive.
///
/// Dropping the stream without reading it to the end is safe: the worker
/// notices the closed pipe on its next write and exits. Use [`close`] to wait
/// for that and to collect errors gathered so far.
///
/// [`close`]: ArchiveStream::close
#[derive(Debug)]
pub struct ArchiveStream {
    reader: Option<DuplexStream>,
    worker: Option<JoinHandle<WorkerOutcome>>,
}

impl ArchiveStream {
    pub(crate) fn new(reader: DuplexStream, worker: JoinHandle<WorkerOutcome>) -> Self {
        Self {
            reader: Some(reader),
            worker: Some(worker),
        }
    }

    /// Releases the pipe, waits for the worker and returns any errors it
    /// collected that were not already reported by a read.
    pub async fn close(mut self) -> Result<()> {
        self.reader.take();
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        settle(worker.await)?;
        Ok(())
    }
}

/// Recovers the domain error from an `io::Error` returned by a read on an
/// [`ArchiveStream`], so callers see the aggregated traversal errors instead
/// of a generic I/O failure.
pub fn archive_error(err: io::Error) -> anyhow::Error {
    let is_domain = err
        .get_ref()
        .is_some_and(|inner| inner.is::<PodctxError>());
    if !is_domain {
        return err.into();
    }
    match err.into_inner().map(|inner| inner.downcast::<PodctxError>()) {
        Some(Ok(domain)) => anyhow::Error::new(*domain),
        Some(Err(other)) => anyhow::anyhow!(other),
        None => anyhow::anyhow!("archive stream failed"),
    }
}

fn settle(joined: std::result::Result<WorkerOutcome, JoinError>) -> std::result::Result<(), PodctxError> {
    let outcome = joined.map_err(|e| PodctxError::Worker(e.to_string()))?;
    if outcome.cancelled {
        debug!("Archive stream closed before completion");
    }
    outcome.errors.into_result().map_err(PodctxError::Traversal)
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(reader) = this.reader.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let filled = buf.filled().len();
        ready!(Pin::new(reader).poll_read(cx, buf))?;
        if buf.filled().len() > filled || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        // End of the pipe: the worker is done or about to be.
        let Some(worker) = this.worker.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let joined = ready!(Pin::new(worker).poll(cx));
        this.worker = None;
        this.reader = None;
        Poll::Ready(settle(joined).map_err(io::Error::other))
    }
}
