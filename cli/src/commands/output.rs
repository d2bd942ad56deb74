//! Where command output goes: a file, or stdout for `-`/no path.

use crate::common::archive::stream::archive_error;
use crate::common::archive::ArchiveStream;
use crate::core::error::Result;
use anyhow::Context;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Output destination of an archive-producing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Stdout,
    File(&'a Path),
}

impl<'a> Target<'a> {
    /// `None` and `-` mean stdout.
    pub fn from_arg(output: Option<&'a Path>) -> Self {
        match output {
            Some(path) if path != Path::new("-") => Target::File(path),
            _ => Target::Stdout,
        }
    }
}

/// Drains `stream` into `target` and returns the number of bytes written.
///
/// A partially written output file is removed when the archive fails.
pub async fn write_archive(stream: ArchiveStream, target: Target<'_>) -> Result<u64> {
    match target {
        Target::Stdout => drain(stream, tokio::io::stdout()).await,
        Target::File(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let result = drain(stream, file).await;
            if result.is_err() {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!("Failed to remove partial output {}: {}", path.display(), e);
                }
            }
            result
        }
    }
}

/// Writes raw bytes to `target`.
pub async fn write_bytes(bytes: &[u8], target: Target<'_>) -> Result<()> {
    match target {
        Target::Stdout => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
        }
        Target::File(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
    }
    Ok(())
}

async fn drain<W: AsyncWrite + Unpin>(mut stream: ArchiveStream, mut writer: W) -> Result<u64> {
    let copied = tokio::io::copy(&mut stream, &mut writer).await;
    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            // Read errors carry the producer's aggregated errors; write errors
            // leave them in the worker, so collect those too.
            let read_side = e
                .get_ref()
                .is_some_and(|inner| inner.is::<crate::core::error::PodctxError>());
            if read_side {
                return Err(archive_error(e));
            }
            if let Err(worker) = stream.close().await {
                warn!("Archive worker also failed: {:#}", worker);
            }
            return Err(anyhow::Error::new(e).context("Failed to write archive"));
        }
    };
    writer.flush().await.context("Failed to flush archive output")?;
    stream.close().await?;
    debug!("Wrote {} archive bytes", written);
    Ok(written)
}
