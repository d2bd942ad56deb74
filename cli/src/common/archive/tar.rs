//! # podctx Build-Context Archive Producer (`common::archive::tar`)
//!
//! File: cli/src/common/archive/tar.rs
//!
//! ## Overview
//!
//! This module produces the gzipped tarball that carries a build context to a
//! build service. It does not buffer the archive: a blocking worker walks the
//! source roots and writes tar framing through a gzip encoder into one end of a
//! bounded pipe, while the caller reads the other end as an [`ArchiveStream`].
//!
//! ## Architecture
//!
//! - Root 0 is the primary context. It is walked depth-first in lexical order
//!   (`walkdir`, links not followed) and every descendant is named relative to
//!   it. Ignore patterns are tested per path; excluded directories are still
//!   descended into so an exception rule can re-include a descendant.
//! - Roots 1.. must each be a single regular file (typically a Containerfile or
//!   the rewritten manifest living outside the context). They are archived under
//!   their absolute path, minus the leading `/`, and never tested against the
//!   ignore patterns.
//! - Every entry has uid/gid 0. Symlinks are stored with their raw target.
//!   Regular files sharing a `(device, inode)` identity are written once; later
//!   occurrences become hard-link entries pointing at the first name.
//! - Per-entry failures are collected in a [`TraversalErrors`] accumulator and
//!   traversal continues. They surface when the stream ends or is closed.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::archive::{self, ArchiveOptions};
//! use tokio::io::AsyncReadExt;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let roots = vec![PathBuf::from("./ctx"), PathBuf::from("/abs/Containerfile")];
//! let mut stream = archive::build_archive(&["*.log".to_string()], &roots, &ArchiveOptions::default())?;
//! let mut bytes = Vec::new();
//! stream.read_to_end(&mut bytes).await?; // fails with the aggregated traversal errors, if any
//! # Ok(())
//! # }
//! ```
//!
use crate::common::archive::hardlinks::HardlinkTracker;
use crate::common::archive::patterns::PatternMatcher;
use crate::common::archive::stream::{ArchiveStream, WorkerOutcome};
use crate::common::fs::scratch::ScratchDir;
use crate::core::error::{PodctxError, Result, TraversalErrors};
use anyhow::{anyhow, Context};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{EntryType, Header, HeaderMode};
use tokio::io::DuplexStream;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, error, info, instrument, trace, warn};
use walkdir::WalkDir;

/// Tunables for one archive build.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    /// Gzip compression level.
    pub compression: Compression,
    /// Capacity in bytes of the pipe between the worker and the reader.
    pub pipe_capacity: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression: Compression::new(6),
            pipe_capacity: 64 * 1024,
        }
    }
}

/// # Build Context Archive (`build_archive`)
///
/// Starts streaming a gzipped tar archive of `roots`, skipping root-0 paths
/// matched by `excludes`.
///
/// ## Errors
///
/// Fails before any traversal (and without producing a stream) when:
/// - `excludes` contains an invalid pattern (`PodctxError::InvalidPattern`).
/// - `roots` is empty (`PodctxError::NoSources`).
/// - No Tokio runtime is available to run the worker.
///
/// Everything else (unreadable files, a directory given as a later root, ...)
/// is reported through the returned stream.
pub fn build_archive(
    excludes: &[String],
    roots: &[PathBuf],
    options: &ArchiveOptions,
) -> Result<ArchiveStream> {
    spawn_archive(excludes, roots, options, None)
}

/// Same as [`build_archive`], but hands `scratch` to the worker so the
/// directory outlives the traversal and is removed right after it.
#[instrument(skip_all, fields(roots = roots.len()))]
pub(crate) fn spawn_archive(
    excludes: &[String],
    roots: &[PathBuf],
    options: &ArchiveOptions,
    scratch: Option<ScratchDir>,
) -> Result<ArchiveStream> {
    let matcher = PatternMatcher::new(excludes)?;
    if matcher.is_empty() {
        debug!("No exclusion patterns, archiving the whole context");
    }
    if roots.is_empty() {
        return Err(PodctxError::NoSources.into());
    }
    let handle = Handle::try_current().context("archive production requires a Tokio runtime")?;

    let (reader, writer) = tokio::io::duplex(options.pipe_capacity.max(1));
    let sink = SyncIoBridge::new_with_handle(writer, handle.clone());
    let roots = roots.to_vec();
    let compression = options.compression;

    info!(
        "Archiving {} source root(s) with {} exclude pattern(s)",
        roots.len(),
        excludes.len()
    );
    let worker = handle.spawn_blocking(move || {
        let outcome = write_archive(sink, &matcher, &roots, compression);
        drop(scratch);
        outcome
    });

    Ok(ArchiveStream::new(reader, worker))
}

/// What the worker does after handling one root.
enum Flow {
    Continue,
    /// Fatal error: stop traversing, still finish the archive framing.
    Abort,
    /// The reader went away: stop immediately.
    Cancelled,
}

/// Worker body: writes every root into the pipe and reports what went wrong.
fn write_archive(
    sink: SyncIoBridge<DuplexStream>,
    matcher: &PatternMatcher,
    roots: &[PathBuf],
    compression: Compression,
) -> WorkerOutcome {
    let mut errors = TraversalErrors::new();
    let mut archive = ContextArchive::new(PipeWriter::new(sink), compression);

    let mut cancelled = false;
    for (index, root) in roots.iter().enumerate() {
        let source = match std::path::absolute(root) {
            Ok(source) => source,
            Err(e) => {
                error!("Cannot stat one of source context: {}", e);
                errors.push(anyhow!(e).context(format!("resolving {}", root.display())));
                break;
            }
        };

        let flow = if index == 0 {
            archive.append_context_root(&source, matcher, &mut errors)
        } else {
            archive.append_extra_root(&source, &mut errors)
        };
        match flow {
            Flow::Continue => {}
            Flow::Abort => break,
            Flow::Cancelled => {
                cancelled = true;
                break;
            }
        }
    }

    if !cancelled {
        match archive.finish() {
            Ok(()) => {}
            Err(_) if archive.sink_broken() => cancelled = true,
            Err(e) => errors.push(anyhow!(e).context("finishing archive stream")),
        }
    }
    if cancelled {
        debug!("Archive reader closed early, worker stopped");
    }

    WorkerOutcome { errors, cancelled }
}

/// Tar builder plus the per-build hard-link identity map.
struct ContextArchive {
    builder: Option<tar::Builder<GzEncoder<PipeWriter>>>,
    tracker: HardlinkTracker,
}

impl ContextArchive {
    fn new(sink: PipeWriter, compression: Compression) -> Self {
        let mut builder = tar::Builder::new(GzEncoder::new(sink, compression));
        builder.follow_symlinks(false);
        Self {
            builder: Some(builder),
            tracker: HardlinkTracker::new(),
        }
    }

    fn builder(&mut self) -> io::Result<&mut tar::Builder<GzEncoder<PipeWriter>>> {
        self.builder
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "archive already finished"))
    }

    fn sink_broken(&self) -> bool {
        self.builder
            .as_ref()
            .map_or(true, |builder| builder.get_ref().get_ref().broken)
    }

    /// Walks the primary context root.
    fn append_context_root(
        &mut self,
        source: &Path,
        matcher: &PatternMatcher,
        errors: &mut TraversalErrors,
    ) -> Flow {
        for item in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error while walking {}: {}", source.display(), e);
                    errors.push(e);
                    continue;
                }
            };
            // The root itself never becomes an entry.
            if entry.depth() == 0 {
                continue;
            }

            let name = match entry.path().strip_prefix(source) {
                Ok(relative) => slash_name(relative),
                Err(e) => {
                    errors.push(anyhow!(e).context(format!("relativizing {}", entry.path().display())));
                    continue;
                }
            };
            if matcher.matches(&name) {
                trace!("Excluded {}", name);
                continue;
            }

            let result = entry
                .metadata()
                .map_err(anyhow::Error::from)
                .and_then(|metadata| self.append_entry(entry.path(), &name, &metadata));
            if let Err(e) = result {
                if self.sink_broken() {
                    return Flow::Cancelled;
                }
                warn!("Failed to archive {}: {:#}", entry.path().display(), e);
                errors.push(e.context(format!("archiving {}", entry.path().display())));
            }
        }
        Flow::Continue
    }

    /// Appends a secondary root, which must be a single regular file.
    fn append_extra_root(&mut self, source: &Path, errors: &mut TraversalErrors) -> Flow {
        let metadata = match fs::symlink_metadata(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                errors.push(anyhow!(e).context(format!("stat {}", source.display())));
                return Flow::Abort;
            }
        };
        if !metadata.file_type().is_file() {
            errors.push(PodctxError::NotRegularFile(source.to_path_buf()));
            return Flow::Abort;
        }

        let name = absolute_archive_name(source);
        debug!("Adding {} as {}", source.display(), name);
        match self.append_file(source, &name, &metadata) {
            Ok(()) => Flow::Continue,
            Err(_) if self.sink_broken() => Flow::Cancelled,
            Err(e) => {
                errors.push(e.context(format!("archiving {}", source.display())));
                Flow::Continue
            }
        }
    }

    fn append_entry(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<()> {
        let file_type = metadata.file_type();
        if file_type.is_file() {
            self.append_file(path, name, metadata)
        } else if file_type.is_dir() {
            let mut header = base_header(metadata);
            header.set_size(0);
            self.builder()?.append_data(&mut header, name, io::empty())?;
            Ok(())
        } else if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            let mut header = base_header(metadata);
            header.set_size(0);
            self.builder()?.append_link(&mut header, name, &target)?;
            Ok(())
        } else {
            // Devices, sockets and fifos have no place in a build context.
            debug!("Skipping special file {}", path.display());
            Ok(())
        }
    }

    fn append_file(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<()> {
        let key = HardlinkTracker::key(metadata);
        let mut header = base_header(metadata);

        if let Some(canonical) = key
            .as_ref()
            .and_then(|key| self.tracker.canonical_name(key))
            .map(str::to_string)
        {
            trace!("{} is a hard link to {}", name, canonical);
            header.set_entry_type(EntryType::Link);
            header.set_size(0);
            self.builder()?.append_link(&mut header, name, &canonical)?;
            return Ok(());
        }

        let file = File::open(path)?;
        header.set_size(metadata.len());
        let mut data = SizedReader::new(file, metadata.len());
        self.builder()?.append_data(&mut header, name, &mut data)?;
        if let Some(read) = data.shortfall() {
            // The entry is padded to its header size, so the stream stays framed.
            return Err(anyhow!(
                "{} shrank while archiving: header says {} bytes, read {}",
                path.display(),
                metadata.len(),
                read
            ));
        }
        if let Some(key) = key {
            self.tracker.record(key, name);
        }
        Ok(())
    }

    /// Writes the tar trailer, flushes gzip and closes the pipe.
    fn finish(&mut self) -> io::Result<()> {
        let Some(builder) = self.builder.as_mut() else {
            return Ok(());
        };
        builder.finish()?;
        builder.get_mut().try_finish()?;
        builder.get_mut().get_mut().shutdown()?;
        // Dropping the builder drops the pipe's write half: the reader sees EOF.
        self.builder = None;
        Ok(())
    }
}

/// Header carrying `metadata` with ownership normalized to root.
fn base_header(metadata: &Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(metadata, HeaderMode::Complete);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Joins the components of a relative path with `/`.
fn slash_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Archive member name for a root given by absolute path.
///
/// Tar members must be relative, so the root/prefix component is dropped:
/// `/tmp/kube123/play.yaml` is stored as `tmp/kube123/play.yaml` and extracts
/// to `<dest>/tmp/kube123/play.yaml`.
pub(crate) fn absolute_archive_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Blocking writer over the pipe that remembers whether the reader hung up.
struct PipeWriter {
    inner: SyncIoBridge<DuplexStream>,
    broken: bool,
}

impl PipeWriter {
    fn new(inner: SyncIoBridge<DuplexStream>) -> Self {
        Self {
            inner,
            broken: false,
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        let result = self.inner.shutdown();
        self.track(result)
    }

    fn track<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.broken = true;
        }
        result
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.track(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.track(result)
    }
}

/// Yields exactly `expected` bytes from `inner`.
///
/// Growth past `expected` is cut off; a source that ends early is padded with
/// zeros so the tar entry still matches its header.
struct SizedReader<R> {
    inner: R,
    remaining: u64,
    read: u64,
    padded: bool,
}

impl<R: Read> SizedReader<R> {
    fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            remaining: expected,
            read: 0,
            padded: false,
        }
    }

    /// Bytes actually read from the source, if it ran short.
    fn shortfall(&self) -> Option<u64> {
        self.padded.then_some(self.read)
    }
}

impl<R: Read> Read for SizedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = if self.padded {
            0
        } else {
            self.inner.read(&mut buf[..want])?
        };
        let n = if n == 0 {
            self.padded = true;
            buf[..want].fill(0);
            want
        } else {
            self.read += n as u64;
            n
        };
        self.remaining -= n as u64;
        Ok(n)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    #[derive(Debug)]
    struct Listed {
        name: String,
        kind: EntryType,
        size: u64,
        link: Option<String>,
        uid: u64,
        gid: u64,
    }

    fn list_entries(bytes: &[u8]) -> Vec<Listed> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .expect("archive entries")
            .map(|entry| {
                let entry = entry.expect("entry");
                let header = entry.header();
                Listed {
                    name: entry.path().unwrap().to_string_lossy().to_string(),
                    kind: header.entry_type(),
                    size: header.size().unwrap(),
                    link: entry
                        .link_name()
                        .unwrap()
                        .map(|l| l.to_string_lossy().to_string()),
                    uid: header.uid().unwrap(),
                    gid: header.gid().unwrap(),
                }
            })
            .collect()
    }

    fn names(entries: &[Listed]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    async fn archive_bytes(excludes: &[&str], roots: &[PathBuf]) -> Vec<u8> {
        let excludes: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
        let mut stream = build_archive(&excludes, roots, &ArchiveOptions::default()).unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.expect("archive stream");
        bytes
    }

    #[tokio::test]
    async fn test_context_root_is_relative_and_ordered() -> Result<()> {
        let temp_dir = tempdir()?;
        let dir_path = temp_dir.path();
        fs::write(dir_path.join("file1.txt"), "hello")?;
        fs::create_dir(dir_path.join("subdir"))?;
        fs::write(dir_path.join("subdir/file2.txt"), "world")?;
        fs::write(dir_path.join("a.txt"), "first")?;

        let entries = list_entries(&archive_bytes(&[], &[dir_path.to_path_buf()]).await);
        assert_eq!(
            names(&entries),
            vec!["a.txt", "file1.txt", "subdir", "subdir/file2.txt"]
        );
        assert!(entries.iter().all(|e| e.uid == 0 && e.gid == 0));
        let subdir = &entries[2];
        assert_eq!(subdir.kind, EntryType::Directory);
        assert_eq!(entries[1].size, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_root_produces_no_entries() -> Result<()> {
        let temp_dir = tempdir()?;
        let entries = list_entries(&archive_bytes(&[], &[temp_dir.path().to_path_buf()]).await);
        assert!(entries.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_excluded_files_are_skipped() -> Result<()> {
        let temp_dir = tempdir()?;
        fs::write(temp_dir.path().join("include.txt"), "include content")?;
        fs::write(temp_dir.path().join("exclude.txt"), "exclude content")?;

        let entries = list_entries(
            &archive_bytes(&["exclude.txt"], &[temp_dir.path().to_path_buf()]).await,
        );
        assert_eq!(names(&entries), vec!["include.txt"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_exclusion_does_not_prune_descendants() -> Result<()> {
        let temp_dir = tempdir()?;
        fs::create_dir(temp_dir.path().join("docs"))?;
        fs::write(temp_dir.path().join("docs/drop.md"), "drop")?;
        fs::write(temp_dir.path().join("docs/keep.md"), "keep")?;
        fs::write(temp_dir.path().join("main.rs"), "fn main() {}")?;

        let entries = list_entries(
            &archive_bytes(&["docs", "!docs/keep.md"], &[temp_dir.path().to_path_buf()]).await,
        );
        assert_eq!(names(&entries), vec!["docs/keep.md", "main.rs"]);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_target_preserved_verbatim() -> Result<()> {
        let temp_dir = tempdir()?;
        fs::write(temp_dir.path().join("target.txt"), "target content")?;
        std::os::unix::fs::symlink("target.txt", temp_dir.path().join("link.txt"))?;
        std::os::unix::fs::symlink("../../nowhere", temp_dir.path().join("dangling"))?;

        let entries = list_entries(&archive_bytes(&[], &[temp_dir.path().to_path_buf()]).await);
        assert_eq!(names(&entries), vec!["dangling", "link.txt", "target.txt"]);
        assert_eq!(entries[0].kind, EntryType::Symlink);
        assert_eq!(entries[0].link.as_deref(), Some("../../nowhere"));
        assert_eq!(entries[1].kind, EntryType::Symlink);
        assert_eq!(entries[1].link.as_deref(), Some("target.txt"));
        assert_eq!(entries[1].size, 0);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hard_links_written_once() -> Result<()> {
        let temp_dir = tempdir()?;
        fs::create_dir(temp_dir.path().join("b"))?;
        fs::write(temp_dir.path().join("a.bin"), "shared bytes")?;
        fs::hard_link(temp_dir.path().join("a.bin"), temp_dir.path().join("b/copy.bin"))?;
        fs::hard_link(temp_dir.path().join("a.bin"), temp_dir.path().join("c.bin"))?;

        let entries = list_entries(&archive_bytes(&[], &[temp_dir.path().to_path_buf()]).await);
        assert_eq!(names(&entries), vec!["a.bin", "b", "b/copy.bin", "c.bin"]);

        assert_eq!(entries[0].kind, EntryType::Regular);
        assert_eq!(entries[0].size, 12);
        for linked in [&entries[2], &entries[3]] {
            assert_eq!(linked.kind, EntryType::Link);
            assert_eq!(linked.size, 0);
            assert_eq!(linked.link.as_deref(), Some("a.bin"));
        }
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_excluded_canonical_is_not_referenced() -> Result<()> {
        let temp_dir = tempdir()?;
        fs::write(temp_dir.path().join("a.bin"), "shared")?;
        fs::hard_link(temp_dir.path().join("a.bin"), temp_dir.path().join("b.bin"))?;

        let entries =
            list_entries(&archive_bytes(&["a.bin"], &[temp_dir.path().to_path_buf()]).await);
        assert_eq!(names(&entries), vec!["b.bin"]);
        assert_eq!(entries[0].kind, EntryType::Regular);
        assert_eq!(entries[0].size, 6);
        Ok(())
    }

    #[test]
    fn test_no_sources_fails_without_stream() {
        let err = build_archive(&[], &[], &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PodctxError>(),
            Some(PodctxError::NoSources)
        ));
    }

    #[test]
    fn test_invalid_pattern_fails_without_stream() {
        let temp_dir = tempdir().unwrap();
        let err = build_archive(
            &["!".to_string()],
            &[temp_dir.path().to_path_buf()],
            &ArchiveOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("processing excludes list"));
    }

    #[tokio::test]
    async fn test_extra_root_archived_under_absolute_path() -> Result<()> {
        let temp_dir = tempdir()?;
        let source1 = temp_dir.path().join("source1");
        let source2 = temp_dir.path().join("source2");
        fs::create_dir(&source1)?;
        fs::create_dir(&source2)?;
        fs::write(source1.join("source1.txt"), "hello world")?;
        let containerfile = source2.join("Containerfile");
        fs::write(&containerfile, "FROM scratch")?;

        // An exclusion matching everything must not touch later roots.
        let entries = list_entries(&archive_bytes(&["*"], &[source1, containerfile.clone()]).await);
        assert_eq!(names(&entries), vec![absolute_archive_name(&containerfile)]);
        assert_eq!(entries[0].size, 12);
        Ok(())
    }

    #[tokio::test]
    async fn test_directory_as_extra_root_fails_build() -> Result<()> {
        let temp_dir = tempdir()?;
        let context = temp_dir.path().join("context");
        let extra = temp_dir.path().join("extra");
        fs::create_dir(&context)?;
        fs::create_dir(&extra)?;

        let mut stream = build_archive(&[], &[context, extra.clone()], &ArchiveOptions::default())?;
        let mut bytes = Vec::new();
        let err = stream.read_to_end(&mut bytes).await.unwrap_err();
        let domain = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<PodctxError>())
            .expect("aggregated error");
        assert!(domain.to_string().contains("must be a regular file"));
        assert!(domain.to_string().contains(&extra.display().to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_are_aggregated_and_siblings_continue() -> Result<()> {
        let temp_dir = tempdir()?;
        let missing = temp_dir.path().join("missing-context");
        let extra = temp_dir.path().join("Containerfile");
        fs::write(&extra, "FROM scratch")?;

        let mut stream = build_archive(&[], &[missing, extra.clone()], &ArchiveOptions::default())?;
        let mut bytes = Vec::new();
        let err = stream.read_to_end(&mut bytes).await.unwrap_err();
        match err.get_ref().and_then(|e| e.downcast_ref::<PodctxError>()) {
            Some(PodctxError::Traversal(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }

        // The later root was still archived.
        let entries = list_entries(&bytes);
        assert_eq!(names(&entries), vec![absolute_archive_name(&extra)]);

        // The error was already surfaced by the terminal read.
        assert!(stream.close().await.is_ok());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_reported_and_siblings_archived() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir()?;
        let ctx = temp_dir.path();
        fs::write(ctx.join("a.txt"), "a")?;
        fs::write(ctx.join("b.txt"), "b")?;
        fs::write(ctx.join("c.txt"), "c")?;
        let locked = ctx.join("b.txt");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        if File::open(&locked).is_ok() {
            // Running as root: permissions are not enforced.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;
            return Ok(());
        }

        let mut stream = build_archive(&[], &[ctx.to_path_buf()], &ArchiveOptions::default())?;
        let mut bytes = Vec::new();
        let err = stream.read_to_end(&mut bytes).await.unwrap_err();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;

        match err.get_ref().and_then(|e| e.downcast_ref::<PodctxError>()) {
            Some(PodctxError::Traversal(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.to_string().contains("b.txt"), "{errors}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let entries = list_entries(&bytes);
        assert_eq!(names(&entries), vec!["a.txt", "c.txt"]);
        Ok(())
    }

    #[test]
    fn test_sized_reader_pads_a_short_source() {
        let mut reader = SizedReader::new(&[7u8; 10][..], 100);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(&out[..10], &[7u8; 10]);
        assert!(out[10..].iter().all(|b| *b == 0));
        assert_eq!(reader.shortfall(), Some(10));
    }

    #[test]
    fn test_sized_reader_caps_a_grown_source() {
        let mut reader = SizedReader::new(&[1u8; 50][..], 20);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(reader.shortfall(), None);
    }

    #[test]
    fn test_short_entry_keeps_following_entries_framed() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_size(100);
        header.set_mode(0o644);
        let mut short = SizedReader::new(&b"only ten b"[..], 100);
        builder.append_data(&mut header, "shrunk.txt", &mut short).unwrap();
        assert_eq!(short.shortfall(), Some(10));

        let mut header = Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        builder.append_data(&mut header, "next.txt", &b"hello"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut archive = tar::Archive::new(&bytes[..]);
        let mut listed = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().to_string();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            listed.push((name, body.len()));
        }
        assert_eq!(
            listed,
            vec![("shrunk.txt".to_string(), 100), ("next.txt".to_string(), 5)]
        );
    }

    fn large_context(files: usize) -> tempfile::TempDir {
        let temp_dir = tempdir().unwrap();
        let chunk: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        for i in 0..files {
            fs::write(temp_dir.path().join(format!("blob-{i:03}.bin")), &chunk).unwrap();
        }
        temp_dir
    }

    #[tokio::test]
    async fn test_close_mid_stream_stops_worker() -> Result<()> {
        let context = large_context(64);
        let options = ArchiveOptions {
            compression: Compression::none(),
            pipe_capacity: 1024,
        };

        for _ in 0..5 {
            let mut stream = build_archive(&[], &[context.path().to_path_buf()], &options)?;
            let mut head = [0u8; 512];
            stream.read_exact(&mut head).await?;
            tokio::time::timeout(Duration::from_secs(10), stream.close())
                .await
                .expect("worker must stop after close")?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_worker_and_scratch() -> Result<()> {
        let context = large_context(32);
        let scratch = ScratchDir::new("podctx_drop", None)?;
        let scratch_path = scratch.path().to_path_buf();
        let options = ArchiveOptions {
            compression: Compression::none(),
            pipe_capacity: 1024,
        };

        let mut stream = spawn_archive(&[], &[context.path().to_path_buf()], &options, Some(scratch))?;
        let mut head = [0u8; 512];
        stream.read_exact(&mut head).await?;
        drop(stream);

        // The worker owns the scratch guard, so its removal proves the worker exited.
        tokio::time::timeout(Duration::from_secs(10), async {
            while scratch_path.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("worker must exit once the reader is dropped");
        Ok(())
    }

    #[test]
    fn test_absolute_archive_name() {
        assert_eq!(
            absolute_archive_name(Path::new("/tmp/kube123/play.yaml")),
            "tmp/kube123/play.yaml"
        );
    }
}
