//! Hard link tracking for build-context archives.
//!
//! Maps a `(device, inode)` identity to the archive name of the first entry
//! written for it. Only files whose link count exceeds one get a key, so the
//! map stays empty for ordinary trees. One tracker lives for exactly one
//! archive build and is owned by its worker.

use std::collections::HashMap;
use std::fs;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct IdentityKey {
    device: u64,
    inode: u64,
}

#[derive(Debug, Default)]
pub(crate) struct HardlinkTracker {
    canonical: HashMap<IdentityKey, String>,
}

impl HardlinkTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Identity key of `metadata`, or `None` when the file has a single link.
    #[cfg(unix)]
    pub(crate) fn key(metadata: &fs::Metadata) -> Option<IdentityKey> {
        use std::os::unix::fs::MetadataExt;

        if metadata.nlink() > 1 {
            Some(IdentityKey {
                device: metadata.dev(),
                inode: metadata.ino(),
            })
        } else {
            None
        }
    }

    #[cfg(not(unix))]
    pub(crate) fn key(_metadata: &fs::Metadata) -> Option<IdentityKey> {
        None
    }

    /// Archive name of the canonical entry for `key`, if one was recorded.
    pub(crate) fn canonical_name(&self, key: &IdentityKey) -> Option<&str> {
        self.canonical.get(key).map(String::as_str)
    }

    /// Records `name` as canonical for `key`. The first record wins.
    pub(crate) fn record(&mut self, key: IdentityKey, name: &str) {
        self.canonical
            .entry(key)
            .or_insert_with(|| name.to_string());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.canonical.len()
    }
}
