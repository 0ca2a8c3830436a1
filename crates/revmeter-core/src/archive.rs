//! Content-addressed archive for captured benchmark output.
//!
//! Every benchmark's captured stdout is hashed and moved into the archive
//! directory under its digest name. Content-identical outputs across runs and
//! revisions collapse into a single artifact — the archive directory itself
//! is the dedup state, so re-running a benchmark whose output did not change
//! leaves no new file behind. The hash is used for change detection only;
//! collision resistance against an adversary is not a requirement here.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Chunk size for hashing file content.
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// A directory of checksum-named output artifacts.
#[derive(Debug, Clone)]
pub struct OutputArchive {
    dir: PathBuf,
}

impl OutputArchive {
    /// Open (creating if necessary) an archive at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<OutputArchive> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(OutputArchive { dir })
    }

    /// Archive directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive a captured output file, returning its content checksum.
    ///
    /// If no artifact with that checksum exists yet the file is moved into
    /// the archive under the hex digest name; otherwise the duplicate capture
    /// is deleted and the existing artifact stands.
    pub fn archive(&self, path: &Path) -> Result<String> {
        let checksum = file_sha256(path)?;
        let target = self.dir.join(&checksum);
        if target.exists() {
            debug!("output {} already archived, dropping capture", checksum);
            fs::remove_file(path)?;
        } else if fs::rename(path, &target).is_err() {
            // Rename fails across filesystems; fall back to copy + remove.
            fs::copy(path, &target)?;
            fs::remove_file(path)?;
        }
        Ok(checksum)
    }

    /// Whether an artifact with this checksum exists.
    pub fn contains(&self, checksum: &str) -> bool {
        self.dir.join(checksum).exists()
    }

    /// Delete a capture file if it is empty, reporting whether it was
    /// deleted. Used for stderr captures of benchmarks that produced no
    /// diagnostics.
    pub fn remove_if_empty(path: &Path) -> Result<bool> {
        if fs::metadata(path)?.len() == 0 {
            fs::remove_file(path)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// SHA-256 of a file's content, read in fixed-size chunks, as lowercase hex.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Hex-encode bytes without any separator.
fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        write!(s, "{:02x}", b).unwrap();
    }
    s
}
