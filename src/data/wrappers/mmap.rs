//! Memory-mapped `.gma`/`.tpl` sources, and writing finished pairs back out.
//!
//! An archive pair lives on disk as `<stem>.gma` next to `<stem>.tpl`. Both
//! files are mapped read-only and exposed as byte slices for the readers.

use std::fs::{self, File};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::{debug, warn};

use crate::error::{ArchiveError, IResult};

/// A single read-only mapped archive file.
#[derive(Debug)]
pub struct MappedArchive {
    path: PathBuf,
    // Zero-length files cannot be mapped on every platform.
    mmap: Option<Mmap>,
}

impl MappedArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> IResult<Self> {
        let path = path.as_ref().to_owned();
        let unreadable = |source| ArchiveError::SourceUnreadable {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(unreadable)?;
        let len = file.metadata().map_err(unreadable)?.len();
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { MmapOptions::new().map(&file) }.map_err(unreadable)?)
        };

        debug!("mapped {} ({len:#X} bytes)", path.display());

        Ok(MappedArchive { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for MappedArchive {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

impl AsRef<[u8]> for MappedArchive {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// A mapped `.gma`/`.tpl` pair sharing a path stem.
#[derive(Debug)]
pub struct MappedPair {
    pub gma: MappedArchive,
    pub tpl: MappedArchive,
}

impl MappedPair {
    /// Map `<stem>.gma` and `<stem>.tpl`.
    pub fn open<P: AsRef<Path>>(stem: P) -> IResult<Self> {
        let stem = stem.as_ref();
        Ok(MappedPair {
            gma: MappedArchive::open(with_suffix(stem, "gma"))?,
            tpl: MappedArchive::open(with_suffix(stem, "tpl"))?,
        })
    }
}

/// Append `.ext` to a path stem without replacing any dots already in it.
pub fn with_suffix(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Write a finished pair to `<stem>.gma` and `<stem>.tpl`.
///
/// Either both files are written or neither is left behind: if the texture
/// archive cannot be written, the model archive just written is removed.
pub fn write_pair(stem: &Path, gma: &[u8], tpl: &[u8]) -> IResult<()> {
    let gma_path = with_suffix(stem, "gma");
    fs::write(&gma_path, gma)?;

    if let Err(e) = fs::write(with_suffix(stem, "tpl"), tpl) {
        if let Err(cleanup) = fs::remove_file(&gma_path) {
            warn!("unable to remove {}: {cleanup}", gma_path.display());
        }
        return Err(e.into());
    }

    debug!(
        "wrote {} ({:#X} + {:#X} bytes)",
        stem.display(),
        gma.len(),
        tpl.len()
    );
    Ok(())
}
