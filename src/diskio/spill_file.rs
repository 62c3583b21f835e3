//! Private temp file that receives spilled chunks.
//!
//! Writes always go to the current end of the file through `pwrite`, so the
//! logical length tracked here is the only write position. The file is
//! removed when the `SpillFile` is dropped or closed.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::diskio::file::{copy_range_fd, pwrite_all_fd};
use crate::error::{Result, SortError};

pub struct SpillFile {
    file: NamedTempFile,
    len: u64,
}

impl SpillFile {
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("extsort_").suffix(".tmp");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(SortError::io("creating spill file"))?;

        debug!("Created spill file {:?}", file.path());
        Ok(Self { file, len: 0 })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn as_file(&self) -> &File {
        self.file.as_file()
    }

    /// Bytes written so far; also the offset of the next write.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        pwrite_all_fd(self.file.as_raw_fd(), bytes, self.len)
            .map_err(SortError::io("writing spill file"))?;
        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Append the whole content of `other` to this file and return the offset
    /// it landed at. `other` is consumed and removed.
    pub fn append_file(&mut self, other: SpillFile, scratch: &mut Vec<u8>) -> Result<u64> {
        let base = self.len;
        copy_range_fd(
            other.file.as_raw_fd(),
            0,
            self.file.as_raw_fd(),
            base,
            other.len,
            scratch,
        )
        .map_err(SortError::io("transferring spill file contents"))?;
        self.len += other.len;
        debug!(
            "Appended {} bytes from {:?} at offset {}",
            other.len,
            other.path(),
            base
        );
        other.close();
        Ok(base)
    }

    /// Remove the file, logging instead of failing.
    pub fn close(self) {
        if let Err(e) = self.try_close() {
            warn!("{}", e);
        }
    }

    pub fn try_close(self) -> Result<()> {
        let path: PathBuf = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|source| SortError::Release { path, source })
    }
}

impl std::fmt::Debug for SpillFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillFile")
            .field("path", &self.file.path())
            .field("len", &self.len)
            .finish()
    }
}
