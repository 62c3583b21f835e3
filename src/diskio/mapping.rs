//! Shared read-only mapping of a spill file.
//!
//! One mapping is made per merge. Every [`MappedView`] holds a counted
//! reference to it; the region is unmapped exactly once, when the last view
//! and the [`SharedMapping`] handle itself are gone.

use std::ops::Range;
use std::sync::Arc;

use log::trace;
use memmap2::Mmap;

use crate::diskio::spill_file::SpillFile;
use crate::error::{Result, SortError};
use crate::sort::chunk::Chunk;

struct Region {
    mmap: Option<Mmap>,
}

impl Region {
    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Some(mmap) = self.mmap.take() {
            trace!("Unmapping {} bytes", mmap.len());
        }
    }
}

#[derive(Clone)]
pub struct SharedMapping {
    region: Arc<Region>,
}

impl SharedMapping {
    /// Map the whole of `file` read-only.
    pub fn map(file: &SpillFile) -> Result<Self> {
        let mmap = if file.is_empty() {
            None
        } else {
            // SAFETY: the spill file is private to its accumulator and is not
            // written while this mapping is alive.
            let mmap = unsafe { Mmap::map(file.as_file()) }
                .map_err(SortError::io("mapping spill file"))?;
            Some(mmap)
        };
        trace!("Mapped {} bytes of {:?}", file.len(), file.path());
        Ok(Self {
            region: Arc::new(Region { mmap }),
        })
    }

    pub fn len(&self) -> usize {
        self.region.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounded view over one chunk of the mapping.
    pub fn view(&self, chunk: &Chunk) -> Result<MappedView> {
        let start = usize::try_from(chunk.offset()).ok();
        let end = usize::try_from(chunk.end()).ok();
        match (start, end) {
            (Some(start), Some(end)) if end <= self.len() => Ok(MappedView {
                region: Arc::clone(&self.region),
                range: start..end,
            }),
            _ => Err(SortError::Io {
                context: "mapping chunk",
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "chunk {}..{} lies outside the {} mapped bytes",
                        chunk.offset(),
                        chunk.end(),
                        self.len()
                    ),
                ),
            }),
        }
    }

    /// Number of live references: this handle plus every open view.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.region)
    }
}

/// Read-only window over `[start, end)` of a shared mapping.
pub struct MappedView {
    region: Arc<Region>,
    range: Range<usize>,
}

impl MappedView {
    pub fn bytes(&self) -> &[u8] {
        &self.region.bytes()[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
