//! The lazily produced result of a sort.
//!
//! A `SortedIter` either walks the in-memory buffer (nothing was spilled) or
//! drives the final k-way merge and owns the spill file behind it. Dropping or
//! closing it releases the mapping and deletes the file, whether or not the
//! iterator was exhausted.

use std::path::Path;

use crate::diskio::spill_file::SpillFile;
use crate::error::Result;
use crate::sort::merge::MergeIterator;
use crate::sort::sort_buffer::Elements;

pub struct SortedIter<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    InMemory {
        records: <Elements<T> as IntoIterator>::IntoIter,
        remaining: u64,
    },
    Merged {
        merge: MergeIterator<T>,
        // Declared after `merge` so the mapping goes before the file.
        file: Option<SpillFile>,
    },
    Closed,
}

impl<T> SortedIter<T> {
    pub(crate) fn in_memory(elements: Elements<T>) -> Self {
        let remaining = elements.len() as u64;
        Self {
            inner: Inner::InMemory {
                records: elements.into_iter(),
                remaining,
            },
        }
    }

    pub(crate) fn merged(merge: MergeIterator<T>, file: SpillFile) -> Self {
        Self {
            inner: Inner::Merged {
                merge,
                file: Some(file),
            },
        }
    }

    /// Whether the records are coming from a spill file.
    pub fn is_external(&self) -> bool {
        matches!(self.inner, Inner::Merged { .. })
    }

    /// Path of the backing spill file while it exists.
    pub fn spill_path(&self) -> Option<&Path> {
        match &self.inner {
            Inner::Merged {
                file: Some(file), ..
            } => Some(file.path()),
            _ => None,
        }
    }

    /// Records still to come, as declared when the sort finished.
    pub fn len_hint(&self) -> u64 {
        match &self.inner {
            Inner::InMemory { remaining, .. } => *remaining,
            Inner::Merged { merge, .. } => merge.remaining(),
            Inner::Closed => 0,
        }
    }

    /// Release everything now. Failures to remove the spill file are logged.
    pub fn close(mut self) {
        self.release();
    }

    /// Release everything now, reporting a failure to remove the spill file.
    pub fn try_close(mut self) -> Result<()> {
        match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Merged { mut merge, file } => {
                merge.close();
                drop(merge);
                match file {
                    Some(file) => file.try_close(),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn release(&mut self) {
        if let Inner::Merged { mut merge, file } =
            std::mem::replace(&mut self.inner, Inner::Closed)
        {
            merge.close();
            drop(merge);
            if let Some(file) = file {
                file.close();
            }
        }
    }
}

impl<T> Iterator for SortedIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match &mut self.inner {
            Inner::InMemory { records, remaining } => {
                let record = records.next()?;
                *remaining -= 1;
                return Some(Ok(record));
            }
            Inner::Merged { merge, .. } => merge.next(),
            Inner::Closed => return None,
        };

        match item {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.release();
                Some(Err(e))
            }
            None => {
                self.release();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.len_hint()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl<T> std::fmt::Debug for SortedIter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedIter")
            .field("external", &self.is_external())
            .field("spill_path", &self.spill_path())
            .field("remaining", &self.len_hint())
            .finish()
    }
}

impl<T> Drop for SortedIter<T> {
    fn drop(&mut self) {
        self.release();
    }
}
