//! Partial sort state: a bounded in-memory buffer plus the sorted chunks it
//! has spilled to a private temp file.
//!
//! Records go in through [`Accumulator::add`]. Whenever the buffer fills up it
//! is sorted and written out as one chunk. Accumulators built independently,
//! for instance one per thread, are merged with [`Accumulator::combine`], and
//! [`Accumulator::finish`] turns the result into a [`SortedIter`].
//!
//! Records that compare equal come out in input order as long as partial
//! accumulators are combined left to right, i.e. the receiver always holds
//! the earlier part of the input.

use std::sync::Arc;

use bytes::BytesMut;
use log::debug;

use crate::config::Configuration;
use crate::diskio::mapping::SharedMapping;
use crate::diskio::spill_file::SpillFile;
use crate::error::{ErrorKind, Result, SortError};
use crate::sort::chunk::Chunk;
use crate::sort::cursor::ChunkCursor;
use crate::sort::merge::MergeIterator;
use crate::sort::output::SortedIter;
use crate::sort::sort_buffer::Elements;

pub struct Accumulator<T> {
    config: Arc<Configuration<T>>,
    elements: Elements<T>,
    // Oldest first, contiguous in file order
    chunks: Vec<Chunk>,
    file: Option<SpillFile>,
    buffer: Option<BytesMut>,
    scratch: Vec<u8>,
    len: u64,
    // Set when a spill fails after records left the buffer
    failed: Option<ErrorKind>,
}

impl<T: Send> Accumulator<T> {
    pub fn new(config: Arc<Configuration<T>>) -> Self {
        let elements = Elements::new(config.internal_sort_max_items());
        Self {
            config,
            elements,
            chunks: Vec::new(),
            file: None,
            buffer: None,
            scratch: Vec::new(),
            len: 0,
            failed: None,
        }
    }

    pub fn config(&self) -> &Arc<Configuration<T>> {
        &self.config
    }

    /// Total records added, spilled or not.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes written to the spill file so far.
    pub fn spill_bytes(&self) -> u64 {
        self.file.as_ref().map_or(0, SpillFile::len)
    }

    /// Whether an earlier spill failed. A failed accumulator rejects every
    /// further `add`, `combine` and `finish` with [`SortError::Aborted`].
    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    fn check(&self) -> Result<()> {
        match self.failed {
            Some(kind) => Err(SortError::Aborted { kind }),
            None => Ok(()),
        }
    }

    pub fn add(&mut self, record: T) -> Result<()> {
        self.check()?;
        self.push(record)?;
        self.len += 1;
        Ok(())
    }

    fn push(&mut self, record: T) -> Result<()> {
        self.elements.add(record);
        if self.elements.is_full() {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        let result = self.write_chunk();
        if let Err(e) = &result {
            self.failed = Some(e.kind());
        }
        result
    }

    /// Sort the buffered records and write them out as one new chunk.
    fn write_chunk(&mut self) -> Result<()> {
        if self.elements.is_empty() {
            return Ok(());
        }

        let config = Arc::clone(&self.config);
        let max_record_size = config.max_record_size();
        let write_buffer_size = config.write_buffer_size();
        let count = self.elements.len();

        self.elements
            .sort(|a, b| config.compare(a, b), config.parallel_sort());

        let file = match self.file.take() {
            Some(file) => file,
            None => SpillFile::create(config.temp_dir())?,
        };
        let file = self.file.insert(file);
        let buffer = self
            .buffer
            .get_or_insert_with(|| BytesMut::with_capacity(write_buffer_size));
        buffer.clear();

        let start = file.len();
        for record in self.elements.drain() {
            let before = buffer.len();
            config.serializer().write(&record, buffer);
            let size = buffer.len() - before;
            if size == 0 || size > max_record_size {
                buffer.clear();
                return Err(SortError::RecordSize {
                    size,
                    max: max_record_size,
                });
            }

            if write_buffer_size.saturating_sub(buffer.len()) < max_record_size {
                file.append(buffer)?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            file.append(buffer)?;
            buffer.clear();
        }

        let chunk = Chunk::new(start, file.len() - start);
        debug!(
            "Spilled {} records ({} bytes) as chunk {} of {:?}",
            count,
            chunk.length(),
            self.chunks.len(),
            file.path()
        );
        self.chunks.push(chunk);
        Ok(())
    }

    /// Absorb `other`, which must hold input that comes after this
    /// accumulator's. On failure both accumulators are dropped and their
    /// spill files removed.
    pub fn combine(mut self, mut other: Accumulator<T>) -> Result<Self> {
        self.check()?;
        other.check()?;
        let other_len = other.len;

        if let Some(other_file) = other.file.take() {
            // Buffered records must stay ahead of everything in `other`.
            self.spill()?;

            match self.file.as_mut() {
                None => {
                    debug!("Adopting spill file {:?}", other_file.path());
                    self.file = Some(other_file);
                    self.chunks = std::mem::take(&mut other.chunks);
                    if self.buffer.is_none() {
                        self.buffer = other.buffer.take();
                    }
                }
                Some(file) => {
                    let base = file.append_file(other_file, &mut self.scratch)?;
                    self.chunks
                        .extend(other.chunks.iter().map(|chunk| chunk.shifted(base)));
                }
            }
        }

        let residual = other.elements.len();
        for record in other.elements {
            self.push(record)?;
        }
        self.len += other_len;

        debug!(
            "Combined {} records ({} buffered) into {} total across {} chunks",
            other_len,
            residual,
            self.len,
            self.chunks.len()
        );
        Ok(self)
    }

    /// Produce the sorted output. Nothing touches disk if nothing was spilled.
    pub fn finish(mut self) -> Result<SortedIter<T>> {
        self.check()?;
        if self.file.is_some() {
            self.spill()?;
        }

        let Some(mut file) = self.file.take() else {
            let config = Arc::clone(&self.config);
            self.elements
                .sort(|a, b| config.compare(a, b), config.parallel_sort());
            debug!("Sorted {} records in memory", self.elements.len());
            return Ok(SortedIter::in_memory(self.elements));
        };

        if let Some(fan_in) = self.config.max_number_of_chunks() {
            while self.chunks.len() > fan_in {
                file = self.compact(file, fan_in)?;
            }
        }

        let mapping = SharedMapping::map(&file)?;
        let cursors = cursors_for(&self.config, &mapping, &self.chunks)?;
        drop(mapping);
        let merge = MergeIterator::new(cursors, self.len)?;

        debug!(
            "Merging {} records from {} chunks of {:?}",
            self.len,
            self.chunks.len(),
            file.path()
        );
        Ok(SortedIter::merged(merge, file))
    }

    /// Merge consecutive groups of `fan_in` chunks into a fresh file and
    /// replace the chunk list. The old file is removed once every group has
    /// been copied.
    fn compact(&mut self, old: SpillFile, fan_in: usize) -> Result<SpillFile> {
        let write_buffer_size = self.config.write_buffer_size();
        let max_record_size = self.config.max_record_size();

        let mapping = SharedMapping::map(&old)?;
        let mut target = SpillFile::create(self.config.temp_dir())?;
        let buffer = self
            .buffer
            .get_or_insert_with(|| BytesMut::with_capacity(write_buffer_size));

        let mut chunks = Vec::with_capacity(self.chunks.len().div_ceil(fan_in));
        let mut copied = 0u64;
        for group in self.chunks.chunks(fan_in) {
            let start = target.len();
            let cursors = cursors_for(&self.config, &mapping, group)?;
            copied += MergeIterator::new(cursors, 0)?.merge_into(
                &mut target,
                buffer,
                write_buffer_size,
                max_record_size,
            )?;
            chunks.push(Chunk::new(start, target.len() - start));
        }

        debug!(
            "Compacted {} chunks into {} ({} records, {} bytes) in {:?}",
            self.chunks.len(),
            chunks.len(),
            copied,
            target.len(),
            target.path()
        );
        self.chunks = chunks;
        drop(mapping);
        old.close();
        Ok(target)
    }
}

/// One cursor per chunk; the chunk's position is its tie-break order.
fn cursors_for<T>(
    config: &Configuration<T>,
    mapping: &SharedMapping,
    chunks: &[Chunk],
) -> Result<Vec<ChunkCursor<T>>> {
    chunks
        .iter()
        .enumerate()
        .map(|(order, chunk)| {
            Ok(ChunkCursor::new(
                mapping.view(chunk)?,
                config.shared_serializer(),
                Arc::clone(config.comparator()),
                order,
            ))
        })
        .collect()
}

impl<T> std::fmt::Debug for Accumulator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("len", &self.len)
            .field("buffered", &self.elements.len())
            .field("chunks", &self.chunks.len())
            .field("file", &self.file)
            .field("failed", &self.failed)
            .finish()
    }
}
