use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bytes::BytesMut;

use crate::diskio::spill_file::SpillFile;
use crate::error::{Result, SortError};
use crate::sort::cursor::ChunkCursor;

// K-way merge over chunk cursors
pub struct MergeIterator<T> {
    // Min heap of primed cursors
    heap: BinaryHeap<HeapEntry<T>>,
    remaining: u64,
    pending_error: Option<SortError>,
    done: bool,
}

struct HeapEntry<T> {
    cursor: ChunkCursor<T>,
}

// Implement reverse ordering for min-heap
impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cursor.cmp_heads(&self.cursor)
    }
}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> MergeIterator<T> {
    /// Prime every cursor and build the heap. `total` is the number of records
    /// the merge is expected to yield.
    pub fn new(cursors: Vec<ChunkCursor<T>>, total: u64) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(cursors.len());

        for mut cursor in cursors {
            if cursor.current()?.is_some() {
                heap.push(HeapEntry { cursor });
            }
        }

        Ok(Self {
            heap,
            remaining: total,
            pending_error: None,
            done: false,
        })
    }

    /// Cursors that still hold records.
    #[cfg(test)]
    pub(crate) fn open_cursors(&self) -> usize {
        self.heap.len()
    }

    /// Records not yet yielded, as declared at construction.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Close every queued cursor, releasing their mapping references.
    pub fn close(&mut self) {
        for entry in self.heap.drain() {
            entry.cursor.close();
        }
        self.done = true;
    }

    /// Re-queue `cursor` if it has more records, otherwise close it.
    fn requeue(&mut self, mut cursor: ChunkCursor<T>) -> Result<()> {
        if !cursor.has_next() {
            cursor.close();
            return Ok(());
        }
        cursor.current()?;
        self.heap.push(HeapEntry { cursor });
        Ok(())
    }

    /// Drain the merge into `file` by copying each record's encoded bytes.
    ///
    /// `buffer` is flushed whenever fewer than `max_record_size` bytes of its
    /// `buffer_size` remain. Every cursor is closed on return.
    pub fn merge_into(
        mut self,
        file: &mut SpillFile,
        buffer: &mut BytesMut,
        buffer_size: usize,
        max_record_size: usize,
    ) -> Result<u64> {
        let mut records = 0u64;
        buffer.clear();

        while let Some(HeapEntry { mut cursor }) = self.heap.pop() {
            buffer.extend_from_slice(cursor.current_bytes());
            cursor.skip();
            records += 1;

            if buffer_size.saturating_sub(buffer.len()) < max_record_size {
                file.append(buffer)?;
                buffer.clear();
            }

            if let Err(e) = self.requeue(cursor) {
                self.close();
                return Err(e);
            }
        }

        if !buffer.is_empty() {
            file.append(buffer)?;
            buffer.clear();
        }

        Ok(records)
    }
}

impl<T> Iterator for MergeIterator<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            self.close();
            return Some(Err(e));
        }
        if self.done {
            return None;
        }

        let Some(HeapEntry { mut cursor }) = self.heap.pop() else {
            self.done = true;
            return None;
        };

        let record = match cursor.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.close();
                return None;
            }
            Err(e) => {
                self.close();
                return Some(Err(e));
            }
        };

        // A failure decoding the next head is reported after this record.
        if let Err(e) = self.requeue(cursor) {
            self.pending_error = Some(e);
        }

        self.remaining = self.remaining.saturating_sub(1);
        Some(Ok(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl<T> Drop for MergeIterator<T> {
    fn drop(&mut self) {
        self.close();
    }
}
