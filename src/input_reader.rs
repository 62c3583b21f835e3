// Sequential reader over a file of serialized records

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;

use crate::diskio::file::pread_fd;
use crate::error::{Result, SortError};
use crate::serializer::{Serializer, decode_one};

/// Decodes records back to back from a file through a fixed-size buffer.
///
/// The buffer is topped up whenever fewer than `max_record_size` unread
/// bytes are left in it, so a record never straddles a refill. Trailing bytes
/// that do not form a whole record end the stream with a decode error.
pub struct FileSource<T> {
    file: File,
    serializer: Arc<dyn Serializer<T>>,
    max_record_size: usize,
    buffer: Vec<u8>,
    start: usize,
    end: usize,
    file_offset: u64,
    file_len: u64,
    done: bool,
}

impl<T> FileSource<T> {
    pub fn open(
        path: impl AsRef<Path>,
        serializer: Arc<dyn Serializer<T>>,
        max_record_size: usize,
        buffer_size: usize,
    ) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(SortError::io("opening input file"))?;
        let file_len = file
            .metadata()
            .map_err(SortError::io("reading input file metadata"))?
            .len();

        Ok(Self {
            file,
            serializer,
            max_record_size,
            buffer: vec![0u8; buffer_size.max(max_record_size)],
            start: 0,
            end: 0,
            file_offset: 0,
            file_len,
            done: false,
        })
    }

    /// Bytes not yet decoded, buffered or still on disk.
    pub fn remaining_bytes(&self) -> u64 {
        (self.end - self.start) as u64 + self.file_len.saturating_sub(self.file_offset)
    }

    fn refill(&mut self) -> Result<()> {
        self.buffer.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;

        while self.end < self.buffer.len() && self.file_offset < self.file_len {
            let n = pread_fd(
                self.file.as_raw_fd(),
                &mut self.buffer[self.end..],
                self.file_offset,
            )
            .map_err(SortError::io("reading input file"))?;
            if n == 0 {
                // Truncated underneath us; stop at what we have.
                self.file_len = self.file_offset;
                break;
            }
            self.end += n;
            self.file_offset += n as u64;
        }
        // The file may have grown since it was opened.
        self.file_len = self.file_len.max(self.file_offset);
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<T>> {
        if self.end - self.start < self.max_record_size && self.file_offset < self.file_len {
            self.refill()?;
        }
        if self.start == self.end {
            return Ok(None);
        }

        let (record, consumed) =
            decode_one(self.serializer.as_ref(), &self.buffer[self.start..self.end])?;
        self.start += consumed;
        Ok(Some(record))
    }
}

impl<T> Iterator for FileSource<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
