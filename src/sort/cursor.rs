use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::Comparator;
use crate::diskio::mapping::MappedView;
use crate::error::Result;
use crate::serializer::{Serializer, decode_one};

/// One-record-lookahead reader over a mapped chunk.
///
/// The head record is decoded on first access and cached until
/// [`ChunkCursor::next_record`] hands it out. `order` breaks ties between
/// cursors whose heads compare equal: the lower index wins.
pub struct ChunkCursor<T> {
    view: MappedView,
    serializer: Arc<dyn Serializer<T>>,
    comparator: Comparator<T>,
    order: usize,
    pos: usize,
    head: Option<T>,
    head_start: usize,
}

impl<T> ChunkCursor<T> {
    pub fn new(
        view: MappedView,
        serializer: Arc<dyn Serializer<T>>,
        comparator: Comparator<T>,
        order: usize,
    ) -> Self {
        Self {
            view,
            serializer,
            comparator,
            order,
            pos: 0,
            head: None,
            head_start: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.head.is_some() || self.pos < self.view.len()
    }

    /// The next record without consuming it, decoding it if needed.
    pub fn current(&mut self) -> Result<Option<&T>> {
        if self.head.is_none() && self.pos < self.view.len() {
            let (record, consumed) =
                decode_one(self.serializer.as_ref(), &self.view.bytes()[self.pos..])?;
            self.head_start = self.pos;
            self.pos += consumed;
            self.head = Some(record);
        }
        Ok(self.head.as_ref())
    }

    /// Head record if it has already been decoded.
    pub fn peek(&self) -> Option<&T> {
        self.head.as_ref()
    }

    pub fn next_record(&mut self) -> Result<Option<T>> {
        self.current()?;
        Ok(self.head.take())
    }

    /// Encoded bytes of the cached head record.
    pub fn current_bytes(&self) -> &[u8] {
        if self.head.is_some() {
            &self.view.bytes()[self.head_start..self.pos]
        } else {
            &[]
        }
    }

    /// Drop the cached head without returning it.
    pub fn skip(&mut self) {
        self.head = None;
    }

    /// Heap order of two primed cursors: head record, then creation order.
    pub fn cmp_heads(&self, other: &Self) -> Ordering {
        let by_head = match (self.peek(), other.peek()) {
            (Some(a), Some(b)) => (self.comparator)(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_head.then_with(|| self.order.cmp(&other.order))
    }

    /// Release this cursor's reference to the mapping.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diskio::mapping::SharedMapping;
    use crate::diskio::spill_file::SpillFile;
    use crate::serializer::DecodeError;
    use crate::sort::chunk::Chunk;
    use bytes::{Buf, BufMut, BytesMut};

    struct U16Serializer;

    impl Serializer<u16> for U16Serializer {
        fn write(&self, record: &u16, buf: &mut BytesMut) {
            buf.put_u16(*record);
        }

        fn read(&self, buf: &mut &[u8]) -> std::result::Result<u16, DecodeError> {
            Ok(buf.try_get_u16()?)
        }
    }

    fn mapped(values: &[u16]) -> (tempfile::TempDir, SpillFile, SharedMapping) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(Some(dir.path())).unwrap();
        let mut buf = BytesMut::new();
        for v in values {
            U16Serializer.write(v, &mut buf);
        }
        file.append(&buf).unwrap();
        let mapping = SharedMapping::map(&file).unwrap();
        (dir, file, mapping)
    }

    fn cursor(mapping: &SharedMapping, chunk: Chunk, order: usize) -> ChunkCursor<u16> {
        ChunkCursor::new(
            mapping.view(&chunk).unwrap(),
            Arc::new(U16Serializer),
            Arc::new(u16::cmp),
            order,
        )
    }

    #[test]
    fn test_current_is_cached_until_next() {
        let (_dir, _file, mapping) = mapped(&[7, 9]);
        let mut c = cursor(&mapping, Chunk::new(0, 4), 0);
        assert!(c.peek().is_none());
        assert_eq!(c.current().unwrap(), Some(&7));
        assert_eq!(c.current().unwrap(), Some(&7));
        assert_eq!(c.current_bytes(), &[0, 7]);
        assert_eq!(c.next_record().unwrap(), Some(7));
        assert!(c.has_next());
        assert_eq!(c.next_record().unwrap(), Some(9));
        assert!(!c.has_next());
        assert_eq!(c.next_record().unwrap(), None);
    }

    #[test]
    fn test_view_stops_at_chunk_end() {
        let (_dir, _file, mapping) = mapped(&[1, 2, 3, 4]);
        let mut c = cursor(&mapping, Chunk::new(2, 4), 0);
        assert_eq!(c.next_record().unwrap(), Some(2));
        assert_eq!(c.next_record().unwrap(), Some(3));
        assert!(!c.has_next());
    }

    #[test]
    fn test_truncated_chunk_is_a_decode_error() {
        let (_dir, _file, mapping) = mapped(&[1, 2]);
        let mut c = cursor(&mapping, Chunk::new(0, 3), 0);
        assert_eq!(c.next_record().unwrap(), Some(1));
        let err = c.next_record().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }

    #[test]
    fn test_ties_break_on_order() {
        let (_dir, _file, mapping) = mapped(&[5, 5]);
        let mut low = cursor(&mapping, Chunk::new(0, 2), 0);
        let mut high = cursor(&mapping, Chunk::new(2, 2), 1);
        low.current().unwrap();
        high.current().unwrap();
        assert_eq!(low.cmp_heads(&high), Ordering::Less);
        assert_eq!(high.cmp_heads(&low), Ordering::Greater);
    }

    #[test]
    fn test_close_releases_mapping_reference() {
        let (_dir, _file, mapping) = mapped(&[1]);
        let c = cursor(&mapping, Chunk::new(0, 2), 0);
        assert_eq!(mapping.ref_count(), 2);
        c.close();
        assert_eq!(mapping.ref_count(), 1);
    }
}
