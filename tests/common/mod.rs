#![allow(dead_code)]

use std::cmp::Ordering;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use extsort_collect::{
    ConfigurationBuilder, DecodeError, ExternalSort, Serializer, ensure_remaining,
};

/// Test record. `key` drives the order; `id` tells equal keys apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    pub id: u32,
    pub key: u32,
    pub payload: String,
}

impl Data {
    pub fn new(id: u32, key: u32) -> Self {
        Self {
            id,
            key,
            payload: (key * 17).to_string().repeat((id % 4 + 1) as usize),
        }
    }
}

pub fn by_key(a: &Data, b: &Data) -> Ordering {
    a.key.cmp(&b.key)
}

/// id, key, payload length, payload digits
pub struct DataSerializer;

pub const MAX_RECORD_SIZE: usize = 128;

impl Serializer<Data> for DataSerializer {
    fn write(&self, record: &Data, buf: &mut BytesMut) {
        buf.put_u32(record.id);
        buf.put_u32(record.key);
        buf.put_u16(record.payload.len() as u16);
        buf.put_slice(record.payload.as_bytes());
    }

    fn read(&self, buf: &mut &[u8]) -> Result<Data, DecodeError> {
        let id = buf.try_get_u32()?;
        let key = buf.try_get_u32()?;
        let len = buf.try_get_u16()? as usize;
        if len == 0 {
            return Err(DecodeError::new("empty payload"));
        }
        let bytes: &[u8] = *buf;
        ensure_remaining(bytes, len)?;
        let (payload, rest) = bytes.split_at(len);
        if !payload.iter().all(u8::is_ascii_digit) {
            return Err(DecodeError::new("payload is not decimal"));
        }
        *buf = rest;
        Ok(Data {
            id,
            key,
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

pub fn builder(dir: &Path) -> ConfigurationBuilder<Data> {
    ConfigurationBuilder::new(DataSerializer, by_key)
        .max_record_size(MAX_RECORD_SIZE)
        .write_buffer_size(4 * MAX_RECORD_SIZE)
        .temp_dir(dir)
}

pub fn sorter(dir: &Path, max_items: usize) -> ExternalSort<Data> {
    ExternalSort::new(builder(dir).internal_sort_max_items(max_items).build().unwrap())
}

/// Records with pseudo-random keys in `0..key_range`, ids in input order.
pub fn records(n: u32, key_range: u32) -> Vec<Data> {
    let mut state = 0x2545_f491u32;
    (0..n)
        .map(|id| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Data::new(id, state % key_range)
        })
        .collect()
}

/// Stable reference sort.
pub fn expected(records: &[Data]) -> Vec<Data> {
    let mut sorted = records.to_vec();
    sorted.sort_by(by_key);
    sorted
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub fn collect(iter: extsort_collect::SortedIter<Data>) -> Vec<Data> {
    iter.map(|r| r.unwrap()).collect()
}
