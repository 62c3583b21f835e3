use std::io::Write;

use bytes::{BufMut, BytesMut};
use extsort_collect::{ConfigurationBuilder, ErrorKind, Serializer, SortError};

mod common;
use common::{Data, DataSerializer, builder, collect, expected, files_in, records, sorter};

#[test]
fn test_basic_functionality() {
    let dir = tempfile::tempdir().unwrap();
    let input = vec![Data::new(0, 26), Data::new(1, 1), Data::new(2, 13)];
    let out = collect(sorter(dir.path(), 100).sort(input).unwrap());
    let keys: Vec<u32> = out.iter().map(|d| d.key).collect();
    assert_eq!(keys, vec![1, 13, 26]);
}

#[test]
fn test_empty_input_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut iter = sorter(dir.path(), 4).sort(Vec::<Data>::new()).unwrap();
    assert_eq!(iter.len_hint(), 0);
    assert!(!iter.is_external());
    assert!(iter.next().is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn test_single_record_never_spills() {
    let dir = tempfile::tempdir().unwrap();
    let sorter = sorter(dir.path(), 1_000);
    let mut acc = sorter.accumulator();
    acc.add(Data::new(1, 5)).unwrap();
    assert_eq!(acc.chunk_count(), 0);
    assert_eq!(acc.spill_bytes(), 0);
    let iter = acc.finish().unwrap();
    assert!(!iter.is_external());
    assert_eq!(collect(iter), vec![Data::new(1, 5)]);
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn test_exactly_max_items_spills_once() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(64, 10);
    let sorter = sorter(dir.path(), 64);
    let mut acc = sorter.accumulator();
    for record in input.iter().cloned() {
        acc.add(record).unwrap();
    }
    assert_eq!(acc.chunk_count(), 1);

    let iter = acc.finish().unwrap();
    assert!(iter.is_external());
    assert_eq!(collect(iter), expected(&input));
}

#[test]
fn test_duplicate_keys_keep_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<Data> = [5, 3, 5, 1, 4, 2]
        .iter()
        .enumerate()
        .map(|(id, key)| Data::new(id as u32, *key))
        .collect();

    let sorter = sorter(dir.path(), 2);
    let mut acc = sorter.accumulator();
    for record in input.iter().cloned() {
        acc.add(record).unwrap();
    }
    assert!((2..=3).contains(&acc.chunk_count()));

    let out = collect(acc.finish().unwrap());
    let keys: Vec<u32> = out.iter().map(|d| d.key).collect();
    assert_eq!(keys, vec![1, 2, 3, 4, 5, 5]);
    assert_eq!(out[4].id, 0);
    assert_eq!(out[5].id, 2);
}

#[test]
fn test_spill_matches_in_memory_including_ties() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(5_000, 50);

    let in_memory = sorter(dir.path(), 10_000).sort(input.clone()).unwrap();
    assert!(!in_memory.is_external());
    let in_memory = collect(in_memory);

    let spilled = sorter(dir.path(), 97).sort(input.clone()).unwrap();
    assert!(spilled.is_external());
    let spilled = collect(spilled);

    assert_eq!(spilled, in_memory);
    assert_eq!(spilled, expected(&input));
}

#[test]
fn test_compaction_is_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(3_000, 40);

    let unlimited = collect(sorter(dir.path(), 50).sort(input.clone()).unwrap());
    for max_chunks in [2, 3, 7] {
        let sorter = extsort_collect::ExternalSort::new(
            builder(dir.path())
                .internal_sort_max_items(50)
                .max_number_of_chunks(max_chunks)
                .build()
                .unwrap(),
        );
        let compacted = collect(sorter.sort(input.clone()).unwrap());
        assert_eq!(compacted, unlimited, "max_number_of_chunks = {}", max_chunks);
    }
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn test_write_buffer_of_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let sorter = extsort_collect::ExternalSort::new(
        builder(dir.path())
            .write_buffer_size(common::MAX_RECORD_SIZE)
            .internal_sort_max_items(33)
            .build()
            .unwrap(),
    );
    let input = records(500, 1_000);
    assert_eq!(collect(sorter.sort(input.clone()).unwrap()), expected(&input));
}

#[test]
fn test_parallel_buffer_sort_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let sorter = extsort_collect::ExternalSort::new(
        builder(dir.path())
            .internal_sort_max_items(20_000)
            .parallel_sort(true)
            .build()
            .unwrap(),
    );
    let input = records(50_000, 100);
    assert_eq!(collect(sorter.sort(input.clone()).unwrap()), expected(&input));
}

#[test]
fn test_sort_file_and_stream_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(1_000, 200);
    let mut buf = BytesMut::new();
    for record in &input {
        DataSerializer.write(record, &mut buf);
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&buf).unwrap();
    file.flush().unwrap();

    let sorter = sorter(dir.path(), 128);
    let streamed: Vec<Data> = sorter
        .stream_file(file.path())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(streamed, input);
    assert_eq!(collect(sorter.sort_file(file.path()).unwrap()), expected(&input));
}

#[test]
fn test_corrupt_input_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut buf = BytesMut::new();
    DataSerializer.write(&Data::new(1, 1), &mut buf);
    // Header claiming a payload of length zero.
    buf.put_u32(2);
    buf.put_u32(2);
    buf.put_u16(0);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&buf).unwrap();
    file.flush().unwrap();

    let err = sorter(dir.path(), 16).sort_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let err = builder(dir.path())
        .max_record_size(1024)
        .write_buffer_size(512)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(matches!(
        err,
        SortError::Config {
            parameter: "max_record_size",
            ..
        }
    ));

    assert!(builder(dir.path()).internal_sort_max_items(0).build().is_err());
    assert!(builder(dir.path()).max_number_of_chunks(1).build().is_err());
    assert!(
        ConfigurationBuilder::new(DataSerializer, common::by_key)
            .max_record_size(0)
            .build()
            .is_err()
    );
}
