// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Standalone Bloom filter lifecycle: population, folding, file and text
//! round-trips, and comparison behaviour of index-size filters.

use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use sha1::{Digest, Sha1};

use sdbf::{BloomFilter, Error, Sdbf};

/// SHA-1 probe words for an arbitrary item, little-endian like the engine's
/// feature hasher.
fn probe(item: u64) -> [u32; 5] {
    let digest = Sha1::digest(item.to_le_bytes());
    let mut words = [0u32; 5];
    for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(4)) {
        *word = u32::from_le_bytes(chunk.try_into().unwrap());
    }
    words
}

fn populated(size: u64, items: u64) -> BloomFilter {
    let mut bf = BloomFilter::new(size, 5, 0).unwrap();
    for n in 0..items {
        bf.insert_sha1(&probe(n));
    }
    bf
}

#[test]
fn file_round_trip_preserves_the_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filter.idx");

    let mut bf = populated(64 * 1024, 5000);
    bf.set_name("round-trip");
    bf.write_to_file(&path).unwrap();

    let restored = BloomFilter::read_from_file(&path).unwrap();
    assert_eq!(restored.name(), "round-trip");
    assert_eq!(restored.elem_count(), bf.elem_count());
    assert_eq!(restored.size(), bf.size());
    assert_eq!(restored.bits_set(), bf.bits_set());
    // The text form serializes every carried field, so equality there means
    // the buffers and masks survived byte for byte.
    assert_eq!(restored.to_string(), bf.to_string());

    for n in 0..5000 {
        assert!(restored.query_sha1(&probe(n)));
    }
}

#[test]
fn text_round_trip_preserves_the_filter() {
    let mut bf = populated(1024, 300);
    bf.set_name("text");
    let restored: BloomFilter = bf.to_string().parse().unwrap();
    assert_eq!(restored.to_string(), bf.to_string());
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.idx");

    let bf = populated(1024, 300);
    bf.write_to_file(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();

    assert!(matches!(
        BloomFilter::read_from_file(&path),
        Err(Error::MalformedDigest(_))
    ));
}

#[test]
fn foreign_file_is_not_an_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign");
    std::fs::write(&path, "certainly:not:a:filter\npayload").unwrap();
    assert!(matches!(
        BloomFilter::read_from_file(&path),
        Err(Error::UnknownMagic(_))
    ));
}

#[test]
fn fold_keeps_every_inserted_item_queryable() {
    let mut bf = populated(4096, 800);
    bf.fold(1);
    assert_eq!(bf.size(), 2048);
    for n in 0..800 {
        assert!(bf.query_sha1(&probe(n)), "item {n} lost by folding");
    }
}

#[test]
fn fold_never_goes_below_the_floor() {
    let mut bf = populated(64, 10);
    bf.fold(8);
    assert_eq!(bf.size(), 32);
    for n in 0..10 {
        assert!(bf.query_sha1(&probe(n)));
    }
}

#[test]
fn self_comparison_of_a_populated_index_is_exact() {
    let bf = populated(64 * 1024, 10_000);
    assert_eq!(bf.compare(&bf.clone()), 100);
}

#[test]
fn sparse_filters_compare_to_zero() {
    let bf = populated(64 * 1024, 31);
    assert_eq!(bf.compare(&bf.clone()), 0);
}

#[test]
fn differently_sized_filters_are_incomparable() {
    let a = populated(1024, 100);
    let b = populated(2048, 100);
    assert_eq!(a.compare(&b), -1);
    assert_eq!(b.compare(&a), -1);
}

#[test]
fn unrelated_indexes_overlap_only_at_noise_level() {
    let mut a = BloomFilter::new(64 * 1024, 5, 0).unwrap();
    let mut b = BloomFilter::new(64 * 1024, 5, 0).unwrap();
    for n in 0..10_000 {
        a.insert_sha1(&probe(n));
        b.insert_sha1(&probe(n + 1_000_000));
    }
    let score = a.compare(&b);
    assert_that!(score, ge(0));
    assert_that!(score, le(10));
}

#[test]
fn digest_index_survives_its_own_serialization() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digest.idx");

    let data: Vec<u8> = {
        let mut state = 1u64;
        (0..32 * 1024)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) % 47) as u8
            })
            .collect()
    };
    let index = BloomFilter::new(1 << 20, 5, 0).unwrap();
    let mut digest = Sdbf::builder("input")
        .initial_index(index)
        .build(&data)
        .unwrap();
    let index = digest.take_index().unwrap();
    assert!(index.elem_count() > 0);

    index.write_to_file(&path).unwrap();
    let restored = BloomFilter::read_from_file(&path).unwrap();
    assert_eq!(restored.to_string(), index.to_string());
    assert_eq!(restored.elem_count(), index.elem_count());
}
