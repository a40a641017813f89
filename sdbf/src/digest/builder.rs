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

use std::sync::Mutex;

use crate::bloom::BloomFilter;
use crate::digest::generate::{gen_block_sdbf, gen_chunk_sdbf};
use crate::digest::sketch::Sdbf;
use crate::error::{Error, Result};
use crate::tables::{
    BF_MASK, BF_SIZE, HASH_COUNT, MAX_ELEM, MAX_ELEM_DD, MIN_FILE_SIZE, STREAM_CHUNK_SIZE,
};

/// Builder for [`Sdbf`] digests.
///
/// ```
/// use sdbf::SdbfBuilder;
///
/// let data = vec![0x5au8; 4096];
/// let digest = SdbfBuilder::new("zeroes.bin").build(&data)?;
/// assert_eq!(digest.name(), "zeroes.bin");
///
/// let per_block = SdbfBuilder::new("zeroes.bin")
///     .block_size(1024)
///     .build(&data)?;
/// assert_eq!(per_block.filter_count(), 4);
/// # Ok::<(), sdbf::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct SdbfBuilder<'a> {
    name: String,
    dd_block_size: u32,
    initial_index: Option<BloomFilter>,
    search_indexes: &'a [BloomFilter],
}

impl<'a> SdbfBuilder<'a> {
    /// Starts a builder for an input labelled `name`.
    pub fn new(name: impl Into<String>) -> SdbfBuilder<'static> {
        SdbfBuilder {
            name: name.into(),
            dd_block_size: 0,
            initial_index: None,
            search_indexes: &[],
        }
    }

    /// Selects block mode with the given block size in bytes; zero selects
    /// stream mode (the default).
    pub fn block_size(mut self, bytes: u32) -> Self {
        self.dd_block_size = bytes;
        self
    }

    /// Attaches an index filter that additionally absorbs every feature the
    /// build inserts. The filter is returned on the finished digest via
    /// [`Sdbf::index`].
    pub fn initial_index(mut self, index: BloomFilter) -> Self {
        self.initial_index = Some(index);
        self
    }

    /// Supplies read-only index filters to probe during a block-mode build.
    /// Per-block hit counts land in [`Sdbf::search_results`].
    pub fn search_indexes(self, indexes: &[BloomFilter]) -> SdbfBuilder<'_> {
        SdbfBuilder {
            name: self.name,
            dd_block_size: self.dd_block_size,
            initial_index: self.initial_index,
            search_indexes: indexes,
        }
    }

    /// Digests `data` and returns the finished digest.
    ///
    /// # Errors
    ///
    /// [`Error::InputTooSmall`] for inputs under 512 bytes.
    pub fn build(self, data: &[u8]) -> Result<Sdbf> {
        if data.len() < MIN_FILE_SIZE {
            return Err(Error::InputTooSmall {
                size: data.len() as u64,
                min: MIN_FILE_SIZE as u64,
            });
        }

        let mut sdbf = Sdbf {
            hash_name: self.name,
            bf_count: 1,
            bf_size: BF_SIZE as u32,
            hash_count: HASH_COUNT,
            mask: BF_MASK,
            max_elem: 0,
            last_count: 0,
            buffer: Vec::new(),
            hamming: Vec::new(),
            elem_counts: Vec::new(),
            dd_block_size: 0,
            orig_file_size: data.len() as u64,
            fast_mode: false,
            index: None,
            search_results: Vec::new(),
        };
        let index = self.initial_index.map(Mutex::new);

        if self.dd_block_size == 0 {
            sdbf.max_elem = MAX_ELEM;
            gen_chunk_sdbf(&mut sdbf, data, STREAM_CHUNK_SIZE, index.as_ref());
        } else {
            let block_size = self.dd_block_size as usize;
            let mut block_count = data.len() / block_size;
            if data.len() % block_size >= MIN_FILE_SIZE {
                block_count += 1;
            }
            sdbf.max_elem = MAX_ELEM_DD;
            sdbf.bf_count = block_count as u32;
            sdbf.dd_block_size = self.dd_block_size;
            sdbf.buffer = vec![0u8; block_count * BF_SIZE];
            sdbf.elem_counts = vec![0u16; block_count];
            gen_block_sdbf(&mut sdbf, data, block_size, index.as_ref(), self.search_indexes);
        }

        sdbf.compute_hamming();
        sdbf.index = index.map(|m| {
            m.into_inner()
                .expect("index filter poisoned by a failed block task")
        });
        Ok(sdbf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Text-like bytes: pseudo-random over a 47-symbol alphabet, so windows
    /// rank mid-entropy and yield features.
    fn textlike(seed: u32, len: usize) -> Vec<u8> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1103515245).wrapping_add(12345);
                ((x >> 16) % 47) as u8
            })
            .collect()
    }

    #[test]
    fn rejects_undersized_input() {
        let err = SdbfBuilder::new("tiny").build(&[0u8; 256]).unwrap_err();
        assert!(matches!(
            err,
            Error::InputTooSmall { size: 256, min: 512 }
        ));
    }

    #[test]
    fn boundary_input_is_accepted() {
        let data: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();
        let sd = SdbfBuilder::new("edge").build(&data).unwrap();
        assert_eq!(sd.filter_count(), 1);
        assert_eq!(sd.input_size(), 512);
    }

    #[test]
    fn short_block_tail_is_discarded() {
        let data = vec![0xabu8; 16 * 1024 + 31];
        let sd = SdbfBuilder::new("tail")
            .block_size(1024)
            .build(&data)
            .unwrap();
        assert_eq!(sd.filter_count(), 16);
    }

    #[test]
    fn long_block_tail_gets_a_filter() {
        let data = vec![0xcdu8; 2048 + 600];
        let sd = SdbfBuilder::new("tail")
            .block_size(1024)
            .build(&data)
            .unwrap();
        assert_eq!(sd.filter_count(), 3);
    }

    #[test]
    fn index_absorbs_features() {
        let data = textlike(77, 32 * 1024);
        let index = BloomFilter::new(1 << 20, 5, 0).unwrap();
        let mut sd = SdbfBuilder::new("indexed")
            .initial_index(index)
            .build(&data)
            .unwrap();
        let index = sd.take_index().expect("index was attached");
        assert!(index.elem_count() > 0);
        assert!(sd.index().is_none());
    }

    #[test]
    fn search_results_dimensions() {
        let data = textlike(88, 8 * 1024);
        let haystack = {
            let index = BloomFilter::new(1 << 20, 5, 0).unwrap();
            let mut sd = SdbfBuilder::new("haystack")
                .initial_index(index)
                .build(&data)
                .unwrap();
            sd.take_index().unwrap()
        };
        let other = BloomFilter::new(1 << 20, 5, 0).unwrap();
        let searches = vec![haystack, other];

        let sd = SdbfBuilder::new("query")
            .block_size(1024)
            .search_indexes(&searches)
            .build(&data)
            .unwrap();
        assert_eq!(sd.search_results().len(), 2);
        for row in sd.search_results() {
            assert_eq!(row.len(), sd.filter_count() as usize);
        }
        // The index built from the same data must out-hit the empty one.
        let same: u32 = sd.search_results()[0].iter().sum();
        let empty: u32 = sd.search_results()[1].iter().sum();
        assert!(same >= empty);
    }
}
