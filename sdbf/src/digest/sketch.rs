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

use rand::RngCore;

use crate::bloom::BloomFilter;
use crate::digest::builder::SdbfBuilder;
use crate::digest::score::sdbf_score;
use crate::error::{Error, Result};
use crate::tables::MIN_FILE_SIZE;

/// A similarity digest: a chain of fixed-size Bloom filters accumulated over
/// the popular features of one input.
///
/// Build one with [`SdbfBuilder`] (or the [`from_bytes`](Sdbf::from_bytes) /
/// [`from_file`](Sdbf::from_file) shortcuts), compare two with
/// [`compare`](Sdbf::compare), and move digests across processes through the
/// textual form ([`Display`](std::fmt::Display) /
/// [`FromStr`](std::str::FromStr)).
///
/// A digest is read-only after construction, with one exception:
/// [`fast`](Sdbf::fast) destructively folds every filter to a quarter size
/// for cheaper, lossier comparison.
#[derive(Debug, Clone)]
pub struct Sdbf {
    /// Name of the input, usually a file path.
    pub(crate) hash_name: String,
    /// Number of filters in the chain.
    pub(crate) bf_count: u32,
    /// Size of one filter in bytes.
    pub(crate) bf_size: u32,
    /// Probe positions per inserted feature.
    pub(crate) hash_count: u16,
    /// Bit mask projecting a probe word onto a filter.
    pub(crate) mask: u32,
    /// Per-filter soft capacity.
    pub(crate) max_elem: u32,
    /// Population of the last filter in stream mode; every earlier filter is
    /// implicitly full.
    pub(crate) last_count: u32,
    /// The filter chain, `bf_count * bf_size` bytes.
    pub(crate) buffer: Vec<u8>,
    /// Per-filter popcount.
    pub(crate) hamming: Vec<u16>,
    /// Per-filter population in block mode; empty in stream mode.
    pub(crate) elem_counts: Vec<u16>,
    /// Input block size in block mode; zero in stream mode.
    pub(crate) dd_block_size: u32,
    /// Size of the digested input in bytes.
    pub(crate) orig_file_size: u64,
    /// Whether the filters were folded by [`fast`](Sdbf::fast).
    pub(crate) fast_mode: bool,
    /// The index filter the build accumulated into, if one was attached.
    pub(crate) index: Option<BloomFilter>,
    /// Per-search-index, per-block match counters from build time.
    pub(crate) search_results: Vec<Vec<u32>>,
}

impl Sdbf {
    /// Starts building a digest for an input labelled `name`.
    pub fn builder(name: impl Into<String>) -> SdbfBuilder<'static> {
        SdbfBuilder::new(name)
    }

    /// Digests a byte buffer in stream mode under the given label.
    ///
    /// # Errors
    ///
    /// [`Error::InputTooSmall`] for buffers under 512 bytes.
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Sdbf> {
        SdbfBuilder::new(name).build(data)
    }

    /// Digests a regular file in stream mode, labelled with its path.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the path is unreadable or not a regular file,
    /// [`Error::InputTooSmall`] when the file is under 512 bytes.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Sdbf> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }
        if meta.len() < MIN_FILE_SIZE as u64 {
            return Err(Error::InputTooSmall {
                size: meta.len(),
                min: MIN_FILE_SIZE as u64,
            });
        }
        let data = std::fs::read(path)?;
        Sdbf::from_bytes(path.to_string_lossy(), &data)
    }

    /// Label of the digested input.
    pub fn name(&self) -> &str {
        &self.hash_name
    }

    /// Size of the digest's filter data in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.bf_size) * u64::from(self.bf_count)
    }

    /// Size of the input the digest was built from.
    pub fn input_size(&self) -> u64 {
        self.orig_file_size
    }

    /// Number of filters in the chain.
    pub fn filter_count(&self) -> u32 {
        self.bf_count
    }

    /// Input block size for block-mode digests, zero for stream digests.
    pub fn block_size(&self) -> u32 {
        self.dd_block_size
    }

    /// Number of features held by filter `index`. In stream mode every filter
    /// except the last is full by construction.
    pub fn filter_elem_count(&self, index: u32) -> u32 {
        if self.elem_counts.is_empty() {
            if index < self.bf_count - 1 {
                self.max_elem
            } else {
                self.last_count
            }
        } else {
            u32::from(self.elem_counts[index as usize])
        }
    }

    /// The index filter the build accumulated every feature into, if the
    /// builder was given one. Parsed digests never carry an index.
    pub fn index(&self) -> Option<&BloomFilter> {
        self.index.as_ref()
    }

    /// Detaches and returns the index filter.
    pub fn take_index(&mut self) -> Option<BloomFilter> {
        self.index.take()
    }

    /// Build-time search-index hits: one row per search index, one counter
    /// per block. Empty unless the builder was given search indexes.
    pub fn search_results(&self) -> &[Vec<u32>] {
        &self.search_results
    }

    /// Compares two digests and returns a similarity score in `0..=100`, or
    /// `-1` when no filter pair was comparable.
    pub fn compare(&self, other: &Sdbf) -> i32 {
        self.compare_sample(other, 0)
    }

    /// Like [`compare`](Sdbf::compare), but looks at no more than `sample`
    /// filters of the shorter side (zero disables sampling). Sampled filter
    /// choice comes from the thread-local generator; use
    /// [`compare_sample_with`](Sdbf::compare_sample_with) for reproducible
    /// sampling.
    pub fn compare_sample(&self, other: &Sdbf, sample: u32) -> i32 {
        self.compare_sample_with(other, sample, &mut rand::thread_rng())
    }

    /// Sampling comparison with an explicit random source.
    pub fn compare_sample_with<R: RngCore>(&self, other: &Sdbf, sample: u32, rng: &mut R) -> i32 {
        sdbf_score(self, other, sample, rng)
    }

    /// Folds every filter twice (256 to 64 bytes), recomputing per-filter
    /// popcounts. Comparisons afterwards use the folded cutoff table; the
    /// precision loss is the price of a 4x smaller digest. Irreversible.
    pub fn fast(&mut self) {
        if self.fast_mode {
            return;
        }
        let bf_size = self.bf_size as usize;
        let mut folded: Vec<u8> = Vec::with_capacity(self.buffer.len() / 4);
        for i in 0..self.bf_count as usize {
            let data = self.buffer[i * bf_size..(i + 1) * bf_size].to_vec();
            let mut tmp = BloomFilter::from_existing_data(data, 0);
            tmp.fold(2);
            self.hamming[i] = tmp.bits_set() as u16;
            folded.extend_from_slice(&tmp.buffer);
        }
        self.buffer = folded;
        self.bf_size = (bf_size / 4) as u32;
        self.mask = self.bf_size * 8 - 1;
        self.fast_mode = true;
    }

    /// Whether [`fast`](Sdbf::fast) folded this digest.
    pub fn is_fast(&self) -> bool {
        self.fast_mode
    }

    /// Filter `index` as a byte slice.
    pub(crate) fn filter(&self, index: u32) -> &[u8] {
        let bf_size = self.bf_size as usize;
        &self.buffer[index as usize * bf_size..(index as usize + 1) * bf_size]
    }

    /// Recomputes the per-filter popcounts from the buffer.
    pub(crate) fn compute_hamming(&mut self) {
        let bf_size = self.bf_size as usize;
        self.hamming = self
            .buffer
            .chunks_exact(bf_size)
            .map(|bf| bf.iter().map(|b| b.count_ones()).sum::<u32>() as u16)
            .collect();
    }
}
