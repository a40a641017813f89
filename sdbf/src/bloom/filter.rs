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

use crate::error::{Error, Result};
use crate::tables::{cutoff_at, CUTOFFS_FIRST};

/// Largest accepted filter size in bytes; keeps bit positions within `u32`.
const MAX_FILTER_BYTES: u64 = 1 << 29;

/// Smallest accepted filter size in bytes.
const MIN_FILTER_BYTES: u64 = 64;

/// Filters never fold below this size.
const FOLD_FLOOR_BYTES: usize = 32;

/// Inserts five SHA-1 probe words into a raw filter slice and returns how
/// many probed bits transitioned from 0 to 1.
///
/// The digest builder works on flat chains of filter-sized slices rather than
/// on [`BloomFilter`] values, so this is shared at the slice level.
pub(crate) fn bf_sha1_insert(bf: &mut [u8], bit_mask: u32, words: &[u32; 5]) -> u32 {
    let mut newly_set = 0;
    for &word in words {
        let pos = word & bit_mask;
        let byte = (pos >> 3) as usize;
        let bit = 1u8 << (pos & 0x7);
        if bf[byte] & bit == 0 {
            newly_set += 1;
        }
        bf[byte] |= bit;
    }
    newly_set
}

/// A standalone Bloom filter.
///
/// Used in three roles: as the optional index a digest build accumulates every
/// feature into, as a read-only search index probed during block-mode builds,
/// and as the build-time duplicate-suppression scratch chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
    /// The bit array, `bit_mask + 1` bits long.
    pub(crate) buffer: Vec<u8>,
    /// Popcount of `buffer`; maintained on insert, recomputed after bulk
    /// mutation.
    pub(crate) hamming: u32,
    /// Projects a 32-bit probe word onto a valid bit index.
    pub(crate) bit_mask: u32,
    /// Soft capacity; zero means unbounded.
    pub(crate) max_elem: u64,
    /// Number of probe positions per item.
    pub(crate) hash_count: u16,
    /// Number of distinct items inserted.
    pub(crate) elem_count: u64,
    /// Label carried through serialization.
    pub(crate) name: String,
}

impl BloomFilter {
    /// Creates an empty filter of `size` bytes probed at `hash_count`
    /// positions per item, with a soft capacity of `max_elem` items
    /// (zero for unbounded).
    ///
    /// # Errors
    ///
    /// [`Error::BadBloomSize`] unless `size` is a power of two in
    /// `64..=2^29`.
    pub fn new(size: u64, hash_count: u16, max_elem: u64) -> Result<Self> {
        if !(MIN_FILTER_BYTES..=MAX_FILTER_BYTES).contains(&size) || !size.is_power_of_two() {
            return Err(Error::BadBloomSize(size));
        }
        Ok(BloomFilter {
            buffer: vec![0u8; size as usize],
            hamming: 0,
            bit_mask: (size as u32 * 8) - 1,
            max_elem,
            hash_count,
            elem_count: 0,
            name: String::new(),
        })
    }

    /// Wraps an existing filter-sized byte buffer, deriving the bit mask from
    /// its length. The buffer length must already be a valid filter size.
    pub(crate) fn from_existing_data(data: Vec<u8>, elem_count: u64) -> Self {
        debug_assert!(data.len().is_power_of_two() && data.len() >= FOLD_FLOOR_BYTES);
        let mut bf = BloomFilter {
            bit_mask: (data.len() as u32 * 8) - 1,
            buffer: data,
            hamming: 0,
            max_elem: 0,
            hash_count: 5,
            elem_count,
            name: String::new(),
        };
        bf.compute_hamming();
        bf
    }

    /// Number of distinct items inserted so far.
    pub fn elem_count(&self) -> u64 {
        self.elem_count
    }

    /// Soft capacity of this filter; zero means unbounded.
    pub fn max_elem(&self) -> u64 {
        self.max_elem
    }

    /// Whether the soft capacity has been reached.
    pub fn is_full(&self) -> bool {
        self.max_elem > 0 && self.elem_count >= self.max_elem
    }

    /// Filter size in bytes.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Popcount of the bit array.
    pub fn bits_set(&self) -> u32 {
        self.hamming
    }

    /// Label carried through serialization.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the label carried through serialization.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Inserts an item given as SHA-1 probe words.
    ///
    /// Returns `true` if any probed bit was newly set; `elem_count`
    /// increments exactly in that case. An item whose five probes all land on
    /// set bits reads as already present and is rejected.
    pub fn insert_sha1(&mut self, words: &[u32; 5]) -> bool {
        let mut already_set: u16 = 0;
        for &word in words.iter().take(self.hash_count as usize) {
            let pos = word & self.bit_mask;
            let byte = (pos >> 3) as usize;
            let bit = 1u8 << (pos & 0x7);
            if self.buffer[byte] & bit != 0 {
                already_set += 1;
            } else {
                self.buffer[byte] |= bit;
                self.hamming += 1;
            }
        }
        if already_set < self.hash_count {
            self.elem_count += 1;
            true
        } else {
            false
        }
    }

    /// Tests whether an item was possibly inserted: `true` iff all five
    /// probed bits are set.
    pub fn query_sha1(&self, words: &[u32; 5]) -> bool {
        words.iter().take(self.hash_count as usize).all(|&w| {
            let pos = w & self.bit_mask;
            self.buffer[(pos >> 3) as usize] & (1u8 << (pos & 0x7)) != 0
        })
    }

    /// Compares two same-size filters and returns a 0–100 similarity score,
    /// or `-1` when the sizes differ.
    ///
    /// The score is the bit overlap in excess of the expected overlap of two
    /// random filters at the same density, normalised by the most overlap the
    /// sparser side could produce. Filters holding fewer than 32 items score
    /// zero unconditionally.
    pub fn compare(&self, other: &BloomFilter) -> i32 {
        if self.buffer.len() != other.buffer.len() {
            return -1;
        }
        let dot: u32 = self
            .buffer
            .iter()
            .zip(&other.buffer)
            .map(|(a, b)| (a & b).count_ones())
            .sum();
        let max_est = self.hamming.min(other.hamming);

        if self.elem_count < 32 || other.elem_count < 32 {
            return 0;
        }

        let mn = (16 * self.buffer.len() as u64) / (self.elem_count + other.elem_count);
        let cut = cutoff_at(&CUTOFFS_FIRST, mn.min(u64::from(u32::MAX)) as u32);

        if dot > cut {
            (100.0 * f64::from(dot - cut) / f64::from(max_est - cut)).round() as i32
        } else {
            0
        }
    }

    /// Folds the filter in half `times` times, OR-ing the upper half into the
    /// lower, stopping at 32 bytes. The bit mask tracks the shrinking size,
    /// so items inserted before folding still query as present.
    pub fn fold(&mut self, times: u32) {
        let mut size = self.buffer.len();
        for _ in 0..times {
            if size <= FOLD_FLOOR_BYTES {
                break;
            }
            let half = size / 2;
            let (low, high) = self.buffer.split_at_mut(half);
            for (l, h) in low.iter_mut().zip(&high[..half]) {
                *l |= h;
            }
            size = half;
            if size == FOLD_FLOOR_BYTES {
                break;
            }
        }
        self.buffer.truncate(size);
        self.bit_mask = (size as u32 * 8) - 1;
        self.compute_hamming();
    }

    /// Recomputes the cached popcount after a bulk mutation.
    pub(crate) fn compute_hamming(&mut self) {
        self.hamming = self.buffer.iter().map(|b| b.count_ones()).sum();
    }
}
