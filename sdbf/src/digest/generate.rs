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

//! Digest generation: selects popular windows and accumulates their SHA-1
//! hashes into the filter chain.
//!
//! Stream mode walks the input in 32 MiB chunks, filling one filter after
//! another and advancing whenever the current filter reaches capacity. Block
//! mode gives every input block its own filter and runs blocks in parallel;
//! block tasks write disjoint filter slices and element-count slots, so the
//! only shared mutable state is the optional index filter behind its mutex.

use std::sync::Mutex;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::bloom::{bf_sha1_insert, BloomFilter};
use crate::digest::entropy::gen_chunk_ranks;
use crate::digest::popularity::gen_chunk_scores;
use crate::digest::sketch::Sdbf;
use crate::hash::sha1_words;
use crate::tables::{
    BF_MASK, BF_SIZE, BIG_FILTER, BIG_FILTER_ELEM, MAX_ELEM_DD, POP_WIN_SIZE, SCORE_HISTO_BINS,
    THRESHOLD,
};

/// Build-time duplicate suppression for stream mode: a large scratch filter
/// that rejects features whose probes are all already set, replaced by a
/// fresh one when its capacity is reached. Never persisted.
struct BigFilterGate {
    current: BloomFilter,
}

impl BigFilterGate {
    fn new() -> Self {
        BigFilterGate {
            current: fresh_big_filter(),
        }
    }

    fn insert(&mut self, words: &[u32; 5]) -> bool {
        if !self.current.insert_sha1(words) {
            return false;
        }
        if self.current.is_full() {
            self.current = fresh_big_filter();
        }
        true
    }
}

fn fresh_big_filter() -> BloomFilter {
    BloomFilter::new(BIG_FILTER as u64, 5, BIG_FILTER_ELEM)
        .expect("BIG_FILTER is a valid filter size")
}

/// Scans the score histogram downward and returns the chunk's selection
/// threshold together with the budget of ties admissible at exactly that
/// threshold, such that the selected feature count stays within `max_elem`.
fn calibrate_threshold(histo: &[u32; SCORE_HISTO_BINS], max_elem: u32) -> (u32, i32) {
    let mut sum = 0u32;
    let mut k = (SCORE_HISTO_BINS - 1) as u32;
    loop {
        if sum <= max_elem && sum + histo[k as usize] > max_elem {
            break;
        }
        sum += histo[k as usize];
        if k <= THRESHOLD {
            break;
        }
        k -= 1;
    }
    (k, max_elem.saturating_sub(sum) as i32)
}

fn lock_index(index: &Mutex<BloomFilter>) -> std::sync::MutexGuard<'_, BloomFilter> {
    index
        .lock()
        .expect("index filter poisoned by a failed block task")
}

/// Hashes the selected features of one stream chunk into the filter chain,
/// advancing to the next filter whenever the current one fills up.
#[allow(clippy::too_many_arguments)]
fn gen_chunk_hash(
    sdbf: &mut Sdbf,
    data: &[u8],
    chunk_pos: usize,
    scores: &[u16],
    chunk_size: usize,
    threshold: u32,
    mut allowed: i32,
    index: Option<&Mutex<BloomFilter>>,
    gate: &mut BigFilterGate,
) {
    if chunk_size <= POP_WIN_SIZE {
        return;
    }
    let bf_size = sdbf.bf_size as usize;
    let mut bf_count = sdbf.bf_count;
    let mut last_count = sdbf.last_count;
    let mut bf_base = (bf_count as usize - 1) * bf_size;

    for i in 0..chunk_size - POP_WIN_SIZE {
        let score = u32::from(scores[i]);
        if score < threshold || (score == threshold && allowed <= 0) {
            continue;
        }
        let start = chunk_pos + i;
        let words = sha1_words(&data[start..start + POP_WIN_SIZE]);
        if bf_base + bf_size > sdbf.buffer.len() {
            sdbf.buffer.resize(bf_base + bf_size, 0);
        }
        let newly_set = bf_sha1_insert(&mut sdbf.buffer[bf_base..bf_base + bf_size], BF_MASK, &words);
        // All five probes already set: likely a repeated feature.
        if newly_set == 0 {
            continue;
        }
        if let Some(index) = index {
            if !lock_index(index).insert_sha1(&words) {
                continue;
            }
        }
        if !gate.insert(&words) {
            continue;
        }
        if score == threshold {
            allowed -= 1;
        }
        last_count += 1;
        if last_count == sdbf.max_elem {
            bf_base += bf_size;
            bf_count += 1;
            last_count = 0;
        }
    }

    sdbf.bf_count = bf_count;
    sdbf.last_count = last_count;
}

/// Stream-mode generation over the whole input.
pub(crate) fn gen_chunk_sdbf(
    sdbf: &mut Sdbf,
    data: &[u8],
    chunk_size: usize,
    index: Option<&Mutex<BloomFilter>>,
) {
    debug_assert!(chunk_size > POP_WIN_SIZE);
    let file_size = data.len();
    // Generous estimate, trimmed once the chain is complete.
    let buff_size = ((((file_size as u64) >> 11) + 1) << 8).max(BF_SIZE as u64) as usize;
    sdbf.buffer = vec![0u8; buff_size];

    let mut gate = BigFilterGate::new();
    let qt = file_size / chunk_size;
    let rem = file_size % chunk_size;
    let scratch = chunk_size.min(file_size);
    let mut chunk_ranks = vec![0u16; scratch];
    let mut chunk_scores = vec![0u16; scratch];

    let mut chunk_pos = 0usize;
    for chunk_index in 0..qt {
        let chunk = &data[chunk_pos..chunk_pos + chunk_size];
        gen_chunk_ranks(chunk, &mut chunk_ranks);
        let mut histo = [0u32; SCORE_HISTO_BINS];
        gen_chunk_scores(&chunk_ranks, chunk_size, &mut chunk_scores, Some(&mut histo));
        let (threshold, allowed) = calibrate_threshold(&histo, sdbf.max_elem);
        trace!(chunk_index, threshold, allowed, "stream chunk calibrated");
        gen_chunk_hash(
            sdbf,
            data,
            chunk_pos,
            &chunk_scores,
            chunk_size,
            threshold,
            allowed,
            index,
            &mut gate,
        );
        chunk_pos += chunk_size;
    }
    if rem > 0 {
        let chunk = &data[chunk_pos..];
        gen_chunk_ranks(chunk, &mut chunk_ranks[..rem]);
        let mut histo = [0u32; SCORE_HISTO_BINS];
        gen_chunk_scores(&chunk_ranks[..rem], rem, &mut chunk_scores[..rem], Some(&mut histo));
        let (threshold, allowed) = calibrate_threshold(&histo, sdbf.max_elem);
        trace!(threshold, allowed, "stream remainder calibrated");
        gen_chunk_hash(
            sdbf,
            data,
            chunk_pos,
            &chunk_scores,
            rem,
            threshold,
            allowed,
            index,
            &mut gate,
        );
    }

    // Chop off the last filter if its membership is too low; it would mostly
    // contribute false positives.
    if sdbf.bf_count > 1 && sdbf.last_count < sdbf.max_elem / 8 {
        sdbf.bf_count -= 1;
        sdbf.last_count = sdbf.max_elem;
    }
    sdbf.buffer.truncate(sdbf.bf_count as usize * BF_SIZE);
    debug!(
        filters = sdbf.bf_count,
        last_count = sdbf.last_count,
        "stream digest generated"
    );
}

/// Block-mode generation: one task per block, disjoint output slices, a
/// completion barrier before the digest is finalised. Returns nothing; a
/// panicking block task propagates and fails the whole build.
pub(crate) fn gen_block_sdbf(
    sdbf: &mut Sdbf,
    data: &[u8],
    block_size: usize,
    index: Option<&Mutex<BloomFilter>>,
    search_indexes: &[BloomFilter],
) {
    let file_size = data.len();
    let qt = file_size / block_size;
    let bf_size = sdbf.bf_size as usize;
    let block_count = sdbf.bf_count as usize;

    let per_block_matches: Vec<Vec<u32>> = sdbf
        .buffer
        .par_chunks_mut(bf_size)
        .zip(sdbf.elem_counts.par_iter_mut())
        .enumerate()
        .map(|(block_num, (bf, elem))| {
            let len = if block_num == qt {
                file_size - qt * block_size
            } else {
                block_size
            };
            gen_block_filter(data, block_num, block_size, len, bf, elem, index, search_indexes)
        })
        .collect();

    if !search_indexes.is_empty() {
        let mut results = vec![vec![0u32; block_count]; search_indexes.len()];
        for (block_num, row) in per_block_matches.iter().enumerate() {
            for (idx, &hits) in row.iter().enumerate() {
                results[idx][block_num] = hits;
            }
        }
        sdbf.search_results = results;
    }
    debug!(
        filters = sdbf.bf_count,
        block_size, "block digest generated"
    );
}

/// Ranks, scores, calibrates and hashes one block into its filter slice.
/// Returns the per-search-index hit counters for this block.
#[allow(clippy::too_many_arguments)]
fn gen_block_filter(
    data: &[u8],
    block_num: usize,
    block_size: usize,
    len: usize,
    bf: &mut [u8],
    elem: &mut u16,
    index: Option<&Mutex<BloomFilter>>,
    search_indexes: &[BloomFilter],
) -> Vec<u32> {
    let block = &data[block_num * block_size..block_num * block_size + len];
    let mut ranks = vec![0u16; len];
    let mut scores = vec![0u16; len];
    gen_chunk_ranks(block, &mut ranks);
    let mut histo = [0u32; SCORE_HISTO_BINS];
    gen_chunk_scores(&ranks, len, &mut scores, Some(&mut histo));
    let (threshold, mut allowed) = calibrate_threshold(&histo, MAX_ELEM_DD);
    trace!(block_num, threshold, allowed, "block calibrated");

    let mut matches = vec![0u32; search_indexes.len()];
    let mut hash_count: u32 = 0;
    if len > POP_WIN_SIZE {
        for i in 0..len - POP_WIN_SIZE {
            if hash_count >= MAX_ELEM_DD {
                break;
            }
            let score = u32::from(scores[i]);
            if score < threshold || (score == threshold && allowed <= 0) {
                continue;
            }
            let words = sha1_words(&block[i..i + POP_WIN_SIZE]);
            if bf_sha1_insert(bf, BF_MASK, &words) == 0 {
                continue;
            }
            if let Some(index) = index {
                lock_index(index).insert_sha1(&words);
            }
            // A quarter of the features probe the external indexes; that is
            // plenty for a coarse membership signal.
            if !search_indexes.is_empty() && hash_count % 4 == 0 {
                for (hits, search) in matches.iter_mut().zip(search_indexes) {
                    if search.query_sha1(&words) {
                        *hits += 1;
                    }
                }
            }
            hash_count += 1;
            if score == threshold {
                allowed -= 1;
            }
        }
    }
    *elem = hash_count as u16;
    matches
}
