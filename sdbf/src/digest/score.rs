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

//! Digest-vs-digest scoring.
//!
//! Orientation is canonicalised first: the side with fewer filters (ties
//! broken by last-filter population, then name) becomes the reference, which
//! makes the score commutative. Each reference filter is then matched against
//! every target filter; the per-pair score is the bit overlap in excess of
//! the random-overlap cutoff for the pair's density, and the best match wins.
//! Under-populated reference filters are excluded from the average.

use rand::RngCore;

use crate::digest::sketch::Sdbf;
use crate::tables::{cutoff_at, CUTOFFS_256, CUTOFFS_64, MIN_ELEM_COUNT};

/// Scores `a` against `b`, optionally sampling at most `sample` filters of
/// the reference side. Returns `-1` when no filter pair was comparable.
pub(crate) fn sdbf_score<R: RngCore>(a: &Sdbf, b: &Sdbf, sample: u32, rng: &mut R) -> i32 {
    let (mut s1, mut s2) = (a, b);
    let mut bf_count_1 = if sample > 0 && s1.bf_count > sample {
        sample
    } else {
        s1.bf_count
    };

    let swap = bf_count_1 > s2.bf_count
        || (bf_count_1 == s2.bf_count
            && s1.filter_elem_count(bf_count_1 - 1) > s2.filter_elem_count(s2.bf_count - 1)
            && s1.hash_name > s2.hash_name);
    if swap {
        std::mem::swap(&mut s1, &mut s2);
        bf_count_1 = s1.bf_count;
    }

    let mut score_sum = -1.0f64;
    let mut sparse_sectors = 0u32;
    for i in 0..bf_count_1 {
        let rand_offset = if sample > 0 && bf_count_1 > sample {
            rng.next_u32() % (s1.bf_count / sample)
        } else {
            1
        };
        let ref_index = i * rand_offset;
        debug_assert!(ref_index < s1.bf_count);
        let best = max_score(s1, ref_index, s2);
        if score_sum < 0.0 {
            score_sum = best;
        } else {
            score_sum += best;
        }
        if s1.filter_elem_count(i) < MIN_ELEM_COUNT {
            sparse_sectors += 1;
        }
    }

    let mut denominator = bf_count_1;
    if bf_count_1 > 1 {
        denominator -= sparse_sectors;
    }
    if denominator == 0 || score_sum < 0.0 {
        return -1;
    }
    (100.0 * score_sum / f64::from(denominator)).round() as i32
}

/// Best per-filter score of reference filter `ref_index` against every filter
/// of `target`, in `[0, 1]`; `-1.0` when no target filter was populated
/// enough to compare.
fn max_score(reference: &Sdbf, ref_index: u32, target: &Sdbf) -> f64 {
    let s1 = reference.filter_elem_count(ref_index);
    if s1 < MIN_ELEM_COUNT {
        return 0.0;
    }
    let bf1 = reference.filter(ref_index);
    let e1 = u32::from(reference.hamming[ref_index as usize]);
    let folded = reference.fast_mode || target.fast_mode;
    let table: &[u32; crate::tables::CUTOFF_COUNT] = if folded { &CUTOFFS_64 } else { &CUTOFFS_256 };
    let numerator: u32 = if folded { 1024 } else { 4096 };

    let mut best = -1.0f64;
    for i in 0..target.bf_count {
        let s2 = target.filter_elem_count(i);
        if s2 < MIN_ELEM_COUNT {
            continue;
        }
        let bf2 = target.filter(i);
        let e2 = u32::from(target.hamming[i as usize]);
        let max_est = e1.min(e2);
        let cut = cutoff_at(table, numerator / (s1 + s2));
        let dot: u32 = bf1
            .iter()
            .zip(bf2)
            .map(|(x, y)| (x & y).count_ones())
            .sum();
        let score = if dot <= cut {
            0.0
        } else {
            (f64::from(dot - cut) / f64::from(max_est - cut)).clamp(0.0, 1.0)
        };
        if score > best {
            best = score;
        }
    }
    best
}
