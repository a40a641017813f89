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

//! Rolling Shannon entropy over 64-byte windows, mapped to 0..1000 ranks.
//!
//! Entropy is kept as a fixed-point sum of per-byte-count contributions so a
//! window slide is two table lookups. Every [`BLOCK_SIZE`] positions the sum
//! is rebuilt from scratch; the incremental path is exact, so both paths
//! agree at the synchronisation points and the rank stream is a pure function
//! of the input bytes.

use crate::tables::{BLOCK_SIZE, ENTROPY_64_INT, ENTR64_RANKS, ENTR_POWER, ENTR_SCALE, ENTR_WIN_SIZE};

/// Per-byte-value occurrence counts for the current window.
pub(crate) type ByteCounts = [u8; 256];

/// Computes the scaled entropy of the window starting at `window[0]` from
/// scratch, resetting `counts`.
pub(crate) fn entr64_init(window: &[u8], counts: &mut ByteCounts) -> u64 {
    counts.fill(0);
    for &b in &window[..ENTR_WIN_SIZE] {
        counts[b as usize] += 1;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| ENTROPY_64_INT[c as usize])
        .sum()
}

/// Slides the window one byte to the right: `trailing[0]` leaves,
/// `trailing[ENTR_WIN_SIZE]` enters. Returns the updated scaled entropy.
pub(crate) fn entr64_inc(prev: u64, trailing: &[u8], counts: &mut ByteCounts) -> u64 {
    let leaving = trailing[0] as usize;
    let entering = trailing[ENTR_WIN_SIZE] as usize;
    if leaving == entering {
        return prev;
    }

    let old_count = counts[leaving] as usize;
    let new_count = counts[entering] as usize;
    counts[leaving] -= 1;
    counts[entering] += 1;

    // Swapping a byte between equally-sized classes leaves the sum unchanged.
    if old_count == new_count + 1 {
        return prev;
    }

    let old_diff = ENTROPY_64_INT[old_count] as i64 - ENTROPY_64_INT[old_count - 1] as i64;
    let new_diff = ENTROPY_64_INT[new_count + 1] as i64 - ENTROPY_64_INT[new_count] as i64;
    (prev as i64 - old_diff + new_diff).clamp(0, ENTR_SCALE as i64) as u64
}

/// Fills `ranks[p]` with the entropy rank of the window at `chunk[p..p+64]`
/// for every position that has a full window; trailing slots are zeroed.
/// `ranks` must be exactly as long as `chunk`.
pub(crate) fn gen_chunk_ranks(chunk: &[u8], ranks: &mut [u16]) {
    debug_assert_eq!(chunk.len(), ranks.len());
    ranks.fill(0);
    if chunk.len() < ENTR_WIN_SIZE {
        return;
    }

    let mut counts: ByteCounts = [0; 256];
    let mut entropy = 0u64;
    for offset in 0..chunk.len() - ENTR_WIN_SIZE {
        entropy = if offset % BLOCK_SIZE == 0 {
            entr64_init(&chunk[offset..], &mut counts)
        } else {
            entr64_inc(entropy, &chunk[offset - 1..], &mut counts)
        };
        ranks[offset] = ENTR64_RANKS[(entropy >> ENTR_POWER) as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_window_has_zero_entropy() {
        let mut counts = [0u8; 256];
        assert_eq!(entr64_init(&[7u8; 64], &mut counts), 0);
    }

    #[test]
    fn distinct_window_is_near_full_scale() {
        let window: Vec<u8> = (0..64).collect();
        let mut counts = [0u8; 256];
        let entropy = entr64_init(&window, &mut counts);
        // 64 distinct bytes give 6 of a possible 6 bits.
        assert!(entropy > ENTR_SCALE * 9 / 10);
        assert!(entropy <= ENTR_SCALE);
    }

    #[test]
    fn incremental_matches_reinit_at_every_slide() {
        // A byte mix with repeats so all inc paths (enter==leave, class swap,
        // table walk) get exercised.
        let data: Vec<u8> = (0..512u32).map(|i| (i * 7 % 23) as u8).collect();
        let mut counts = [0u8; 256];
        let mut entropy = entr64_init(&data, &mut counts);
        for offset in 1..data.len() - ENTR_WIN_SIZE {
            entropy = entr64_inc(entropy, &data[offset - 1..], &mut counts);
            let mut fresh = [0u8; 256];
            let expected = entr64_init(&data[offset..], &mut fresh);
            assert_eq!(entropy, expected, "divergence at offset {offset}");
            assert_eq!(counts, fresh);
        }
    }

    #[test]
    fn ranks_are_stable_and_sized() {
        let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        let mut a = vec![0u16; data.len()];
        let mut b = vec![0u16; data.len()];
        gen_chunk_ranks(&data, &mut a);
        gen_chunk_ranks(&data, &mut b);
        assert_eq!(a, b);
        // No rank beyond the last full window.
        assert!(a[data.len() - ENTR_WIN_SIZE..].iter().all(|&r| r == 0));
    }

    #[test]
    fn short_chunk_ranks_are_all_zero() {
        let data = [1u8; 32];
        let mut ranks = vec![9u16; 32];
        gen_chunk_ranks(&data, &mut ranks);
        assert!(ranks.iter().all(|&r| r == 0));
    }
}
