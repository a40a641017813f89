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

//! Popularity scoring: each position's score is the number of sliding
//! 64-wide windows in which it won the minimum-rank vote.
//!
//! The tie-break rules are part of the digest format and must not be
//! "simplified": a rescan keeps the leftmost minimum, except that a tie
//! immediately to the right of the current minimum moves the vote right.
//! Positions of rank zero never win. The window advance has a cheap path
//! that extends the current minimum's reign without rescanning; it advances
//! the position cursor from inside the loop body, which is why this is a
//! `while` and not a range loop.

use crate::tables::{POP_WIN_SIZE, SCORE_HISTO_BINS};

/// Fills `scores[p]` with the number of windows position `p` won, over the
/// first `chunk_size` entries of `ranks`. When `histo` is given, it receives
/// a histogram of the scores of all scored positions.
pub(crate) fn gen_chunk_scores(
    ranks: &[u16],
    chunk_size: usize,
    scores: &mut [u16],
    histo: Option<&mut [u32; SCORE_HISTO_BINS]>,
) {
    let pop_win = POP_WIN_SIZE;
    scores[..chunk_size].fill(0);
    if chunk_size <= pop_win {
        return;
    }
    let limit = chunk_size - pop_win;

    let mut min_pos = 0usize;
    let mut min_rank = ranks[min_pos];
    let mut i = 0usize;
    while i < limit {
        // Cheap slide: while the entering rank does not undercut the current
        // minimum and the minimum is still inside the window, the reign
        // continues (a tie on entry moves the vote to the entering position).
        if i > 0 && min_rank > 0 {
            while i + pop_win < ranks.len()
                && ranks[i + pop_win] >= min_rank
                && i < min_pos
                && i < limit + 1
            {
                if ranks[i + pop_win] == min_rank {
                    min_pos = i + pop_win;
                }
                scores[min_pos] += 1;
                i += 1;
            }
        }

        // Full rescan of the window at i.
        min_pos = i;
        min_rank = ranks[min_pos];
        for j in i + 1..i + pop_win {
            let r = ranks[j];
            if r < min_rank && r > 0 {
                min_rank = r;
                min_pos = j;
            } else if min_pos == j - 1 && r == min_rank {
                min_pos = j;
            }
        }
        if ranks[min_pos] > 0 {
            scores[min_pos] += 1;
        }
        i += 1;
    }

    if let Some(histo) = histo {
        for &score in &scores[..limit] {
            histo[score as usize] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores_of(ranks: &[u16]) -> Vec<u16> {
        let mut scores = vec![0u16; ranks.len()];
        gen_chunk_scores(ranks, ranks.len(), &mut scores, None);
        scores
    }

    #[test]
    fn too_short_for_a_window_scores_nothing() {
        let ranks = vec![5u16; POP_WIN_SIZE];
        assert!(scores_of(&ranks).iter().all(|&s| s == 0));
    }

    #[test]
    fn zero_ranks_never_win() {
        let ranks = vec![0u16; 4 * POP_WIN_SIZE];
        assert!(scores_of(&ranks).iter().all(|&s| s == 0));
    }

    #[test]
    fn lone_minimum_collects_every_window_it_is_in() {
        // One strict minimum in the middle of an otherwise flat high plateau
        // of pairwise-distinct ranks around it.
        let n = 3 * POP_WIN_SIZE;
        let mut ranks: Vec<u16> = (0..n).map(|i| 500 + (i % 7) as u16 * 3 + 1).collect();
        let dip = POP_WIN_SIZE + 10;
        ranks[dip] = 9;
        let scores = scores_of(&ranks);
        // The dip wins all 64 windows that contain it.
        assert_eq!(scores[dip] as usize, POP_WIN_SIZE);
    }

    #[test]
    fn equal_ranks_spread_votes_rightward() {
        // On an all-equal rank plateau the adjacent-tie rule walks the vote
        // to the window's rightmost position, so every scored window elects a
        // different winner and no score exceeds a small constant.
        let ranks = vec![300u16; 4 * POP_WIN_SIZE];
        let scores = scores_of(&ranks);
        assert!(scores.iter().all(|&s| s <= 2), "scores: {scores:?}");
        let total: u32 = scores.iter().map(|&s| u32::from(s)).sum();
        assert!(total > 0);
    }

    #[test]
    fn rising_ranks_elect_each_window_start_once() {
        // Strictly increasing ranks: every window's minimum is its leftmost
        // position, so each scored window start wins exactly once.
        let n = 5 * POP_WIN_SIZE;
        let ranks: Vec<u16> = (0..n).map(|i| 100 + i as u16).collect();
        let scores = scores_of(&ranks);
        let limit = n - POP_WIN_SIZE;
        assert!(scores[..limit].iter().all(|&s| s == 1));
        assert!(scores[limit..].iter().all(|&s| s == 0));
    }

    #[test]
    fn falling_ranks_elect_each_window_end_once() {
        // Strictly decreasing ranks: every window's minimum is its rightmost
        // position.
        let n = 5 * POP_WIN_SIZE;
        let ranks: Vec<u16> = (0..n).map(|i| (1000 - i) as u16).collect();
        let scores = scores_of(&ranks);
        let limit = n - POP_WIN_SIZE;
        for (p, &s) in scores.iter().enumerate() {
            let expected = u16::from(p >= POP_WIN_SIZE - 1 && p < limit + POP_WIN_SIZE - 1);
            assert_eq!(s, expected, "position {p}");
        }
    }

    #[test]
    fn histogram_counts_scored_positions() {
        let n = 4 * POP_WIN_SIZE;
        let ranks: Vec<u16> = (0..n).map(|i| 100 + i as u16).collect();
        let mut scores = vec![0u16; n];
        let mut histo = [0u32; SCORE_HISTO_BINS];
        gen_chunk_scores(&ranks, n, &mut scores, Some(&mut histo));
        let limit = n - POP_WIN_SIZE;
        assert_eq!(histo[1] as usize, limit);
        assert_eq!(histo[0], 0);
        assert!(histo[2..].iter().all(|&c| c == 0));
    }
}
