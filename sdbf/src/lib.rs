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

//! # Similarity Digest Bloom Filters
//!
//! An approximate-matching fingerprint engine: [`Sdbf`] computes a compact
//! digest of a binary object, and two digests compare to a 0–100 similarity
//! score. Unlike a cryptographic hash, inputs sharing significant fragments
//! — even under insertion, deletion or reordering — produce digests with
//! measurable overlap.
//!
//! ```
//! use sdbf::Sdbf;
//!
//! // Text-like data: pseudo-random over a bounded alphabet.
//! let mut x: u32 = 1;
//! let data: Vec<u8> = (0..8192)
//!     .map(|_| {
//!         x = x.wrapping_mul(1103515245).wrapping_add(12345);
//!         ((x >> 16) % 47) as u8
//!     })
//!     .collect();
//! let a = Sdbf::from_bytes("a", &data)?;
//! let b = Sdbf::from_bytes("b", &data)?;
//! assert_eq!(a.compare(&b), 100);
//! # Ok::<(), sdbf::Error>(())
//! ```
//!
//! Scores are comparable, not cryptographic: the engine offers no
//! adversarial-robustness guarantees and digests are not reversible.

#![deny(missing_docs)]

pub mod bloom;
pub mod digest;
pub mod error;
pub mod set;
pub mod tables;

mod hash;

pub use crate::bloom::BloomFilter;
pub use crate::digest::{Sdbf, SdbfBuilder};
pub use crate::error::{Error, Result};
pub use crate::set::{SdbfSet, SetComparison};
