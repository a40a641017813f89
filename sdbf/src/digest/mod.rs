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

//! Similarity digests.
//!
//! A digest selects "popular" 64-byte windows of the input by
//! entropy-weighted ranking, hashes each selected window with SHA-1, and
//! accumulates the hashes in a chain of small Bloom filters. Two digests
//! sharing significant input fragments share features, which shows up as
//! excess bit overlap between their filters.
//!
//! # Modes
//!
//! - **Stream** (default): one chain of filters, each filled to capacity
//!   before the next begins. Good for whole-file similarity.
//! - **Block**: one filter per fixed-size input block, built in parallel.
//!   Good for sector-level matching and for probing search indexes.
//!
//! # Usage
//!
//! ```
//! use sdbf::Sdbf;
//!
//! let a: Vec<u8> = (0u32..4096).map(|i| (i * 31 % 251) as u8).collect();
//! let digest = Sdbf::from_bytes("a.bin", &a)?;
//!
//! // Round-trip through the textual form.
//! let parsed: Sdbf = digest.to_string().parse()?;
//! assert_eq!(parsed.to_string(), digest.to_string());
//!
//! // Self-similarity is exact.
//! assert_eq!(digest.compare(&parsed), digest.compare(&digest));
//! # Ok::<(), sdbf::Error>(())
//! ```

mod builder;
mod entropy;
mod generate;
mod popularity;
mod score;
mod serialization;
mod sketch;

pub use self::builder::SdbfBuilder;
pub use self::sketch::Sdbf;
