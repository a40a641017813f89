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

//! The Bloom filter primitive underlying every digest.
//!
//! A filter is a power-of-two-sized bit array probed at five positions per
//! item, each position taken from one 32-bit word of the item's SHA-1. Two
//! same-size filters can be compared directly: the popcount of their
//! intersection, measured against the expected overlap of two random filters
//! at the same density, yields a 0–100 score (`-1` when the sizes differ).
//!
//! Filters serialize to a colon-separated header plus an LZ4-compressed
//! payload — raw to a file, base64-encoded in the one-line text form. Large
//! standalone filters in this format act as coarse membership indexes over
//! many digests.

mod filter;
mod serialization;

pub use self::filter::BloomFilter;

pub(crate) use self::filter::bf_sha1_insert;
