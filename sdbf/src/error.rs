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

//! Error types for digest construction, parsing and filter I/O.
//!
//! Comparison is deliberately infallible: a size mismatch between two Bloom
//! filters is reported as the score `-1`, not as an error.

use thiserror::Error;

/// Every way the engine can fail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The input buffer or file is below the minimum digestible size.
    #[error("input of {size} bytes is below the {min}-byte minimum")]
    InputTooSmall {
        /// Observed input size.
        size: u64,
        /// Required minimum size.
        min: u64,
    },

    /// A digest or index header field is missing or failed to parse.
    #[error("malformed digest: {0}")]
    MalformedDigest(String),

    /// The digest declares a version newer than this implementation.
    #[error("unsupported digest version {0}")]
    UnsupportedVersion(u32),

    /// The digest does not start with a known magic token.
    #[error("unknown digest magic {0:?}")]
    UnknownMagic(String),

    /// The encoded filter payload is not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// The compressed filter payload did not decompress to the declared size.
    #[error("lz4 decompress failed: {0}")]
    Lz4Decompress(#[from] lz4_flex::block::DecompressError),

    /// A Bloom filter size that is not a power of two, or below 64 bytes.
    #[error("invalid bloom filter size {0}: must be a power of two >= 64")]
    BadBloomSize(u64),

    /// An underlying storage failure at a file boundary.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        Error::MalformedDigest(what.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
