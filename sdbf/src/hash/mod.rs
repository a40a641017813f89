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

//! Feature hashing: SHA-1 digests viewed as Bloom filter probe words.

use byteorder::{ByteOrder, LittleEndian};
use sha1::{Digest, Sha1};

/// Hashes a feature window and returns the digest as five little-endian
/// 32-bit words. Each word drives one independent Bloom filter probe.
pub(crate) fn sha1_words(data: &[u8]) -> [u32; 5] {
    let digest = Sha1::digest(data);
    let mut words = [0u32; 5];
    LittleEndian::read_u32_into(&digest, &mut words);
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_cover_the_whole_digest() {
        let words = sha1_words(b"abc");
        // SHA-1("abc") = a9993e36 4706816a ba3e2571 7850c26c 9cd0d89d
        let expected = [
            u32::from_le_bytes([0xa9, 0x99, 0x3e, 0x36]),
            u32::from_le_bytes([0x47, 0x06, 0x81, 0x6a]),
            u32::from_le_bytes([0xba, 0x3e, 0x25, 0x71]),
            u32::from_le_bytes([0x78, 0x50, 0xc2, 0x6c]),
            u32::from_le_bytes([0x9c, 0xd0, 0xd8, 0x9d]),
        ];
        assert_eq!(words, expected);
    }

    #[test]
    fn distinct_windows_hash_apart() {
        assert_ne!(sha1_words(&[0u8; 64]), sha1_words(&[1u8; 64]));
    }
}
