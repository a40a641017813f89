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

//! Bloom filter serialization.
//!
//! A serialized filter is a colon-separated header followed by the
//! LZ4-block-compressed bit array:
//!
//! ```text
//! sdbf-idx:<size>:<elem_count>:<hash_count>:<bit_mask>:<comp_size>:<name>
//! ```
//!
//! The file form carries exactly `comp_size` raw compressed bytes after the
//! header line, with no trailing data. The text form appends the compressed
//! payload base64-encoded as one further `:`-separated field, all on a single
//! newline-terminated line.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::bloom::BloomFilter;
use crate::error::{Error, Result};

/// Magic token opening every serialized filter.
const INDEX_MAGIC: &str = "sdbf-idx";

struct Header {
    size: u64,
    elem_count: u64,
    hash_count: u16,
    bit_mask: u32,
    comp_size: u64,
    name: String,
}

fn field<'a>(fields: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str> {
    fields
        .next()
        .ok_or_else(|| Error::malformed(format!("missing {what}")))
}

fn int_field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<T> {
    field(fields, what)?
        .parse()
        .map_err(|_| Error::malformed(format!("unparseable {what}")))
}

fn parse_header<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Header> {
    let magic = field(fields, "magic")?;
    if magic != INDEX_MAGIC {
        return Err(Error::UnknownMagic(magic.to_string()));
    }
    let size: u64 = int_field(fields, "filter size")?;
    if !(64..=1 << 29).contains(&size) || !size.is_power_of_two() {
        return Err(Error::BadBloomSize(size));
    }
    let elem_count = int_field(fields, "element count")?;
    let hash_count = int_field(fields, "hash count")?;
    let bit_mask: u32 = int_field(fields, "bit mask")?;
    if u64::from(bit_mask) != size * 8 - 1 {
        return Err(Error::malformed("bit mask disagrees with filter size"));
    }
    let comp_size = int_field(fields, "compressed size")?;
    let name = field(fields, "name")?.to_string();
    Ok(Header {
        size,
        elem_count,
        hash_count,
        bit_mask,
        comp_size,
        name,
    })
}

fn filter_from_header(header: Header, compressed: &[u8]) -> Result<BloomFilter> {
    let buffer = lz4_flex::block::decompress(compressed, header.size as usize)?;
    if buffer.len() as u64 != header.size {
        return Err(Error::malformed("decompressed size disagrees with header"));
    }
    let mut bf = BloomFilter {
        buffer,
        hamming: 0,
        bit_mask: header.bit_mask,
        max_elem: 0,
        hash_count: header.hash_count,
        elem_count: header.elem_count,
        name: header.name,
    };
    bf.compute_hamming();
    Ok(bf)
}

impl BloomFilter {
    fn serialized_parts(&self) -> (String, Vec<u8>) {
        let compressed = lz4_flex::block::compress(&self.buffer);
        let header = format!(
            "{INDEX_MAGIC}:{}:{}:{}:{}:{}:{}",
            self.buffer.len(),
            self.elem_count,
            self.hash_count,
            self.bit_mask,
            compressed.len(),
            self.name,
        );
        (header, compressed)
    }

    /// Writes the filter to `path`: one header line, then the raw compressed
    /// bit array.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] on any storage failure.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let (header, compressed) = self.serialized_parts();
        let mut out = Vec::with_capacity(header.len() + 1 + compressed.len());
        out.extend_from_slice(header.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&compressed);
        fs::write(path, out)?;
        Ok(())
    }

    /// Reads a filter previously written with
    /// [`write_to_file`](Self::write_to_file).
    ///
    /// # Errors
    ///
    /// I/O failures, header parse failures, and payloads that do not
    /// decompress to the declared size.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<BloomFilter> {
        let raw = fs::read(path)?;
        let newline = raw
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::malformed("missing header line"))?;
        let line = std::str::from_utf8(&raw[..newline])
            .map_err(|_| Error::malformed("header is not utf-8"))?;
        let header = parse_header(&mut line.split(':'))?;
        let payload = &raw[newline + 1..];
        if payload.len() as u64 != header.comp_size {
            return Err(Error::malformed("compressed payload size disagrees"));
        }
        filter_from_header(header, payload)
    }
}

impl fmt::Display for BloomFilter {
    /// One-line text form: the header fields, then the base64 of the
    /// compressed bit array, newline-terminated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (header, compressed) = self.serialized_parts();
        writeln!(f, "{header}:{}", BASE64.encode(compressed))
    }
}

impl FromStr for BloomFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<BloomFilter> {
        let mut fields = s.trim_end_matches('\n').split(':');
        let header = parse_header(&mut fields)?;
        let encoded = field(&mut fields, "filter payload")?;
        let compressed = BASE64.decode(encoded)?;
        if compressed.len() as u64 != header.comp_size {
            return Err(Error::malformed("compressed payload size disagrees"));
        }
        filter_from_header(header, &compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha1_words;

    fn populated(name: &str) -> BloomFilter {
        let mut bf = BloomFilter::new(1024, 5, 0).unwrap();
        bf.set_name(name);
        for n in 0u64..200 {
            bf.insert_sha1(&sha1_words(&n.to_le_bytes()));
        }
        bf
    }

    #[test]
    fn string_round_trip() {
        let bf = populated("strings.bin");
        let parsed: BloomFilter = bf.to_string().parse().unwrap();
        assert_eq!(parsed.buffer, bf.buffer);
        assert_eq!(parsed.hash_count, bf.hash_count);
        assert_eq!(parsed.bit_mask, bf.bit_mask);
        assert_eq!(parsed.elem_count, bf.elem_count);
        assert_eq!(parsed.name, bf.name);
    }

    #[test]
    fn empty_name_survives() {
        let mut bf = populated("");
        bf.set_name("");
        let parsed: BloomFilter = bf.to_string().parse().unwrap();
        assert_eq!(parsed.name, "");
    }

    #[test]
    fn wrong_magic() {
        assert!(matches!(
            "sdbf-XXX:64:0:5:511:0:".parse::<BloomFilter>(),
            Err(Error::UnknownMagic(_))
        ));
    }

    #[test]
    fn bad_size() {
        assert!(matches!(
            "sdbf-idx:65:0:5:519:0:".parse::<BloomFilter>(),
            Err(Error::BadBloomSize(65))
        ));
    }

    #[test]
    fn bad_base64() {
        let line = "sdbf-idx:64:0:5:511:4:name:!!!!";
        assert!(matches!(
            line.parse::<BloomFilter>(),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn truncated_header() {
        assert!(matches!(
            "sdbf-idx:64:0".parse::<BloomFilter>(),
            Err(Error::MalformedDigest(_))
        ));
    }
}
