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

//! The textual digest format.
//!
//! One newline-terminated line per digest, colon-separated:
//!
//! ```text
//! sdbf:03:<namelen>:<name>:<size>:sha1:<bf_size>:<hash_count>:<mask>:<max_elem>:<bf_count>:<last_count>:<base64>
//! sdbf-dd:03:<namelen>:<name>:<size>:sha1:<bf_size>:<hash_count>:<mask>:<max_elem>:<bf_count>:<block_size>[:<elem>:<base64>]*
//! ```
//!
//! The stream form encodes the whole filter chain as base64 written in
//! six-filter groups; `6 * 256` bytes is a multiple of three, so the groups
//! concatenate into one valid base64 string and decode in a single pass. The
//! block form carries one `:<elem_count:02x>:<base64(filter)>` group per
//! filter. The parsed digest never carries an index filter.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::digest::sketch::Sdbf;
use crate::error::{Error, Result};
use crate::tables::{MAGIC_DD, MAGIC_STREAM, SDBF_VERSION};

/// Filters per base64 group in the stream form.
const B64_GROUP_FILTERS: usize = 6;

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

fn hex_field<'a>(fields: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<u32> {
    u32::from_str_radix(field(fields, what)?, 16)
        .map_err(|_| Error::malformed(format!("unparseable {what}")))
}

impl fmt::Display for Sdbf {
    /// Writes the newline-terminated digest line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magic = if self.elem_counts.is_empty() {
            MAGIC_STREAM
        } else {
            MAGIC_DD
        };
        write!(
            f,
            "{magic}:{SDBF_VERSION:02}:{}:{}:{}:sha1:{}:{}:{:x}:{}:{}",
            self.hash_name.len(),
            self.hash_name,
            self.orig_file_size,
            self.bf_size,
            self.hash_count,
            self.mask,
            self.max_elem,
            self.bf_count,
        )?;

        let bf_size = self.bf_size as usize;
        if self.elem_counts.is_empty() {
            write!(f, ":{}:", self.last_count)?;
            let group = B64_GROUP_FILTERS * bf_size;
            for chunk in self.buffer.chunks(group) {
                f.write_str(&BASE64.encode(chunk))?;
            }
        } else {
            write!(f, ":{}", self.dd_block_size)?;
            for (i, filter) in self.buffer.chunks_exact(bf_size).enumerate() {
                write!(f, ":{:02x}:{}", self.elem_counts[i], BASE64.encode(filter))?;
            }
        }
        writeln!(f)
    }
}

impl FromStr for Sdbf {
    type Err = Error;

    /// Parses one digest line.
    fn from_str(s: &str) -> Result<Sdbf> {
        let line = s.trim_end_matches('\n');
        let mut fields = line.split(':');

        let magic = field(&mut fields, "magic")?;
        if magic != MAGIC_STREAM && magic != MAGIC_DD {
            return Err(Error::UnknownMagic(magic.to_string()));
        }
        let version: u32 = int_field(&mut fields, "version")?;
        if version > SDBF_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let _name_len: usize = int_field(&mut fields, "name length")?;
        let name = field(&mut fields, "name")?.to_string();
        let orig_file_size: u64 = int_field(&mut fields, "original file size")?;
        let _hash_algorithm = field(&mut fields, "hash algorithm")?;
        let bf_size: u32 = int_field(&mut fields, "filter size")?;
        if bf_size == 0 {
            return Err(Error::malformed("zero filter size"));
        }
        let hash_count: u16 = int_field(&mut fields, "hash count")?;
        let mask = hex_field(&mut fields, "bit mask")?;
        let max_elem: u32 = int_field(&mut fields, "max element count")?;
        let bf_count: u32 = int_field(&mut fields, "filter count")?;
        if bf_count == 0 {
            return Err(Error::malformed("zero filter count"));
        }

        let mut sdbf = Sdbf {
            hash_name: name,
            bf_count,
            bf_size,
            hash_count,
            mask,
            max_elem,
            last_count: 0,
            buffer: Vec::new(),
            hamming: Vec::new(),
            elem_counts: Vec::new(),
            dd_block_size: 0,
            orig_file_size,
            fast_mode: false,
            index: None,
            search_results: Vec::new(),
        };
        let expected = bf_count as usize * bf_size as usize;

        if magic == MAGIC_STREAM {
            sdbf.last_count = int_field(&mut fields, "last filter count")?;
            let encoded = field(&mut fields, "filter data")?;
            sdbf.buffer = BASE64.decode(encoded)?;
            if sdbf.buffer.len() != expected {
                return Err(Error::malformed("filter data disagrees with filter count"));
            }
        } else {
            sdbf.dd_block_size = int_field(&mut fields, "block size")?;
            sdbf.elem_counts = Vec::with_capacity(bf_count as usize);
            sdbf.buffer = Vec::with_capacity(expected);
            for _ in 0..bf_count {
                let elem = hex_field(&mut fields, "filter element count")?;
                sdbf.elem_counts.push(elem as u16);
                let filter = BASE64.decode(field(&mut fields, "filter data")?)?;
                if filter.len() != bf_size as usize {
                    return Err(Error::malformed("filter data disagrees with filter size"));
                }
                sdbf.buffer.extend_from_slice(&filter);
            }
        }

        sdbf.compute_hamming();
        Ok(sdbf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_bytes(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 33) as u8
            })
            .collect()
    }

    #[test]
    fn stream_round_trip() {
        let data = lcg_bytes(1001, 64 * 1024);
        let sd = Sdbf::from_bytes("stream.bin", &data).unwrap();
        let text = sd.to_string();
        assert!(text.starts_with("sdbf:03:10:stream.bin:65536:sha1:256:5:7ff:"));
        assert!(text.ends_with('\n'));

        let parsed: Sdbf = text.parse().unwrap();
        assert_eq!(parsed.to_string(), text);
        assert_eq!(parsed.filter_count(), sd.filter_count());
        assert_eq!(parsed.input_size(), sd.input_size());
        assert_eq!(parsed.buffer, sd.buffer);
        assert!(parsed.index().is_none());
    }

    #[test]
    fn block_round_trip() {
        let data = lcg_bytes(2002, 8 * 1024);
        let sd = Sdbf::builder("block.bin")
            .block_size(1024)
            .build(&data)
            .unwrap();
        let text = sd.to_string();
        assert!(text.starts_with("sdbf-dd:03:9:block.bin:8192:sha1:256:5:7ff:192:8:1024:"));

        let parsed: Sdbf = text.parse().unwrap();
        assert_eq!(parsed.to_string(), text);
        assert_eq!(parsed.elem_counts, sd.elem_counts);
        assert_eq!(parsed.block_size(), 1024);
    }

    #[test]
    fn unknown_magic_is_rejected() {
        assert!(matches!(
            "sdhash:03:1:x:600".parse::<Sdbf>(),
            Err(Error::UnknownMagic(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        assert!(matches!(
            "sdbf:04:1:x:600:sha1:256:5:7ff:160:1:0:AAAA".parse::<Sdbf>(),
            Err(Error::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn truncated_line_is_malformed() {
        assert!(matches!(
            "sdbf:03:1:x:600:sha1:256:5".parse::<Sdbf>(),
            Err(Error::MalformedDigest(_))
        ));
    }

    #[test]
    fn garbage_payload_is_a_base64_error() {
        let line = "sdbf:03:1:x:600:sha1:256:5:7ff:160:1:0:@@@@";
        assert!(matches!(
            line.parse::<Sdbf>(),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn short_payload_is_malformed() {
        // Valid base64, wrong byte count for one 256-byte filter.
        let line = "sdbf:03:1:x:600:sha1:256:5:7ff:160:1:0:AAAA";
        assert!(matches!(
            line.parse::<Sdbf>(),
            Err(Error::MalformedDigest(_))
        ));
    }

    #[test]
    fn unparseable_integer_is_malformed() {
        let line = "sdbf:03:1:x:notanumber:sha1:256:5:7ff:160:1:0:AAAA";
        assert!(matches!(
            line.parse::<Sdbf>(),
            Err(Error::MalformedDigest(_))
        ));
    }

    #[test]
    fn empty_name_round_trips() {
        let data = lcg_bytes(3003, 2048);
        let sd = Sdbf::from_bytes("", &data).unwrap();
        let parsed: Sdbf = sd.to_string().parse().unwrap();
        assert_eq!(parsed.name(), "");
        assert_eq!(parsed.to_string(), sd.to_string());
    }
}
