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

//! A collection of digests with pairwise comparison drivers.

use std::fmt;
use std::path::Path;

use crate::digest::Sdbf;
use crate::error::Result;

/// One row of a set comparison report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetComparison {
    /// Name of the query digest.
    pub query: String,
    /// Name of the target digest.
    pub target: String,
    /// Similarity score, `-1..=100`.
    pub score: i32,
}

impl SetComparison {
    /// Renders the row with the given separator: scores are zero-padded to
    /// three digits, the `-1` sentinel is printed bare.
    pub fn render(&self, separator: char) -> String {
        if self.score >= 0 {
            format!(
                "{}{sep}{}{sep}{:03}",
                self.query,
                self.target,
                self.score,
                sep = separator
            )
        } else {
            format!(
                "{}{sep}{}{sep}{}",
                self.query,
                self.target,
                self.score,
                sep = separator
            )
        }
    }
}

impl fmt::Display for SetComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render('|'))
    }
}

/// A named, ordered collection of digests.
#[derive(Debug, Default)]
pub struct SdbfSet {
    items: Vec<Sdbf>,
    name: String,
}

impl SdbfSet {
    /// Creates an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        SdbfSet {
            items: Vec::new(),
            name: name.into(),
        }
    }

    /// Loads a set from a file of newline-separated digest lines, named
    /// after the file.
    ///
    /// # Errors
    ///
    /// I/O failures and any digest line that fails to parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut set = SdbfSet::new(path.to_string_lossy());
        for line in content.lines().filter(|l| !l.is_empty()) {
            set.items.push(line.parse()?);
        }
        Ok(set)
    }

    /// Name of this set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a digest.
    pub fn push(&mut self, digest: Sdbf) {
        self.items.push(digest);
    }

    /// Number of digests in the set.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set holds no digests.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the digests in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Sdbf> {
        self.items.iter()
    }

    /// Sum of the input sizes of all member digests.
    pub fn input_size(&self) -> u64 {
        self.items.iter().map(Sdbf::input_size).sum()
    }

    /// Folds every member digest for cheaper comparisons.
    pub fn fast_all(&mut self) {
        for sd in &mut self.items {
            sd.fast();
        }
    }

    /// Compares every unordered pair within the set and returns the rows
    /// scoring at least `threshold`.
    pub fn compare_all(&self, threshold: i32) -> Vec<SetComparison> {
        let mut results = Vec::new();
        for (i, query) in self.items.iter().enumerate() {
            for target in &self.items[i + 1..] {
                let score = query.compare(target);
                if score >= threshold {
                    results.push(SetComparison {
                        query: query.name().to_string(),
                        target: target.name().to_string(),
                        score,
                    });
                }
            }
        }
        results
    }

    /// Compares every digest in this set against every digest in `other`,
    /// sampling `sample` filters per comparison when nonzero, and returns the
    /// rows scoring at least `threshold`.
    pub fn compare_to(&self, other: &SdbfSet, threshold: i32, sample: u32) -> Vec<SetComparison> {
        let mut results = Vec::new();
        for query in &self.items {
            for target in &other.items {
                let score = query.compare_sample(target, sample);
                if score >= threshold {
                    results.push(SetComparison {
                        query: query.name().to_string(),
                        target: target.name().to_string(),
                        score,
                    });
                }
            }
        }
        results
    }
}

impl fmt::Display for SdbfSet {
    /// Concatenated digest lines of every member.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sd in &self.items {
            write!(f, "{sd}")?;
        }
        Ok(())
    }
}
