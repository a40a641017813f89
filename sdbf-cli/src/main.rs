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

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, warn};

use sdbf::{BloomFilter, SdbfBuilder, SdbfSet};

const KB: u64 = 1024;
const MB: u64 = KB * KB;

/// Block size ceiling accepted from the command line, in KiB.
const MAX_BLOCK_KB: u32 = 16;

/// Inputs at least this large default to block mode.
const BLOCK_MODE_CUTOVER: u64 = 16 * MB;

/// Size of the shared index filter built with `--index`.
const INDEX_SIZE: u64 = 64 * MB;

#[derive(Parser)]
#[command(
    name = "sdhash",
    about = "Compute and compare similarity digests",
    version
)]
struct Cli {
    /// Files to digest, or digest files in compare/validate modes
    files: Vec<PathBuf>,

    /// Compare digests: one digest file for all pairs, two for cross-compare
    #[arg(short = 'c', long)]
    compare: bool,

    /// Digest the inputs, then compare all pairs
    #[arg(short = 'g', long)]
    gen_compare: bool,

    /// Only show comparison results with at least this score
    #[arg(short = 't', long, default_value_t = 1)]
    threshold: i32,

    /// Digest input in N KiB blocks; 0 forces stream mode. Unset: stream
    /// under 16 MiB, 16 KiB blocks above
    #[arg(short = 'b', long, value_name = "N")]
    block_size: Option<u32>,

    /// Sample N filters per comparison; 0 compares everything
    #[arg(short = 's', long, default_value_t = 0, value_name = "N")]
    sample_size: u32,

    /// Fold digests before comparing: faster, lossier
    #[arg(long)]
    fast: bool,

    /// Separator for comparison output
    #[arg(long, default_value_t = '|')]
    separator: char,

    /// Write output to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also build one shared index over all inputs, written to FILE.idx
    /// (requires -o)
    #[arg(long)]
    index: bool,

    /// Parse digest files and report the number of valid digests
    #[arg(long)]
    validate: bool,

    /// Verbose progress output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sdbf=debug,sdbf_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.files.is_empty() {
        bail!("no input files; see --help");
    }
    if cli.index && cli.output.is_none() {
        bail!("--index requires -o");
    }

    if cli.validate {
        validate(&cli)
    } else if cli.compare {
        compare(&cli)
    } else {
        hash(&cli)
    }
}

fn validate(cli: &Cli) -> Result<()> {
    for file in &cli.files {
        match SdbfSet::from_file(file) {
            Ok(set) => println!("{}: {} valid digests", file.display(), set.len()),
            Err(err) => warn!("{} is not a valid digest file: {err}", file.display()),
        }
    }
    Ok(())
}

fn compare(cli: &Cli) -> Result<()> {
    let rows = match cli.files.as_slice() {
        [single] => {
            let mut set = SdbfSet::from_file(single)
                .with_context(|| format!("failed to load {}", single.display()))?;
            if cli.fast {
                set.fast_all();
            }
            set.compare_all(cli.threshold)
        }
        [queries, targets] => {
            let mut set1 = SdbfSet::from_file(queries)
                .with_context(|| format!("failed to load {}", queries.display()))?;
            let mut set2 = SdbfSet::from_file(targets)
                .with_context(|| format!("failed to load {}", targets.display()))?;
            if cli.fast {
                set1.fast_all();
                set2.fast_all();
            }
            set1.compare_to(&set2, cli.threshold, cli.sample_size)
        }
        _ => bail!("comparison takes one or two digest files"),
    };

    let mut out = String::new();
    for row in &rows {
        out.push_str(&row.render(cli.separator));
        out.push('\n');
    }
    emit(cli, &out)
}

fn hash(cli: &Cli) -> Result<()> {
    let mut index = if cli.index {
        Some(BloomFilter::new(INDEX_SIZE, 5, 0)?)
    } else {
        None
    };

    let mut set = SdbfSet::new("output");
    for file in &cli.files {
        let data = match read_input(file) {
            Ok(data) => data,
            Err(err) => {
                warn!("skipping {}: {err}", file.display());
                continue;
            }
        };
        let block_size = block_size_for(cli, data.len() as u64);
        debug!(
            file = %file.display(),
            block_size,
            "digesting"
        );
        let mut builder = SdbfBuilder::new(file.to_string_lossy()).block_size(block_size);
        if let Some(bf) = index.take() {
            builder = builder.initial_index(bf);
        }
        let mut digest = builder
            .build(&data)
            .with_context(|| format!("failed to digest {}", file.display()))?;
        index = digest.take_index();
        set.push(digest);
    }
    if set.is_empty() {
        bail!("no inputs could be digested");
    }

    if cli.gen_compare {
        let mut out = String::new();
        for row in set.compare_all(cli.threshold) {
            out.push_str(&row.render(cli.separator));
            out.push('\n');
        }
        emit(cli, &out)?;
    } else {
        emit(cli, &set.to_string())?;
    }

    if let (Some(bf), Some(output)) = (index, &cli.output) {
        let path = output.with_extension("idx");
        bf.write_to_file(&path)
            .with_context(|| format!("failed to write index {}", path.display()))?;
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        bail!("not a regular file");
    }
    if meta.len() < sdbf::tables::MIN_FILE_SIZE as u64 {
        bail!("too small to digest ({} bytes)", meta.len());
    }
    Ok(fs::read(path)?)
}

/// Resolves the effective block size in bytes for one input.
fn block_size_for(cli: &Cli, input_size: u64) -> u32 {
    match cli.block_size {
        Some(0) => 0,
        Some(kb) => kb.min(MAX_BLOCK_KB) * KB as u32,
        None if input_size < BLOCK_MODE_CUTOVER => 0,
        None => MAX_BLOCK_KB * KB as u32,
    }
}

fn emit(cli: &Cli, content: &str) -> Result<()> {
    match &cli.output {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(content.as_bytes())?,
    }
    Ok(())
}
