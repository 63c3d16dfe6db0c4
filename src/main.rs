// Copyright (c) 2022. Sebastien Soudan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http:www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `permtest`: permutation test of the difference of two group means.

use std::fs::{self, File};
use std::io::BufWriter;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use permutation_ht::cli::{Cli, OutputFormat};
use permutation_ht::input::InputWarning;
use permutation_ht::prelude::*;
use permutation_ht::report::{Summary, SvgOptions};
use tracing_subscriber::EnvFilter;

/// Log to stderr, `-v` flags raise the level, `RUST_LOG` overrides it.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// The two samples to compare and what was skipped while reading them.
struct Groups {
    a: Vec<f64>,
    b: Vec<f64>,
    warnings: Vec<InputWarning>,
    contains_text: bool,
}

fn load_groups(cli: &Cli) -> Result<Groups> {
    match (&cli.file, &cli.group_a, &cli.group_b) {
        (Some(path), _, _) => {
            let options = cli
                .read_options()
                .ok_or_else(|| anyhow!("delimiter {:?} is not an ASCII character", cli.delimiter))?;
            let dataset = dataset::read_observations_from_path(path, &options)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let (a, b) = split_groups(&dataset.observations);
            Ok(Groups {
                a,
                b,
                warnings: dataset.warnings,
                contains_text: false,
            })
        }
        (None, Some(text_a), Some(text_b)) => {
            let parsed_a = input::parse_numbers(text_a);
            let parsed_b = input::parse_numbers(text_b);
            let contains_text = parsed_a.contains_text || parsed_b.contains_text;
            if contains_text {
                tracing::warn!("found text in input");
            }

            let mut warnings = parsed_a.warnings;
            warnings.extend(parsed_b.warnings);
            Ok(Groups {
                a: parsed_a.values,
                b: parsed_b.values,
                warnings,
                contains_text,
            })
        }
        _ => bail!("give either FILE or both --group-a and --group-b"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let groups = load_groups(&cli)?;
    tracing::info!(
        n_a = groups.a.len(),
        n_b = groups.b.len(),
        skipped = groups.warnings.len(),
        "loaded groups"
    );

    let result =
        permutation::permutation_ht_with_seed(&groups.a, &groups.b, &cli.config(), cli.seed)
            .context("permutation test failed")?;

    if let Some(path) = &cli.histogram {
        let options = SvgOptions {
            bins: cli.bins,
            ..Default::default()
        };
        fs::write(path, report::render_svg(&result, &options))
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote histogram");
    }

    if let Some(path) = &cli.distribution {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        report::write_distribution_csv(BufWriter::new(file), &result)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote null distribution");
    }

    let summary = Summary::new(&result, cli.seed, groups.warnings)
        .with_contains_text(groups.contains_text);
    match cli.format {
        OutputFormat::Text => print!("{}", summary.to_text()),
        OutputFormat::Json => println!("{}", summary.to_json()?),
    }

    Ok(())
}
