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

//! CLI argument parsing for `permtest`

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::dataset::{Column, ReadOptions};
use crate::permutation::{PValueType, PermutationConfig, Relabeling, DEFAULT_SIMULATIONS};
use crate::report::DEFAULT_BINS;

/// Format of the report printed on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// JSON for machine parsing
    Json,
}

/// Relabeling scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelabelingArg {
    /// Shuffle the labels, group sizes are kept
    Shuffle,
    /// Draw each label independently, group sizes vary
    CoinFlip,
}

impl From<RelabelingArg> for Relabeling {
    fn from(arg: RelabelingArg) -> Self {
        match arg {
            RelabelingArg::Shuffle => Relabeling::Shuffle,
            RelabelingArg::CoinFlip => Relabeling::CoinFlip,
        }
    }
}

/// Tail(s) of the null distribution counted in the p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tail {
    /// Differences at least as large as observed (default)
    Right,
    /// Differences at most as large as observed
    Left,
    /// Twice the smaller tail
    TwoSided,
}

impl From<Tail> for PValueType {
    fn from(tail: Tail) -> Self {
        match tail {
            Tail::Right => PValueType::OneSidedRightTail,
            Tail::Left => PValueType::OneSidedLeftTail,
            Tail::TwoSided => PValueType::TwoSided,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "permtest")]
#[command(version)]
#[command(
    about = "Permutation test of the difference of the means of two groups (mean B - mean A)",
    long_about = None
)]
pub struct Cli {
    /// Delimited file with one observation per row: group indicator (0/1) and measurement
    #[arg(
        value_name = "FILE",
        required_unless_present_all = ["group_a", "group_b"],
        conflicts_with_all = ["group_a", "group_b"]
    )]
    pub file: Option<PathBuf>,

    /// Measurements of group A as free text (e.g. "3.5, 4 2.25")
    #[arg(short = 'a', long = "group-a", value_name = "TEXT", requires = "group_b")]
    pub group_a: Option<String>,

    /// Measurements of group B as free text
    #[arg(short = 'b', long = "group-b", value_name = "TEXT", requires = "group_a")]
    pub group_b: Option<String>,

    /// Number of relabeling rounds
    #[arg(short = 'n', long, value_name = "N", default_value_t = DEFAULT_SIMULATIONS)]
    pub simulations: usize,

    /// Seed of the random stream, for reproducible runs
    #[arg(short, long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// How labels are redistributed in each round
    #[arg(long, value_enum, default_value = "shuffle")]
    pub relabeling: RelabelingArg,

    /// Tail(s) counted in the p-value
    #[arg(long, value_enum, default_value = "right")]
    pub tail: Tail,

    /// Field delimiter of FILE
    #[arg(long, value_name = "CHAR", default_value_t = ',')]
    pub delimiter: char,

    /// FILE has no header row
    #[arg(long = "no-header")]
    pub no_header: bool,

    /// Column of FILE holding the group indicator (zero-based position or header name)
    #[arg(long, value_name = "COLUMN", default_value = "0")]
    pub group_column: Column,

    /// Column of FILE holding the measurement (zero-based position or header name)
    #[arg(long, value_name = "COLUMN", default_value = "1")]
    pub value_column: Column,

    /// Write a histogram of the null distribution to this SVG file
    #[arg(long, value_name = "PATH")]
    pub histogram: Option<PathBuf>,

    /// Number of histogram bins
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BINS)]
    pub bins: usize,

    /// Write the null distribution to this CSV file
    #[arg(long, value_name = "PATH")]
    pub distribution: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Test parameters selected on the command line.
    pub fn config(&self) -> PermutationConfig {
        PermutationConfig::default()
            .with_simulations(self.simulations)
            .with_relabeling(self.relabeling.into())
            .with_pvalue_type(self.tail.into())
    }

    /// How FILE should be read, `None` if the delimiter is not a single ASCII
    /// character.
    pub fn read_options(&self) -> Option<ReadOptions> {
        if !self.delimiter.is_ascii() {
            return None;
        }
        Some(ReadOptions {
            delimiter: self.delimiter as u8,
            has_headers: !self.no_header,
            group_column: self.group_column.clone(),
            value_column: self.value_column.clone(),
        })
    }
}
