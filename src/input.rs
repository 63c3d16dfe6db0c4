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

//! Numbers typed or pasted as free text.
//!
//! Anything that looks like a number is kept, everything else is skipped and
//! reported as an [`InputWarning`]. Stray text never makes parsing fail.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::{Group, Observation};

/// Numeric literal: optional sign, optional thousands separators, optional
/// decimal part and exponent. `.5`, `-2`, `4,000`, `1.5e-3` all match.
pub const NUMBER_PATTERN: &str = r"[-+]?[.]?\d+(?:,\d\d\d)*[.]?\d*(?:[eE][-+]?\d+)?";

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NUMBER_PATTERN).expect("NUMBER_PATTERN is a valid regex"))
}

/// Something in the input was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputWarning {
    /// Text between numbers that is not a number.
    NonNumericToken {
        /// the skipped text
        token: String,
    },
    /// A row of a delimited file that could not be turned into an observation.
    SkippedRow {
        /// 1-based line in the file
        line: u64,
        /// why it was skipped
        reason: String,
    },
}

impl fmt::Display for InputWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputWarning::NonNumericToken { token } => {
                write!(f, "skipped non-numeric token {token:?}")
            }
            InputWarning::SkippedRow { line, reason } => {
                write!(f, "skipped line {line}: {reason}")
            }
        }
    }
}

/// Numbers found in a block of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedNumbers {
    /// the numbers, in the order they appear
    pub values: Vec<f64>,
    /// skipped tokens
    pub warnings: Vec<InputWarning>,
    /// whether the raw text contains any letter
    pub contains_text: bool,
}

impl ParsedNumbers {
    /// Tag every value with `group`.
    pub fn to_observations(&self, group: Group) -> Vec<Observation<f64>> {
        self.values
            .iter()
            .map(|&value| Observation::new(group, value))
            .collect()
    }
}

fn stray_tokens(gap: &str, warnings: &mut Vec<InputWarning>) {
    for token in gap
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|token| !token.is_empty())
    {
        warnings.push(InputWarning::NonNumericToken {
            token: token.to_string(),
        });
    }
}

/// Extract the numbers of `text`.
///
/// Numbers may be separated by whitespace, commas or newlines. Thousands
/// separators inside a number are dropped before conversion, so `4,000` reads
/// as 4000 while `4, 000` reads as 4 and 0.
///
/// ```rust
/// use permutation_ht::input::parse_numbers;
///
/// let parsed = parse_numbers("3.5, -2, 1e3, abc, 4,000");
/// assert_eq!(parsed.values, vec![3.5, -2.0, 1000.0, 4000.0]);
/// assert!(parsed.contains_text);
/// assert_eq!(parsed.warnings.len(), 1);
/// ```
pub fn parse_numbers(text: &str) -> ParsedNumbers {
    let mut parsed = ParsedNumbers {
        contains_text: text.chars().any(|c| c.is_ascii_alphabetic()),
        ..Default::default()
    };

    let mut last = 0;
    for m in number_regex().find_iter(text) {
        stray_tokens(&text[last..m.start()], &mut parsed.warnings);

        // overflowing literals such as 1e999 parse as infinity
        match m.as_str().replace(',', "").parse::<f64>() {
            Ok(value) if value.is_finite() => parsed.values.push(value),
            _ => parsed.warnings.push(InputWarning::NonNumericToken {
                token: m.as_str().to_string(),
            }),
        }
        last = m.end();
    }
    stray_tokens(&text[last..], &mut parsed.warnings);

    for warning in &parsed.warnings {
        tracing::warn!("{warning}");
    }

    parsed
}
