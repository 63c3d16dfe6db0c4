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

//! Permutation Hypothesis Testing
//!
//! Check the [`prelude`] module for the public API.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The prelude module re-exports the most commonly used types and traits.
/// This is the public API. Enjoy!
pub mod prelude;

#[cfg(any(feature = "unstable", test))]
/// unstable permutation API
pub mod permutation;

#[cfg(not(any(feature = "unstable", test)))]
pub(crate) mod permutation;

/// Free-text numeric input
pub mod input;

/// Delimited file input
pub mod dataset;

/// Histogram, SVG and summaries
pub mod report;

/// Command line of the `permtest` binary
pub mod cli;

/// One of the two groups being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Group {
    /// The reference group. Its mean is subtracted.
    A,
    /// The treatment group.
    B,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::A => write!(f, "A"),
            Group::B => write!(f, "B"),
        }
    }
}

/// A measurement tagged with the group it was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation<F> {
    /// group label
    pub group: Group,
    /// measured value
    pub value: F,
}

impl<F> Observation<F> {
    /// Build an observation.
    pub fn new(group: Group, value: F) -> Self {
        Self { group, value }
    }
}

/// Split observations into the values of group A and group B, preserving
/// their order.
pub fn split_groups<F: Copy>(observations: &[Observation<F>]) -> (Vec<F>, Vec<F>) {
    let mut a = Vec::new();
    let mut b = Vec::new();
    for o in observations {
        match o.group {
            Group::A => a.push(o.value),
            Group::B => b.push(o.value),
        }
    }
    (a, b)
}

/// The error type for this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A group has no observations, its mean is undefined.
    #[error("group {0} has no observations")]
    EmptyGroup(Group),
    /// A relabeling round kept producing an empty partition.
    #[error("relabeling left one group empty after {attempts} attempts")]
    EmptyPartition {
        /// number of draws tried for the round
        attempts: usize,
    },
    /// The test cannot run with the given parameters or input.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The run was cancelled before completion.
    #[error("permutation test cancelled")]
    Cancelled,
    /// A count could not be converted to the floating point type.
    #[error("{0} is not representable in the floating point type")]
    NotRepresentable(usize),
}
