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
//! We have measurements from two groups and want to know whether the difference of
//! their means is larger than what chance alone would produce, without assuming
//! anything about the distribution the measurements come from.
//!
//! If the group labels carry no information (H0), any assignment of the pooled
//! measurements to the two groups was as likely as the one we observed. So we
//! relabel the pool many times, recompute the difference of the means each time and
//! get the sampling distribution of the statistic under H0 - the null distribution.
//!
//! The p-value is the fraction of that distribution at least as 'extreme' as the
//! observed difference. By default only the upper tail counts: we test whether group
//! B has a larger mean than group A.
//!
//! # References
//! - [Permutation test](https://en.wikipedia.org/wiki/Permutation_test)
//! - [P-value](https://en.wikipedia.org/wiki/P-value)
//! - [Statistics for Hackers, Jake VanderPlas](https://www.youtube.com/watch?v=Iq9DzN6mvYA)
//!
//! # Example
//!
//! ```rust
//! use permutation_ht::prelude::*;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! let parsed_a = input::parse_numbers("84, 72, 57, 46, 63, 76, 99, 91");
//! let parsed_b = input::parse_numbers("81 69 74 61 56 87 69 65 66 44 62 69");
//!
//! let config = PermutationConfig::default().with_pvalue_type(PValueType::OneSidedLeftTail);
//! let result =
//!     permutation::permutation_ht(&mut rng, &parsed_a.values, &parsed_b.values, &config)
//!         .unwrap();
//!
//! assert!(result.observed_difference() < 0.0);
//! assert!(result.p_value() > 0.0 && result.p_value() < 1.0);
//! println!("{}", report::format_p_value_percent(result.p_value()));
//! ```

/// permutation hypothesis test
pub mod permutation {
    pub use crate::permutation::{
        exact_permutation_ht, observed_difference, permutation_ht, permutation_ht_cancellable,
        permutation_ht_with_seed, CancellationToken, PValueType, PermutationConfig, Relabeling,
        TestResult, DEFAULT_SIMULATIONS, MAX_EXACT_POOL,
    };
}

pub use crate::permutation::{PValueType, PermutationConfig, Relabeling, TestResult};
pub use crate::{dataset, input, report, split_groups, Error, Group, Observation};
