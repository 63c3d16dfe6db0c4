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

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_traits::Float;
use rand::prelude::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::{Error, Group};

/// Number of relabeling rounds used when nothing else is asked for.
pub const DEFAULT_SIMULATIONS: usize = 10_000;

/// Draws allowed for a single [`Relabeling::CoinFlip`] round before giving up.
const MAX_RELABEL_ATTEMPTS: usize = 1_000;

/// Largest pool [`exact_permutation_ht`] will enumerate.
pub const MAX_EXACT_POOL: usize = 20;

/// Part of the statistic distribution to use for the p-value
/// https://en.wikipedia.org/wiki/P-value#Probability_of_obtaining_a_real-valued_test_statistic_at_least_as_extreme_as_the_one_actually_obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PValueType {
    /// Two-sided test - twice the smaller tail, capped at 1
    /// min(1, 2 * min (Pr(T >= t | H0), Pr(T <= t | H0)))
    TwoSided,
    /// One-sided test (right tail)
    /// Pr(T >= t | H0)
    #[default]
    OneSidedRightTail,
    /// One-sided test (left tail)
    /// Pr(T <= t | H0)
    OneSidedLeftTail,
}

/// How group labels are redistributed over the pooled values in each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relabeling {
    /// Shuffle the label vector. Group sizes stay those of the observed data.
    #[default]
    Shuffle,
    /// Every value independently lands in A or B with probability 1/2.
    /// Draws leaving a group empty are discarded and redrawn.
    CoinFlip,
}

impl fmt::Display for PValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PValueType::TwoSided => write!(f, "two-sided"),
            PValueType::OneSidedRightTail => write!(f, "right tail"),
            PValueType::OneSidedLeftTail => write!(f, "left tail"),
        }
    }
}

impl fmt::Display for Relabeling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relabeling::Shuffle => write!(f, "shuffle"),
            Relabeling::CoinFlip => write!(f, "coin flip"),
        }
    }
}

/// Parameters of a permutation test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermutationConfig {
    /// number of relabeling rounds, i.e. the length of the null distribution
    pub simulations: usize,
    /// relabeling scheme
    pub relabeling: Relabeling,
    /// tail(s) counted in the p-value
    pub pvalue_type: PValueType,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            relabeling: Relabeling::default(),
            pvalue_type: PValueType::default(),
        }
    }
}

impl PermutationConfig {
    /// Set the number of relabeling rounds.
    pub fn with_simulations(mut self, simulations: usize) -> Self {
        self.simulations = simulations;
        self
    }

    /// Set the relabeling scheme.
    pub fn with_relabeling(mut self, relabeling: Relabeling) -> Self {
        self.relabeling = relabeling;
        self
    }

    /// Set the tail(s) used for the p-value.
    pub fn with_pvalue_type(mut self, pvalue_type: PValueType) -> Self {
        self.pvalue_type = pvalue_type;
        self
    }

    /// Check the configuration can drive a run.
    pub fn validate(&self) -> Result<(), Error> {
        if self.simulations == 0 {
            return Err(Error::InvalidConfiguration(
                "the number of simulations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked once per relabeling round.
///
/// Clones share the same flag, so one can be handed to another thread and
/// cancelled from there.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every run observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one permutation test run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult<F> {
    observed_difference: F,
    null_distribution: Vec<F>,
    p_value: F,
    n_a: usize,
    n_b: usize,
    config: PermutationConfig,
}

impl<F: Float> TestResult<F> {
    /// `mean(b) - mean(a)` on the observed grouping.
    pub fn observed_difference(&self) -> F {
        self.observed_difference
    }

    /// Differences obtained on the relabeled pools, in simulation order.
    pub fn null_distribution(&self) -> &[F] {
        &self.null_distribution
    }

    /// Fraction of the null distribution at least as extreme as the observed
    /// difference.
    pub fn p_value(&self) -> F {
        self.p_value
    }

    /// Number of observations in group A.
    pub fn n_a(&self) -> usize {
        self.n_a
    }

    /// Number of observations in group B.
    pub fn n_b(&self) -> usize {
        self.n_b
    }

    /// Configuration the run was performed with.
    pub fn config(&self) -> &PermutationConfig {
        &self.config
    }
}

fn as_float<F: Float>(n: usize) -> Result<F, Error> {
    F::from(n).ok_or(Error::NotRepresentable(n))
}

/// Difference of the means of the values labeled B and the values labeled A.
fn labeled_difference<F: Float>(pool: &[F], labels: &[Group]) -> Result<F, Error> {
    let mut sum_a = F::zero();
    let mut sum_b = F::zero();
    let mut n_a = 0;
    let mut n_b = 0;

    for (&value, &label) in pool.iter().zip(labels) {
        match label {
            Group::A => {
                sum_a = sum_a + value;
                n_a += 1;
            }
            Group::B => {
                sum_b = sum_b + value;
                n_b += 1;
            }
        }
    }

    if n_a == 0 {
        return Err(Error::EmptyGroup(Group::A));
    }
    if n_b == 0 {
        return Err(Error::EmptyGroup(Group::B));
    }

    Ok(sum_b / as_float(n_b)? - sum_a / as_float(n_a)?)
}

/// Labels for the observed grouping: `n_a` times A followed by `n_b` times B.
fn original_labels(n_a: usize, n_b: usize) -> Vec<Group> {
    let mut labels = vec![Group::A; n_a + n_b];
    for label in labels.iter_mut().skip(n_a) {
        *label = Group::B;
    }
    labels
}

/// Redistribute `labels` in place according to `relabeling`.
fn relabel<R: Rng + ?Sized>(
    rng: &mut R,
    labels: &mut [Group],
    relabeling: Relabeling,
) -> Result<(), Error> {
    match relabeling {
        Relabeling::Shuffle => {
            labels.shuffle(rng);
            Ok(())
        }
        Relabeling::CoinFlip => {
            for _ in 0..MAX_RELABEL_ATTEMPTS {
                for label in labels.iter_mut() {
                    *label = if rng.gen_bool(0.5) { Group::B } else { Group::A };
                }

                let n_b = labels.iter().filter(|&&label| label == Group::B).count();
                if n_b != 0 && n_b != labels.len() {
                    return Ok(());
                }
                tracing::trace!(n_b, "discarding relabeling with an empty group");
            }
            Err(Error::EmptyPartition {
                attempts: MAX_RELABEL_ATTEMPTS,
            })
        }
    }
}

fn p_value<F: Float>(t_stat: F, t_stat_dist: &[F], pvalue_type: PValueType) -> Result<F, Error> {
    let rep = as_float::<F>(t_stat_dist.len())?;

    let right_p_value = || -> Result<F, Error> {
        Ok(as_float::<F>(t_stat_dist.iter().filter(|&&t| t >= t_stat).count())? / rep)
    };
    let left_p_value = || -> Result<F, Error> {
        Ok(as_float::<F>(t_stat_dist.iter().filter(|&&t| t <= t_stat).count())? / rep)
    };

    let p_value = match pvalue_type {
        PValueType::OneSidedRightTail => right_p_value()?,
        PValueType::OneSidedLeftTail => left_p_value()?,
        PValueType::TwoSided => {
            let min = right_p_value()?.min(left_p_value()?);
            (min + min).min(F::one())
        }
    };

    Ok(p_value)
}

fn check_values<F: Float>(a: &[F], b: &[F]) -> Result<(), Error> {
    if a.is_empty() && b.is_empty() {
        return Err(Error::InvalidConfiguration(
            "no observations in either group".to_string(),
        ));
    }
    for (group, values) in [(Group::A, a), (Group::B, b)] {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "observation {i} of group {group} is not a finite number"
            )));
        }
    }
    Ok(())
}

fn check_input<F: Float>(a: &[F], b: &[F], config: &PermutationConfig) -> Result<(), Error> {
    config.validate()?;
    check_values(a, b)
}

/// Difference of the means of `b` and `a`: `mean(b) - mean(a)`.
///
/// Fails with [`Error::EmptyGroup`] when either group is empty.
///
/// ```rust
/// use permutation_ht::prelude::*;
///
/// let d = permutation::observed_difference(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(d, 3.0);
/// ```
pub fn observed_difference<F: Float>(a: &[F], b: &[F]) -> Result<F, Error> {
    if a.is_empty() {
        return Err(Error::EmptyGroup(Group::A));
    }
    if b.is_empty() {
        return Err(Error::EmptyGroup(Group::B));
    }

    let pool = [a, b].concat();
    labeled_difference(&pool, &original_labels(a.len(), b.len()))
}

/// Perform a permutation test of the difference of the means of `b` and `a`.
///
/// # Description
///
/// The null hypothesis is that the group labels carry no information: any
/// assignment of the pooled values to A and B was as likely as the observed one.
///
/// The values of `a` and `b` are pooled and, `config.simulations` times, the
/// labels are redistributed over the pool (see [`Relabeling`]) and
/// `mean(B) - mean(A)` is recomputed. These differences form the null
/// distribution. The p-value is the fraction of it at least as extreme as the
/// observed difference, extreme being defined by `config.pvalue_type` (see
/// [`PValueType`]). The default is the upper tail only: a negative observed
/// difference is not mirrored.
///
/// The random stream is owned by the caller, so seeding `rng` makes the run
/// reproducible.
///
/// Note `a` and `b` need not be of the same size.
///
/// # Example
///
/// ```rust
/// use permutation_ht::prelude::*;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
///
/// let a: [f64; 3] = [1.0, 1.0, 1.0];
/// let b = [10.0, 10.0, 10.0];
///
/// let result =
///     permutation::permutation_ht(&mut rng, &a, &b, &PermutationConfig::default()).unwrap();
///
/// assert_eq!(result.observed_difference(), 9.0);
/// assert_eq!(result.null_distribution().len(), 10_000);
/// // only 1 of the 20 ways to pick B reaches 9
/// assert!((result.p_value() - 0.05).abs() < 0.02);
/// ```
pub fn permutation_ht<R: Rng + ?Sized, F: Float>(
    rng: &mut R,
    a: &[F],
    b: &[F],
    config: &PermutationConfig,
) -> Result<TestResult<F>, Error> {
    run(rng, a, b, config, None)
}

/// Same as [`permutation_ht`], giving up with [`Error::Cancelled`] as soon as
/// `token` is cancelled.
pub fn permutation_ht_cancellable<R: Rng + ?Sized, F: Float>(
    rng: &mut R,
    a: &[F],
    b: &[F],
    config: &PermutationConfig,
    token: &CancellationToken,
) -> Result<TestResult<F>, Error> {
    run(rng, a, b, config, Some(token))
}

/// Same as [`permutation_ht`] with a generator seeded from `seed`, or from the
/// operating system when `seed` is `None`.
///
/// ```rust
/// use permutation_ht::prelude::*;
///
/// let config = PermutationConfig::default().with_simulations(1_000);
/// let a = [2.1, 3.4, 1.9, 2.8];
/// let b = [3.9, 4.2, 2.7, 5.1, 3.3];
///
/// let first = permutation::permutation_ht_with_seed(&a, &b, &config, Some(7)).unwrap();
/// let second = permutation::permutation_ht_with_seed(&a, &b, &config, Some(7)).unwrap();
/// assert_eq!(first, second);
/// ```
pub fn permutation_ht_with_seed<F: Float>(
    a: &[F],
    b: &[F],
    config: &PermutationConfig,
    seed: Option<u64>,
) -> Result<TestResult<F>, Error> {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    permutation_ht(&mut rng, a, b, config)
}

fn run<R: Rng + ?Sized, F: Float>(
    rng: &mut R,
    a: &[F],
    b: &[F],
    config: &PermutationConfig,
    token: Option<&CancellationToken>,
) -> Result<TestResult<F>, Error> {
    check_input(a, b, config)?;

    // the test statistic for the observed data
    let t_stat = observed_difference(a, b)?;

    tracing::debug!(
        n_a = a.len(),
        n_b = b.len(),
        simulations = config.simulations,
        relabeling = ?config.relabeling,
        observed_difference = ?t_stat.to_f64(),
        "running permutation test"
    );

    let reference = [a, b].concat();
    let mut labels = original_labels(a.len(), b.len());

    // the test statistic distribution under the null hypothesis (labels are
    // exchangeable)
    let mut t_stat_dist = Vec::new();
    t_stat_dist.try_reserve_exact(config.simulations).map_err(|e| {
        Error::InvalidConfiguration(format!(
            "cannot hold {} simulated differences: {e}",
            config.simulations
        ))
    })?;

    for _ in 0..config.simulations {
        if token.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(done = t_stat_dist.len(), "permutation test cancelled");
            return Err(Error::Cancelled);
        }

        relabel(rng, &mut labels, config.relabeling)?;
        t_stat_dist.push(labeled_difference(&reference, &labels)?);
    }

    let p_value = p_value(t_stat, &t_stat_dist, config.pvalue_type)?;

    tracing::debug!(p_value = ?p_value.to_f64(), "permutation test done");

    Ok(TestResult {
        observed_difference: t_stat,
        null_distribution: t_stat_dist,
        p_value,
        n_a: a.len(),
        n_b: b.len(),
        config: *config,
    })
}

/// Exact p-value of the permutation test, obtained by enumerating every
/// labeling the relabeling scheme can produce instead of sampling them.
///
/// With [`Relabeling::Shuffle`] these are the labelings with as many B as `b`
/// has values, with [`Relabeling::CoinFlip`] all labelings leaving neither
/// group empty. All are equally likely. Pools larger than [`MAX_EXACT_POOL`]
/// are rejected.
pub fn exact_permutation_ht<F: Float>(
    a: &[F],
    b: &[F],
    relabeling: Relabeling,
    pvalue_type: PValueType,
) -> Result<F, Error> {
    check_values(a, b)?;
    let t_stat = observed_difference(a, b)?;

    let reference = [a, b].concat();
    let n = reference.len();
    if n > MAX_EXACT_POOL {
        return Err(Error::InvalidConfiguration(format!(
            "exact enumeration supports at most {MAX_EXACT_POOL} values, got {n}"
        )));
    }

    let mut labels = vec![Group::A; n];
    let mut t_stat_dist = Vec::new();

    for mask in 0u32..(1u32 << n) {
        let n_b = mask.count_ones() as usize;
        let admissible = match relabeling {
            Relabeling::Shuffle => n_b == b.len(),
            Relabeling::CoinFlip => n_b != 0 && n_b != n,
        };
        if !admissible {
            continue;
        }

        for (i, label) in labels.iter_mut().enumerate() {
            *label = if mask & (1 << i) != 0 {
                Group::B
            } else {
                Group::A
            };
        }
        t_stat_dist.push(labeled_difference(&reference, &labels)?);
    }

    tracing::debug!(labelings = t_stat_dist.len(), "enumerated labelings");

    p_value(t_stat, &t_stat_dist, pvalue_type)
}
