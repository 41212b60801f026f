//! Noisy local search over page distributions.
//!
//! The objective (readiness probability) is itself a finite Monte Carlo
//! estimate, so each iteration probes many candidates, keeps the best three and
//! also tries their probability-weighted blend instead of trusting any single
//! evaluation. The incumbent is always part of the ranking, which keeps the
//! reported probability non-decreasing from one iteration to the next.

use crate::config::OptimizerConfig;
use crate::engine::simulate_run;
use crate::error::Result;
use crate::rng::{Rng, Sampler};
use crate::selector::CumulativeTable;
use crate::worker::SimWorker;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Instant;

pub const TOP_CANDIDATES: usize = 3;
pub const MIN_CANDIDATES: usize = 3;
/// How strongly the direction bias nudges random perturbations.
pub const BIAS_WEIGHT: f64 = 0.1;
const BIAS_DECAY: f64 = 0.9;
const BIAS_KEEP: f64 = 0.7;
/// Random draws allowed per requested candidate before giving up on filling
/// the pool (every draw could zero out the distribution).
const MAX_DRAWS_PER_CANDIDATE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OptimizerParams {
    /// Perturbation range, in percent of each genre's current count.
    pub range: f64,
    pub iterations: usize,
    pub candidates: usize,
    pub samples: usize,
}

impl OptimizerParams {
    /// Non-positive counts are raised to 1 and a negative range to 0.
    pub fn clamped(self) -> Self {
        OptimizerParams {
            range: self.range.max(0.0),
            iterations: self.iterations.max(1),
            candidates: self.candidates.max(1),
            samples: self.samples.max(1),
        }
    }
}

impl From<&OptimizerConfig> for OptimizerParams {
    fn from(config: &OptimizerConfig) -> Self {
        OptimizerParams {
            range: config.range,
            iterations: config.iterations,
            candidates: config.candidates,
            samples: config.samples,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OptimizerResult {
    pub best_counts: Vec<f64>,
    pub best_prob: f64,
    pub direction_bias: Vec<f64>,
    /// `best_prob` after each iteration.
    pub history: Vec<f64>,
}

impl OptimizerResult {
    pub fn rounded_counts(&self) -> Vec<u32> {
        self.best_counts
            .iter()
            .map(|c| c.round().max(0.0) as u32)
            .collect()
    }
}

/// 1.0 on the first iteration, 0.6 on the last.
pub fn cooling_factor(iteration: usize, iterations: usize) -> f64 {
    let span = iterations.saturating_sub(1).max(1) as f64;
    0.6 + 0.4 * (1.0 - iteration as f64 / span)
}

/// Share of `samples` runs that end with every genre ready.
pub fn readiness_probability<S: Sampler + ?Sized>(
    counts: &[f64],
    start: &[u32],
    sequence: &[u32],
    samples: usize,
    sampler: &mut S,
) -> f64 {
    let table = CumulativeTable::from_weights(counts);
    let samples = samples.max(1);
    let ready = (0..samples)
        .filter(|_| simulate_run(start, sequence, &table, sampler).ready)
        .count();
    ready as f64 / samples as f64
}

/// For each genre with pages, one candidate scaled up by `range` percent and
/// one scaled down.
pub fn systematic_candidates(base: &[f64], range: f64) -> Vec<Vec<f64>> {
    let step = range / 100.0;
    let mut out = Vec::with_capacity(base.len() * 2);
    for (idx, &value) in base.iter().enumerate() {
        if value <= 0.0 {
            continue;
        }
        for factor in [1.0 + step, 1.0 - step] {
            let mut candidate = base.to_vec();
            candidate[idx] = (value * factor).max(0.0);
            if candidate.iter().sum::<f64>() > 0.0 {
                out.push(candidate);
            }
        }
    }
    out
}

/// Perturbs about half of the genres with pages by a random fraction within
/// `range` percent, nudged by the direction bias.
pub fn random_candidate<S: Sampler + ?Sized>(
    base: &[f64],
    range: f64,
    bias: &[f64],
    sampler: &mut S,
) -> Vec<f64> {
    let mut positive: Vec<usize> = (0..base.len()).filter(|&i| base[i] > 0.0).collect();
    if positive.is_empty() {
        positive = (0..base.len()).collect();
    }
    let subset = positive.len().div_ceil(2).max(1);
    let selected = if positive.len() > subset {
        sampler.choose_distinct(&positive, subset)
    } else {
        positive
    };
    let step = range / 100.0;
    let mut candidate = base.to_vec();
    for idx in selected {
        let nudge = bias.get(idx).copied().unwrap_or(0.0) * BIAS_WEIGHT;
        let delta = sampler.uniform(-step, step) + nudge;
        candidate[idx] = (base[idx] * (1.0 + delta)).max(0.0);
    }
    candidate
}

/// Probability-weighted average of the ranked candidates.
pub fn blend(ranked: &[(f64, Vec<f64>)]) -> Vec<f64> {
    let Some((_, first)) = ranked.first() else {
        return Vec::new();
    };
    let total: f64 = ranked.iter().map(|(p, _)| p).sum();
    if total <= 0.0 {
        return first.clone();
    }
    let mut blended = vec![0.0; first.len()];
    for (prob, counts) in ranked {
        let weight = prob / total;
        for (b, c) in blended.iter_mut().zip(counts) {
            *b += c * weight;
        }
    }
    blended
}

/// Exponentially smoothed sign of each genre's last accepted change.
pub fn update_direction_bias(bias: &[f64], previous: &[f64], current: &[f64]) -> Vec<f64> {
    bias.iter()
        .enumerate()
        .map(|(idx, &b)| {
            let delta = current.get(idx).copied().unwrap_or(0.0)
                - previous.get(idx).copied().unwrap_or(0.0);
            if delta == 0.0 {
                b * BIAS_DECAY
            } else {
                BIAS_KEEP * b + (1.0 - BIAS_KEEP) * delta.signum()
            }
        })
        .collect()
}

fn sanitize_counts(base_counts: &[f64]) -> Vec<f64> {
    let counts: Vec<f64> = base_counts.iter().map(|c| c.max(0.0)).collect();
    if counts.iter().sum::<f64>() <= 0.0 {
        vec![1.0; counts.len()]
    } else {
        counts
    }
}

/// The search loop with a pluggable batch evaluator.
///
/// `evaluate` returns one readiness estimate per candidate, in order. The
/// sampler drives candidate generation and is handed to the evaluator too.
pub fn optimize_with<S, E, Er>(
    base_counts: &[f64],
    params: OptimizerParams,
    sampler: &mut S,
    mut evaluate: E,
) -> std::result::Result<OptimizerResult, Er>
where
    S: Sampler + ?Sized,
    E: FnMut(&[Vec<f64>], &mut S) -> std::result::Result<Vec<f64>, Er>,
{
    let params = params.clamped();
    let mut best_counts = sanitize_counts(base_counts);
    let mut best_prob = evaluate(std::slice::from_ref(&best_counts), sampler)?
        .first()
        .copied()
        .unwrap_or(0.0);
    let mut direction_bias = vec![0.0; best_counts.len()];
    let mut history = Vec::with_capacity(params.iterations);

    for iteration in 0..params.iterations {
        let factor = cooling_factor(iteration, params.iterations);
        let range = (params.range * factor).max(1.0);
        let wanted = ((params.candidates as f64 * factor) as usize).max(MIN_CANDIDATES);

        let mut candidates = systematic_candidates(&best_counts, range);
        let mut draws = 0;
        while candidates.len() < wanted && draws < wanted * MAX_DRAWS_PER_CANDIDATE {
            draws += 1;
            let candidate = random_candidate(&best_counts, range, &direction_bias, sampler);
            if candidate.iter().sum::<f64>() > 0.0 {
                candidates.push(candidate);
            }
        }

        let probs = evaluate(&candidates, sampler)?;
        let mut ranked: Vec<(f64, Vec<f64>)> = probs.into_iter().zip(candidates).collect();
        ranked.push((best_prob, best_counts.clone()));
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(TOP_CANDIDATES);

        let blended = blend(&ranked);
        let blended_prob = evaluate(std::slice::from_ref(&blended), sampler)?
            .first()
            .copied()
            .unwrap_or(0.0);

        let previous = std::mem::take(&mut best_counts);
        let (top_prob, top_counts) = ranked.swap_remove(0);
        if blended_prob >= top_prob {
            best_counts = blended;
            best_prob = blended_prob;
        } else {
            best_counts = top_counts;
            best_prob = top_prob;
        }
        direction_bias = update_direction_bias(&direction_bias, &previous, &best_counts);
        history.push(best_prob);

        debug!(
            "iteration {}/{}: range {:.1}%, {} candidates, best {:.4}",
            iteration + 1,
            params.iterations,
            range,
            wanted,
            best_prob
        );
    }

    Ok(OptimizerResult {
        best_counts,
        best_prob,
        direction_bias,
        history,
    })
}

/// Single-threaded search; every evaluation draws from `sampler`.
pub fn optimize<S: Sampler + ?Sized>(
    start: &[u32],
    sequence: &[u32],
    base_counts: &[f64],
    params: OptimizerParams,
    sampler: &mut S,
) -> OptimizerResult {
    let samples = params.samples.max(1);
    let result = optimize_with(
        base_counts,
        params,
        sampler,
        |candidates, s| -> std::result::Result<Vec<f64>, Infallible> {
            Ok(candidates
                .iter()
                .map(|c| readiness_probability(c, start, sequence, samples, s))
                .collect())
        },
    );
    match result {
        Ok(r) => r,
        Err(never) => match never {},
    }
}

/// Search with candidate batches evaluated on the worker pool. Each candidate
/// gets a generator forked from a seed drawn from `rng`.
pub fn optimize_parallel(
    worker: &SimWorker,
    start: &[u32],
    sequence: &[u32],
    base_counts: &[f64],
    params: OptimizerParams,
    rng: &mut Rng,
) -> Result<OptimizerResult> {
    let samples = params.samples.max(1);
    let timer = Instant::now();
    info!(
        "Optimizing over {} iterations, {} candidates x {} samples",
        params.iterations, params.candidates, samples
    );
    let result = optimize_with(base_counts, params, rng, |candidates, rng| {
        let base_seed = rng.next_u64();
        worker.execute(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(i, c)| {
                    let mut local = Rng::fork(base_seed, i as u64);
                    readiness_probability(c, start, sequence, samples, &mut local)
                })
                .collect::<Vec<f64>>()
        })
    })?;
    info!(
        "Optimization finished in {:.2?}: best {:.4}",
        timer.elapsed(),
        result.best_prob
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::testing::ScriptedSampler;

    #[test]
    fn cooling_runs_from_one_to_point_six() {
        assert!((cooling_factor(0, 10) - 1.0).abs() < 1e-12);
        assert!((cooling_factor(9, 10) - 0.6).abs() < 1e-12);
        assert!((cooling_factor(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn params_are_clamped() {
        let p = OptimizerParams {
            range: -5.0,
            iterations: 0,
            candidates: 0,
            samples: 0,
        }
        .clamped();
        assert_eq!(p.range, 0.0);
        assert_eq!((p.iterations, p.candidates, p.samples), (1, 1, 1));
    }

    #[test]
    fn systematic_probes_each_positive_genre() {
        let c = systematic_candidates(&[10.0, 0.0, 20.0], 50.0);
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], vec![15.0, 0.0, 20.0]);
        assert_eq!(c[1], vec![5.0, 0.0, 20.0]);
        assert_eq!(c[3], vec![10.0, 0.0, 10.0]);
    }

    #[test]
    fn systematic_drops_all_zero_probe() {
        let c = systematic_candidates(&[10.0, 0.0], 100.0);
        assert_eq!(c, vec![vec![20.0, 0.0]]);
    }

    #[test]
    fn random_candidate_touches_half_the_genres() {
        // Draw 0.5 maps to a zero perturbation; bias 1.0 adds +10%.
        let mut sampler = ScriptedSampler::constant(0.5);
        let base = [10.0, 10.0, 10.0, 10.0];
        let c = random_candidate(&base, 20.0, &[1.0; 4], &mut sampler);
        let changed = c.iter().filter(|&&v| (v - 11.0).abs() < 1e-9).count();
        let kept = c.iter().filter(|&&v| v == 10.0).count();
        assert_eq!((changed, kept), (2, 2));
    }

    #[test]
    fn random_candidate_never_negative() {
        let mut rng = Rng::from_seed(31);
        for _ in 0..1_000 {
            let c = random_candidate(&[1.0, 2.0, 3.0], 300.0, &[-1.0; 3], &mut rng);
            assert!(c.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn blend_weights_by_probability() {
        let ranked = vec![(0.6, vec![10.0, 0.0]), (0.2, vec![0.0, 10.0]), (0.2, vec![0.0, 0.0])];
        let b = blend(&ranked);
        assert!((b[0] - 6.0).abs() < 1e-9);
        assert!((b[1] - 2.0).abs() < 1e-9);
        let zero = vec![(0.0, vec![1.0, 2.0]), (0.0, vec![3.0, 4.0])];
        assert_eq!(blend(&zero), vec![1.0, 2.0]);
    }

    #[test]
    fn bias_decays_or_follows_sign() {
        let b = update_direction_bias(&[0.5, 0.5, -1.0], &[1.0, 1.0, 1.0], &[1.0, 2.0, 0.0]);
        assert!((b[0] - 0.45).abs() < 1e-12);
        assert!((b[1] - 0.65).abs() < 1e-12);
        assert!((b[2] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn best_probability_never_decreases() {
        let mut rng = Rng::from_seed(5);
        let params = OptimizerParams {
            range: 30.0,
            iterations: 6,
            candidates: 6,
            samples: 300,
        };
        let result = optimize(&[0; 5], &[50; 10], &[1.0, 1.0, 1.0, 1.0, 1.0], params, &mut rng);
        assert_eq!(result.history.len(), 6);
        assert!(result.history.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(result.best_prob, *result.history.last().unwrap());
        assert!((0.0..=1.0).contains(&result.best_prob));
    }

    #[test]
    fn all_zero_counts_start_uniform() {
        let mut rng = Rng::from_seed(6);
        let params = OptimizerParams {
            range: 10.0,
            iterations: 2,
            candidates: 3,
            samples: 50,
        };
        let result = optimize(&[0; 3], &[50; 6], &[0.0; 3], params, &mut rng);
        assert_eq!(result.best_counts.len(), 3);
        assert!(result.best_counts.iter().sum::<f64>() > 0.0);
    }

    #[test]
    fn parallel_search_is_reproducible() {
        let worker = SimWorker::new(2).unwrap();
        let params = OptimizerParams {
            range: 20.0,
            iterations: 3,
            candidates: 5,
            samples: 200,
        };
        let run = || {
            let mut rng = Rng::from_seed(44);
            optimize_parallel(&worker, &[0; 5], &[50; 10], &[2.0, 1.0, 1.0, 1.0, 1.0], params, &mut rng)
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.best_counts, b.best_counts);
        assert_eq!(a.history, b.history);
        assert!(a.history.windows(2).all(|w| w[0] <= w[1]));
    }
}
