use crate::engine::RunOutcome;
use crate::error::Result;
use crate::extension::{simulate_with_extension, ExtensionConfig, TrialOutcome};
use crate::rng::{Rng, Sampler};
use crate::selector::CumulativeTable;
use crate::worker::SimWorker;
use log::info;
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_BREAKPOINTS: [u32; 3] = [80, 90, 93];
/// Second-stage pruning cut-off: genres strictly above it lose their pages.
pub const PRUNE_THRESHOLD: u32 = 90;
pub const PRUNE_THRESHOLD_EXTENDED: u32 = 93;

/// What the aggregator needs from one trial.
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    pub values: Vec<u32>,
    pub ready: bool,
    /// Whether auto-extend fired, one flag per stage.
    pub extensions: Vec<bool>,
}

impl From<RunOutcome> for Trial {
    fn from(run: RunOutcome) -> Self {
        Trial {
            values: run.values,
            ready: run.ready,
            extensions: vec![false],
        }
    }
}

impl From<TrialOutcome> for Trial {
    fn from(outcome: TrialOutcome) -> Self {
        Trial {
            values: outcome.values,
            ready: outcome.ready,
            extensions: vec![outcome.extended],
        }
    }
}

/// Running sums for a batch of trials. Tallies merge associatively, so chunks
/// can be counted on different threads.
#[derive(Clone, Debug, Default)]
pub struct Tally {
    runs: usize,
    ready_runs: usize,
    sums: Vec<u64>,
    breakpoints: Vec<u32>,
    /// `histograms[b][n]`: trials with exactly `n` genres above breakpoint `b`.
    histograms: Vec<Vec<usize>>,
    extension_counts: Vec<usize>,
}

impl Tally {
    pub fn new(breakpoints: &[u32]) -> Self {
        Tally {
            breakpoints: breakpoints.to_vec(),
            histograms: vec![Vec::new(); breakpoints.len()],
            ..Tally::default()
        }
    }

    fn ensure_size(&mut self, k: usize, stages: usize) {
        if self.sums.len() < k {
            self.sums.resize(k, 0);
        }
        for hist in &mut self.histograms {
            if hist.len() < k + 1 {
                hist.resize(k + 1, 0);
            }
        }
        if self.extension_counts.len() < stages {
            self.extension_counts.resize(stages, 0);
        }
    }

    pub fn record(&mut self, trial: &Trial) {
        self.ensure_size(trial.values.len(), trial.extensions.len());
        self.runs += 1;
        if trial.ready {
            self.ready_runs += 1;
        }
        for (sum, &v) in self.sums.iter_mut().zip(&trial.values) {
            *sum += v as u64;
        }
        for (hist, &bp) in self.histograms.iter_mut().zip(&self.breakpoints) {
            let above = trial.values.iter().filter(|&&v| v > bp).count();
            hist[above] += 1;
        }
        for (count, &ext) in self.extension_counts.iter_mut().zip(&trial.extensions) {
            if ext {
                *count += 1;
            }
        }
    }

    pub fn merge(mut self, other: Tally) -> Tally {
        if self.breakpoints.is_empty() {
            self.breakpoints = other.breakpoints.clone();
            self.histograms = vec![Vec::new(); self.breakpoints.len()];
        }
        let k = other.sums.len();
        let stages = other.extension_counts.len();
        self.ensure_size(k, stages);
        self.runs += other.runs;
        self.ready_runs += other.ready_runs;
        for (a, b) in self.sums.iter_mut().zip(other.sums) {
            *a += b;
        }
        for (hist, other_hist) in self.histograms.iter_mut().zip(other.histograms) {
            for (a, b) in hist.iter_mut().zip(other_hist) {
                *a += b;
            }
        }
        for (a, b) in self.extension_counts.iter_mut().zip(other.extension_counts) {
            *a += b;
        }
        self
    }

    pub fn finish(self) -> AggregateStats {
        let runs = self.runs;
        let denom = runs.max(1) as f64;
        AggregateStats {
            runs,
            averages: self.sums.iter().map(|&s| s as f64 / denom).collect(),
            ready_runs: self.ready_runs,
            readiness_ratio: self.ready_runs as f64 / denom,
            histograms: self
                .breakpoints
                .iter()
                .zip(self.histograms)
                .map(|(&threshold, counts)| BreakpointHistogram { threshold, counts })
                .collect(),
            extension_counts: self.extension_counts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakpointHistogram {
    pub threshold: u32,
    /// Indexed by the number of genres strictly above `threshold` (0..=K).
    pub counts: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateStats {
    pub runs: usize,
    pub averages: Vec<f64>,
    pub ready_runs: usize,
    pub readiness_ratio: f64,
    pub histograms: Vec<BreakpointHistogram>,
    /// Trials in which auto-extend fired, per stage.
    pub extension_counts: Vec<usize>,
}

impl AggregateStats {
    /// Fraction of trials with exactly `genres` genres above breakpoint `index`.
    pub fn share_above(&self, index: usize, genres: usize) -> f64 {
        self.histograms
            .get(index)
            .and_then(|h| h.counts.get(genres))
            .map_or(0.0, |&c| c as f64 / self.runs.max(1) as f64)
    }

    pub fn extension_rate(&self, stage: usize) -> f64 {
        self.extension_counts
            .get(stage)
            .map_or(0.0, |&c| c as f64 / self.runs.max(1) as f64)
    }

    pub fn avg_extensions(&self) -> f64 {
        self.extension_counts.iter().sum::<usize>() as f64 / self.runs.max(1) as f64
    }
}

/// Runs `samples` independent trials on one thread and reduces them.
pub fn aggregate<S, F>(
    mut trial_fn: F,
    samples: usize,
    breakpoints: &[u32],
    sampler: &mut S,
) -> AggregateStats
where
    S: Sampler + ?Sized,
    F: FnMut(&mut S) -> Trial,
{
    let mut tally = Tally::new(breakpoints);
    for _ in 0..samples.max(1) {
        let trial = trial_fn(sampler);
        tally.record(&trial);
    }
    tally.finish()
}

/// Parallel [`aggregate`]: chunks of trials run on the worker pool, each
/// chunk with a generator forked from `seed`.
pub fn aggregate_parallel<F>(
    worker: &SimWorker,
    trial_fn: F,
    samples: usize,
    breakpoints: &[u32],
    seed: u64,
) -> Result<AggregateStats>
where
    F: Fn(&mut Rng) -> Trial + Sync,
{
    let samples = samples.max(1);
    let start = Instant::now();
    let tally = worker.map_chunks(
        samples,
        seed,
        || Tally::new(breakpoints),
        |range, rng| {
            let mut tally = Tally::new(breakpoints);
            for _ in range {
                tally.record(&trial_fn(rng));
            }
            tally
        },
        Tally::merge,
    )?;
    info!(
        "Aggregated {} trials on {} threads in {:.2?}",
        samples,
        worker.thread_count(),
        start.elapsed()
    );
    Ok(tally.finish())
}

/// One stage of spending: its cheese sequence, page counts, and optional
/// auto-extend policy.
#[derive(Clone, Debug)]
pub struct StagePlan {
    pub sequence: Vec<u32>,
    pub counts: Vec<u32>,
    pub table: CumulativeTable,
    /// Whether the +3 hunt budget applies to this stage.
    pub extend: bool,
    pub auto_extend: bool,
    pub margin: u32,
    pub extension: Option<ExtensionConfig>,
    second_stage: bool,
}

impl StagePlan {
    pub fn new(
        sequence: Vec<u32>,
        counts: Vec<u32>,
        extend: bool,
        auto_extend: bool,
        margin: u32,
        second_stage: bool,
    ) -> Self {
        let table = CumulativeTable::from_counts(&counts);
        let extension = ExtensionConfig::for_stage(auto_extend, &counts, margin, second_stage);
        StagePlan {
            sequence,
            counts,
            table,
            extend,
            auto_extend,
            margin,
            extension,
            second_stage,
        }
    }

    /// A stage without auto-extend.
    pub fn plain(sequence: Vec<u32>, counts: Vec<u32>) -> Self {
        Self::new(sequence, counts, false, false, 0, false)
    }

    pub fn run<S: Sampler + ?Sized>(&self, start: &[u32], sampler: &mut S) -> TrialOutcome {
        simulate_with_extension(
            start,
            &self.sequence,
            &self.table,
            self.extension.as_ref(),
            sampler,
        )
    }

    pub fn prune_threshold(&self) -> u32 {
        if self.extend {
            PRUNE_THRESHOLD_EXTENDED
        } else {
            PRUNE_THRESHOLD
        }
    }

    /// This stage with pages zeroed for genres the previous stage already
    /// pushed past the prune threshold.
    pub fn pruned_for(&self, previous: &[u32]) -> StagePlan {
        let counts = prune_counts(&self.counts, previous, self.prune_threshold());
        StagePlan::new(
            self.sequence.clone(),
            counts,
            self.extend,
            self.auto_extend,
            self.margin,
            self.second_stage,
        )
    }
}

pub fn prune_counts(counts: &[u32], values: &[u32], threshold: u32) -> Vec<u32> {
    counts
        .iter()
        .zip(values)
        .map(|(&c, &v)| if v > threshold { 0 } else { c })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub first: TrialOutcome,
    pub second: TrialOutcome,
}

impl From<PipelineOutcome> for Trial {
    fn from(outcome: PipelineOutcome) -> Self {
        Trial {
            values: outcome.second.values,
            ready: outcome.second.ready,
            extensions: vec![outcome.first.extended, outcome.second.extended],
        }
    }
}

/// Two setups run back to back; the second starts from the first's result.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub start: Vec<u32>,
    pub first: StagePlan,
    pub second: StagePlan,
    pub pruned: bool,
}

impl Pipeline {
    pub fn run<S: Sampler + ?Sized>(&self, sampler: &mut S) -> PipelineOutcome {
        let first = self.first.run(&self.start, sampler);
        let second = if self.pruned {
            self.second.pruned_for(&first.values).run(&first.values, sampler)
        } else {
            self.second.run(&first.values, sampler)
        };
        PipelineOutcome { first, second }
    }
}
