//! Auto-extend: up to three extra hunts when the highest-page genres finish a
//! run short of their target.

use crate::engine::{apply_step, is_ready, simulate_run, READY_THRESHOLD};
use crate::rng::Sampler;
use crate::selector::CumulativeTable;
use serde::Serialize;

pub const EXTRA_HUNTS: usize = 3;
pub const HIGH_TOKEN: u32 = 125;
pub const MID_TOKEN: u32 = 50;
/// Base of the "keep using 125 cheese" threshold, offset by the margin.
pub const HIGH_TOKEN_BASE: u32 = 33;
/// A zero-page top genre below this value suppresses a second-stage extension.
pub const CRITICAL_FLOOR: u32 = 83;

#[derive(Clone, Debug, PartialEq)]
pub struct ExtensionConfig {
    /// Genres tied for the largest page count.
    pub top: Vec<usize>,
    pub ready_threshold: u32,
    pub high_threshold: u32,
    pub extra_hunts: usize,
    pub second_stage: bool,
    counts: Vec<u32>,
}

impl ExtensionConfig {
    /// `None` when there are no pages to rank genres by.
    pub fn from_counts(counts: &[u32], margin: u32, second_stage: bool) -> Option<Self> {
        let max = counts.iter().copied().max()?;
        if max == 0 {
            return None;
        }
        let top = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == max)
            .map(|(idx, _)| idx)
            .collect();
        Some(Self {
            top,
            ready_threshold: READY_THRESHOLD + margin,
            high_threshold: HIGH_TOKEN_BASE + margin,
            extra_hunts: EXTRA_HUNTS,
            second_stage,
            counts: counts.to_vec(),
        })
    }

    /// Builds the policy for a stage only if auto-extend is switched on.
    pub fn for_stage(
        auto_extend: bool,
        counts: &[u32],
        margin: u32,
        second_stage: bool,
    ) -> Option<Self> {
        if !auto_extend {
            return None;
        }
        Self::from_counts(counts, margin, second_stage)
    }

    pub fn should_trigger(&self, values: &[u32]) -> bool {
        if self.second_stage
            && self
                .top
                .iter()
                .any(|&idx| self.counts[idx] == 0 && values[idx] < CRITICAL_FLOOR)
        {
            return false;
        }
        self.top.iter().any(|&idx| values[idx] < self.ready_threshold)
    }

    /// Cheese for the next extra hunt. Once every top genre has reached the
    /// high threshold the policy drops to mid cheese for good.
    fn next_token(&self, values: &[u32], switched: &mut bool) -> u32 {
        if !*switched && self.top.iter().any(|&idx| values[idx] < self.high_threshold) {
            return HIGH_TOKEN;
        }
        *switched = true;
        MID_TOKEN
    }

    pub fn apply<S: Sampler + ?Sized>(
        &self,
        values: &mut [u32],
        table: &CumulativeTable,
        sampler: &mut S,
    ) {
        let mut switched = false;
        for _ in 0..self.extra_hunts {
            let token = self.next_token(values, &mut switched);
            apply_step(values, token, table, sampler);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub values: Vec<u32>,
    pub ready: bool,
    pub extended: bool,
}

/// One run followed by the extension policy, if any. Readiness is evaluated
/// after the extra hunts.
pub fn simulate_with_extension<S: Sampler + ?Sized>(
    start: &[u32],
    sequence: &[u32],
    table: &CumulativeTable,
    extension: Option<&ExtensionConfig>,
    sampler: &mut S,
) -> TrialOutcome {
    let mut values = simulate_run(start, sequence, table, sampler).values;
    let extended = match extension {
        Some(policy) if policy.should_trigger(&values) => {
            policy.apply(&mut values, table, sampler);
            true
        }
        _ => false,
    };
    let ready = is_ready(&values);
    TrialOutcome {
        values,
        ready,
        extended,
    }
}
