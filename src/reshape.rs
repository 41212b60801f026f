//! Page-distribution helpers: scale a distribution to a new total, or patch a
//! bad start by boosting one genre to a chosen share.

use serde::Serialize;

pub const MIN_SCALE_PERCENT: f64 = 5.0;
pub const MAX_SCALE_PERCENT: f64 = 400.0;
pub const MIN_TARGET_SHARE: f64 = 0.05;
pub const MAX_TARGET_SHARE: f64 = 0.9;

/// Chapter length, named by its hunt count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ChapterLength {
    Short,
    Medium,
    Long,
}

impl ChapterLength {
    pub const ALL: [ChapterLength; 3] = [Self::Short, Self::Medium, Self::Long];

    pub fn from_hunts(hunts: usize) -> Option<Self> {
        match hunts {
            10 => Some(Self::Short),
            20 => Some(Self::Medium),
            30 => Some(Self::Long),
            _ => None,
        }
    }

    pub fn hunts(self) -> usize {
        match self {
            Self::Short => 10,
            Self::Medium => 20,
            Self::Long => 30,
        }
    }

    /// Pages a chapter of this length adds to its genre.
    pub fn page_boost(self) -> f64 {
        (self.hunts() / 10 * 250) as f64
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reshaped {
    pub counts: Vec<f64>,
    pub total: f64,
}

impl Reshaped {
    pub fn rounded(&self) -> Vec<u32> {
        self.counts.iter().map(|c| c.round().max(0.0) as u32).collect()
    }

    /// Percentage of the total held by each genre.
    pub fn percentages(&self) -> Vec<f64> {
        self.counts
            .iter()
            .map(|c| if self.total > 0.0 { c / self.total * 100.0 } else { 0.0 })
            .collect()
    }
}

/// Rescales `counts` to `percent` of their total, keeping every ratio.
/// `None` for an all-zero distribution.
pub fn scale_counts(counts: &[u32], percent: f64) -> Option<Reshaped> {
    let base_total: f64 = counts.iter().map(|&c| c as f64).sum();
    if base_total <= 0.0 {
        return None;
    }
    let percent = percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT);
    let total = (base_total * percent / 100.0).max(1.0);
    let counts = counts
        .iter()
        .map(|&c| c as f64 / base_total * total)
        .collect();
    Some(Reshaped { counts, total })
}

/// Adds a chapter of `length` to `target` and redistributes so `target` ends
/// at `share` of the total. The other genres keep their relative ratios, or
/// split the remainder evenly when they have no pages.
///
/// `None` for an all-zero distribution or an out-of-range target.
pub fn fix_start(
    counts: &[u32],
    target: usize,
    length: ChapterLength,
    share: f64,
) -> Option<Reshaped> {
    let base_total: f64 = counts.iter().map(|&c| c as f64).sum();
    if base_total <= 0.0 || target >= counts.len() {
        return None;
    }
    let boost = length.page_boost();
    let share = share.clamp(MIN_TARGET_SHARE, MAX_TARGET_SHARE);
    let boosted_target = counts[target] as f64 + boost;
    let total = (boosted_target / share).max(base_total + boost);
    let target_value = total * share;
    let remaining = total - target_value;

    let others_sum = base_total - counts[target] as f64;
    let others = counts.len() - 1;
    let result = counts
        .iter()
        .enumerate()
        .map(|(idx, &c)| {
            if idx == target {
                target_value
            } else if others_sum > 0.0 {
                remaining * c as f64 / others_sum
            } else {
                remaining / others as f64
            }
        })
        .collect();
    Some(Reshaped {
        counts: result,
        total,
    })
}
