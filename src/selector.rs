use crate::rng::Sampler;

/// Normalizes raw non-negative weights so they sum to 1.
///
/// Negative entries count as zero. When nothing positive remains the result is
/// uniform over all categories.
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 {
        let k = weights.len().max(1) as f64;
        return vec![1.0 / k; weights.len()];
    }
    weights.iter().map(|w| w.max(0.0) / total).collect()
}

/// Running prefix sums of a normalized distribution, used to map a uniform
/// draw onto a category index.
///
/// The table is non-decreasing and its last entry is exactly `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeTable {
    thresholds: Vec<f64>,
}

impl CumulativeTable {
    pub fn from_distribution(distribution: &[f64]) -> Self {
        let mut running = 0.0;
        let mut thresholds: Vec<f64> = distribution
            .iter()
            .map(|p| {
                running += p;
                running
            })
            .collect();
        if let Some(last) = thresholds.last_mut() {
            *last = 1.0;
        }
        Self { thresholds }
    }

    pub fn from_weights(weights: &[f64]) -> Self {
        Self::from_distribution(&normalize(weights))
    }

    /// Builds the table from integer page counts (arbitrary scale).
    pub fn from_counts(counts: &[u32]) -> Self {
        let weights: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        Self::from_weights(&weights)
    }

    pub fn uniform(k: usize) -> Self {
        Self::from_weights(&vec![0.0; k])
    }

    /// Smallest index whose threshold is `>= r`; the last index if float drift
    /// leaves `r` above every entry.
    pub fn select(&self, r: f64) -> usize {
        self.thresholds
            .iter()
            .position(|&t| r <= t)
            .unwrap_or(self.thresholds.len().saturating_sub(1))
    }

    pub fn draw<S: Sampler + ?Sized>(&self, sampler: &mut S) -> usize {
        self.select(sampler.next_f64())
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}
