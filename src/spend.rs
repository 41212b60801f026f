use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// Notoriety granted by each cheese tier, in config/CLI order.
pub const TOKEN_VALUES: [u32; 3] = [25, 50, 125];
pub const BASE_HUNTS: usize = 10;
pub const EXTENDED_BONUS: usize = 3;

/// Cheese counts per tier, aligned with [`TOKEN_VALUES`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts(pub [usize; 3]);

impl TierCounts {
    /// All of `hunts` spent on the mid tier; the default setup.
    pub fn all_mid(hunts: usize) -> Self {
        TierCounts([0, hunts, 0])
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    pub fn tiers(&self) -> Vec<TokenTier> {
        TOKEN_VALUES
            .iter()
            .zip(self.0.iter())
            .map(|(&magnitude, &count)| TokenTier { magnitude, count })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTier {
    pub magnitude: u32,
    pub count: usize,
}

/// Hunts available for one run.
pub fn target_hunts(extend: bool) -> usize {
    BASE_HUNTS + if extend { EXTENDED_BONUS } else { 0 }
}

/// Expands tiers into per-hunt magnitudes, largest cheese first.
pub fn build_sequence(tiers: &[TokenTier]) -> Vec<u32> {
    let mut ordered = tiers.to_vec();
    ordered.sort_by(|a, b| b.magnitude.cmp(&a.magnitude));
    ordered
        .iter()
        .flat_map(|tier| std::iter::repeat(tier.magnitude).take(tier.count))
        .collect()
}

/// Caller-side budget check: the counts must use exactly the available hunts.
pub fn validated_sequence(counts: &TierCounts, extend: bool) -> Result<Vec<u32>> {
    let expected = target_hunts(extend);
    let actual = counts.total();
    if actual != expected {
        return Err(SimError::BudgetMismatch { expected, actual });
    }
    Ok(build_sequence(&counts.tiers()))
}
