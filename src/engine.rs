use crate::rng::Sampler;
use crate::selector::CumulativeTable;
use serde::Serialize;

pub const NOTORIETY_CAP: u32 = 200;
pub const READY_THRESHOLD: u32 = 80;
/// Decay never takes a genre below this value.
pub const DECAY_FLOOR: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunOutcome {
    pub values: Vec<u32>,
    pub ready: bool,
}

pub fn is_ready(values: &[u32]) -> bool {
    values.iter().all(|&v| v >= READY_THRESHOLD)
}

/// Clamps caller-supplied notoriety into `[0, NOTORIETY_CAP]`.
pub fn clamp_notoriety(values: &[u32]) -> Vec<u32> {
    values.iter().map(|&v| v.min(NOTORIETY_CAP)).collect()
}

/// Spends one cheese: the drawn genre gains `magnitude` (capped), every other
/// genre above the floor loses one point. Values above the cap are clamped
/// first. Returns the drawn index.
pub fn apply_step<S: Sampler + ?Sized>(
    values: &mut [u32],
    magnitude: u32,
    table: &CumulativeTable,
    sampler: &mut S,
) -> usize {
    let picked = table.draw(sampler);
    for (idx, value) in values.iter_mut().enumerate() {
        *value = (*value).min(NOTORIETY_CAP);
        if idx == picked {
            *value = value.saturating_add(magnitude).min(NOTORIETY_CAP);
        } else if *value > DECAY_FLOOR {
            *value -= 1;
        }
    }
    picked
}

/// Applies `sequence` to a clamped copy of `start`.
pub fn simulate_run<S: Sampler + ?Sized>(
    start: &[u32],
    sequence: &[u32],
    table: &CumulativeTable,
    sampler: &mut S,
) -> RunOutcome {
    let mut values = clamp_notoriety(start);
    for &magnitude in sequence {
        apply_step(&mut values, magnitude, table, sampler);
    }
    let ready = is_ready(&values);
    RunOutcome { values, ready }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::testing::ScriptedSampler;
    use crate::rng::Rng;

    #[test]
    fn step_raises_pick_and_decays_others() {
        let table = CumulativeTable::from_weights(&[1.0, 0.0, 0.0]);
        let mut values = vec![10, 5, 1];
        let picked = apply_step(&mut values, 25, &table, &mut ScriptedSampler::constant(0.5));
        assert_eq!(picked, 0);
        assert_eq!(values, vec![35, 4, 1]);
    }

    #[test]
    fn step_caps_at_two_hundred() {
        let table = CumulativeTable::from_weights(&[1.0, 0.0]);
        let mut values = vec![199, 50];
        apply_step(&mut values, 50, &table, &mut ScriptedSampler::constant(0.1));
        assert_eq!(values, vec![200, 49]);
    }

    #[test]
    fn decay_leaves_zero_and_one_untouched() {
        let table = CumulativeTable::from_weights(&[0.0, 0.0, 1.0]);
        let mut values = vec![0, 1, 0];
        apply_step(&mut values, 25, &table, &mut ScriptedSampler::constant(0.9));
        assert_eq!(values, vec![0, 1, 25]);
    }

    #[test]
    fn step_bounds_hold_for_random_inputs() {
        let mut rng = Rng::from_seed(2024);
        let table = CumulativeTable::uniform(5);
        for _ in 0..5_000 {
            let mut values: Vec<u32> = (0..5).map(|_| 1 + rng.next_index(200) as u32).collect();
            let magnitude = [25, 50, 125][rng.next_index(3)];
            apply_step(&mut values, magnitude, &table, &mut rng);
            assert!(values.iter().all(|&v| (1..=NOTORIETY_CAP).contains(&v)));
        }
    }

    #[test]
    fn empty_sequence_returns_start() {
        let table = CumulativeTable::uniform(5);
        let mut rng = Rng::from_seed(1);
        let start = vec![80, 90, 100, 120, 200];
        let out = simulate_run(&start, &[], &table, &mut rng);
        assert_eq!(out.values, start);
        assert!(out.ready);

        let low = vec![80, 79, 100, 120, 200];
        let out = simulate_run(&low, &[], &table, &mut rng);
        assert_eq!(out.values, low);
        assert!(!out.ready);
    }

    #[test]
    fn single_genre_single_step_is_deterministic() {
        let table = CumulativeTable::uniform(1);
        let mut rng = Rng::from_seed(8);
        let out = simulate_run(&[0], &[50], &table, &mut rng);
        assert_eq!(out.values, vec![50]);
        assert!(!out.ready);
    }

    #[test]
    fn run_does_not_mutate_input() {
        let table = CumulativeTable::uniform(3);
        let mut rng = Rng::from_seed(4);
        let start = [10, 20, 30];
        let _ = simulate_run(&start, &[125, 50, 25], &table, &mut rng);
        assert_eq!(start, [10, 20, 30]);
    }

    #[test]
    fn clamp_limits_inputs() {
        assert_eq!(clamp_notoriety(&[0, 250, 200]), vec![0, 200, 200]);
    }

    #[test]
    fn over_cap_start_is_clamped() {
        let table = CumulativeTable::from_weights(&[1.0, 0.0]);
        let mut sampler = ScriptedSampler::constant(0.5);
        let out = simulate_run(&[0, 250], &[25], &table, &mut sampler);
        assert_eq!(out.values, vec![25, 199]);

        let empty = simulate_run(&[300, 80], &[], &table, &mut sampler);
        assert_eq!(empty.values, vec![200, 80]);

        let mut values = vec![0, 400];
        apply_step(&mut values, 25, &table, &mut sampler);
        assert_eq!(values, vec![25, 199]);
    }
}
