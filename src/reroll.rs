//! Mallet rerolls: how many mallets it takes to line up the same genre across
//! five consecutive areas.
//!
//! Each area offers one genre per chapter length. A reroll redraws all three
//! slots and costs [`MALLETS_PER_REROLL`]. With at least three genres the slots
//! always show distinct genres.

use crate::error::Result;
use crate::reshape::ChapterLength;
use crate::rng::{Rng, Sampler};
use crate::worker::SimWorker;
use log::info;
use serde::Serialize;
use std::time::Instant;

pub const MALLETS_PER_REROLL: usize = 3;
pub const AREAS_PER_ITERATION: usize = 5;

/// Genre shown in each length slot, indexed by [`ChapterLength::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaOptions(pub [usize; 3]);

impl AreaOptions {
    pub fn draw<S: Sampler + ?Sized>(genres: usize, sampler: &mut S) -> Self {
        let genres = genres.max(1);
        let mut slots = [0; 3];
        if genres < slots.len() {
            for slot in &mut slots {
                *slot = sampler.next_index(genres);
            }
        } else {
            let pool: Vec<usize> = (0..genres).collect();
            let picks = sampler.choose_distinct(&pool, slots.len());
            slots.copy_from_slice(&picks);
        }
        AreaOptions(slots)
    }

    pub fn offers(&self, genre: usize) -> bool {
        self.0.contains(&genre)
    }

    pub fn genre_for(&self, length: ChapterLength) -> usize {
        self.0[length.index()]
    }
}

/// Rerolls until `accept` holds and returns the mallets spent on the way.
pub fn mallets_until<S, F>(genres: usize, sampler: &mut S, accept: F) -> usize
where
    S: Sampler + ?Sized,
    F: Fn(&AreaOptions) -> bool,
{
    let mut spent = 0;
    loop {
        if accept(&AreaOptions::draw(genres, sampler)) {
            return spent;
        }
        spent += MALLETS_PER_REROLL;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RerollStats {
    pub genres: usize,
    pub iterations: usize,
    /// Average mallets for five areas offering the target genre anywhere.
    pub avg_genre_mallets: f64,
    /// Average mallets for five areas offering the target genre at the target
    /// length.
    pub avg_combo_mallets: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct RerollTally {
    iterations: usize,
    genre_mallets: usize,
    combo_mallets: usize,
}

impl RerollTally {
    fn merge(self, other: RerollTally) -> RerollTally {
        RerollTally {
            iterations: self.iterations + other.iterations,
            genre_mallets: self.genre_mallets + other.genre_mallets,
            combo_mallets: self.combo_mallets + other.combo_mallets,
        }
    }

    fn finish(self, genres: usize) -> RerollStats {
        let denom = self.iterations.max(1) as f64;
        RerollStats {
            genres,
            iterations: self.iterations,
            avg_genre_mallets: self.genre_mallets as f64 / denom,
            avg_combo_mallets: self.combo_mallets as f64 / denom,
        }
    }
}

/// One iteration: a random target genre and length, five areas for each
/// criterion.
fn reroll_iteration<S: Sampler + ?Sized>(genres: usize, sampler: &mut S, tally: &mut RerollTally) {
    let target = sampler.next_index(genres);
    let length = ChapterLength::ALL[sampler.next_index(ChapterLength::ALL.len())];
    for _ in 0..AREAS_PER_ITERATION {
        tally.genre_mallets += mallets_until(genres, sampler, |opts| opts.offers(target));
        tally.combo_mallets +=
            mallets_until(genres, sampler, |opts| opts.genre_for(length) == target);
    }
    tally.iterations += 1;
}

pub fn simulate_rerolls<S: Sampler + ?Sized>(
    genres: usize,
    iterations: usize,
    sampler: &mut S,
) -> RerollStats {
    let genres = genres.max(1);
    let mut tally = RerollTally::default();
    for _ in 0..iterations.max(1) {
        reroll_iteration(genres, sampler, &mut tally);
    }
    tally.finish(genres)
}

pub fn simulate_rerolls_parallel(
    worker: &SimWorker,
    genres: usize,
    iterations: usize,
    seed: u64,
) -> Result<RerollStats> {
    let genres = genres.max(1);
    let iterations = iterations.max(1);
    let start = Instant::now();
    let tally = worker.map_chunks(
        iterations,
        seed,
        RerollTally::default,
        |range, rng: &mut Rng| {
            let mut tally = RerollTally::default();
            for _ in range {
                reroll_iteration(genres, rng, &mut tally);
            }
            tally
        },
        RerollTally::merge,
    )?;
    info!(
        "Simulated {} reroll iterations for {} genres in {:.2?}",
        iterations,
        genres,
        start.elapsed()
    );
    Ok(tally.finish(genres))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::testing::ScriptedSampler;

    #[test]
    fn slots_are_distinct_with_enough_genres() {
        let mut rng = Rng::from_seed(8);
        for _ in 0..500 {
            let AreaOptions(slots) = AreaOptions::draw(5, &mut rng);
            assert!(slots[0] != slots[1] && slots[1] != slots[2] && slots[0] != slots[2]);
            assert!(slots.iter().all(|&g| g < 5));
        }
    }

    #[test]
    fn small_pools_allow_repeats() {
        let opts = AreaOptions::draw(2, &mut ScriptedSampler::constant(0.9));
        assert_eq!(opts, AreaOptions([1, 1, 1]));
    }

    #[test]
    fn first_hit_costs_nothing() {
        let mut sampler = ScriptedSampler::constant(0.0);
        assert_eq!(mallets_until(5, &mut sampler, |o| o.offers(0)), 0);
    }

    #[test]
    fn each_miss_costs_three_mallets() {
        let mut rng = Rng::from_seed(2);
        let spent = mallets_until(6, &mut rng, |o| o.genre_for(ChapterLength::Long) == 3);
        assert_eq!(spent % MALLETS_PER_REROLL, 0);
    }

    #[test]
    fn averages_match_geometric_expectation() {
        // K=5: any-slot hit 3/5 -> 2 mallets per area; exact slot 1/5 -> 12.
        let mut rng = Rng::from_seed(15);
        let five = simulate_rerolls(5, 20_000, &mut rng);
        assert!((five.avg_genre_mallets - 10.0).abs() < 0.6, "{}", five.avg_genre_mallets);
        assert!((five.avg_combo_mallets - 60.0).abs() < 2.0, "{}", five.avg_combo_mallets);

        // K=6: any-slot 1/2 -> 3 per area; exact slot 1/6 -> 15.
        let six = simulate_rerolls(6, 20_000, &mut rng);
        assert!((six.avg_genre_mallets - 15.0).abs() < 0.8, "{}", six.avg_genre_mallets);
        assert!((six.avg_combo_mallets - 75.0).abs() < 2.5, "{}", six.avg_combo_mallets);
    }

    #[test]
    fn parallel_rerolls_are_reproducible() {
        let worker = SimWorker::new(3).unwrap();
        let a = simulate_rerolls_parallel(&worker, 5, 1_000, 12).unwrap();
        let b = simulate_rerolls_parallel(&worker, 5, 1_000, 12).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.iterations, 1_000);
    }
}
