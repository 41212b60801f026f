//! Terminal rendering of simulation results.

use crate::aggregate::{AggregateStats, PipelineOutcome};
use crate::cycle::CycleStats;
use crate::extension::TrialOutcome;
use crate::optimizer::OptimizerResult;
use crate::reroll::RerollStats;
use crate::reshape::Reshaped;
use colored::*;
use std::fmt::Write;

pub fn header(title: &str) -> String {
    format!("=== {} ===", title).purple().bold().to_string()
}

fn section(title: &str) -> String {
    format!("\n{}", title.cyan().bold())
}

fn readiness_label(ready: bool) -> ColoredString {
    if ready {
        "READY".green().bold()
    } else {
        "NOT READY".red()
    }
}

fn genre_width(genres: &[String]) -> usize {
    genres.iter().map(|g| g.len()).max().unwrap_or(0)
}

fn label(genres: &[String], idx: usize) -> String {
    genres
        .get(idx)
        .cloned()
        .unwrap_or_else(|| format!("Genre {}", idx + 1))
}

/// One sample run: final notoriety per genre and the readiness verdict.
pub fn format_run(title: &str, genres: &[String], outcome: &TrialOutcome) -> String {
    let width = genre_width(genres);
    let mut out = section(title);
    for (idx, value) in outcome.values.iter().enumerate() {
        let _ = write!(out, "\n  {:<width$} : {:>3}", label(genres, idx), value);
    }
    if outcome.extended {
        let _ = write!(out, "\n  {}", "[+3 hunts auto-extended]".yellow());
    }
    let _ = write!(out, "\n  All genres >= 80: {}", readiness_label(outcome.ready));
    out
}

/// Monte Carlo summary: averages, readiness and the breakpoint histograms.
pub fn format_aggregate(genres: &[String], stats: &AggregateStats) -> String {
    let width = genre_width(genres);
    let mut out = section(&format!("Average notoriety over {} runs", stats.runs));
    for (idx, avg) in stats.averages.iter().enumerate() {
        let _ = write!(out, "\n  {:<width$} : {:>7.2}", label(genres, idx), avg);
    }
    let _ = write!(
        out,
        "\n  All genres >= 80: {:.2}% ({}/{})",
        stats.readiness_ratio * 100.0,
        stats.ready_runs,
        stats.runs
    );
    for (b, hist) in stats.histograms.iter().enumerate() {
        let _ = write!(out, "\n  Genres above {}:", hist.threshold);
        for n in 1..hist.counts.len() {
            let _ = write!(out, " {}={:.2}%", n, stats.share_above(b, n) * 100.0);
        }
    }
    out
}

/// Two-stage sample plus its aggregate, with per-stage extension rates.
pub fn format_dual(
    genres: &[String],
    sample: &PipelineOutcome,
    stats: &AggregateStats,
) -> String {
    let mut out = format_run("Setup 1 sample", genres, &sample.first);
    out.push_str(&format_run("Setup 2 sample", genres, &sample.second));
    out.push_str(&format_aggregate(genres, stats));
    let _ = write!(
        out,
        "\n  Average extensions per run: {:.3}",
        stats.avg_extensions()
    );
    for stage in 0..stats.extension_counts.len() {
        let _ = write!(
            out,
            "\n  Setup {} extended: {:.2}%",
            stage + 1,
            stats.extension_rate(stage) * 100.0
        );
    }
    out
}

pub fn format_optimizer(genres: &[String], result: &OptimizerResult) -> String {
    let width = genre_width(genres);
    let total: f64 = result.best_counts.iter().sum();
    let mut out = section("Optimized page distribution");
    for (idx, (count, rounded)) in result
        .best_counts
        .iter()
        .zip(result.rounded_counts())
        .enumerate()
    {
        let share = if total > 0.0 { count / total * 100.0 } else { 0.0 };
        let _ = write!(
            out,
            "\n  {:<width$} : {:>6} ({:.1}%)",
            label(genres, idx),
            rounded,
            share
        );
    }
    let _ = write!(
        out,
        "\n  All genres >= 80 probability: {}",
        format!("{:.2}%", result.best_prob * 100.0).green().bold()
    );
    let trail: Vec<String> = result
        .history
        .iter()
        .map(|p| format!("{:.2}", p * 100.0))
        .collect();
    let _ = write!(out, "\n  {}", format!("History (%): {}", trail.join(" -> ")).dimmed());
    out
}

pub fn format_cycle(stats: &CycleStats) -> String {
    let mut out = section(&format!("Farming cycles ({} simulated)", stats.cycles));
    let _ = write!(
        out,
        "\n  Average runs per cycle: {:.2} (last cycle took {} runs)",
        stats.avg_runs, stats.last_cycle_runs
    );
    let _ = write!(
        out,
        "\n  Average hunts per cycle: {:.2} (last cycle spent {} hunts)",
        stats.avg_hunts, stats.last_cycle_hunts
    );
    let _ = write!(out, "\n  Average cheese per cycle: {:.2}", stats.avg_tokens);
    let _ = write!(
        out,
        "\n  Estimated mallets gained per cycle: {:.2}",
        stats.avg_yield
    );
    out
}

pub fn format_reroll(stats: &RerollStats) -> String {
    let mut out = section(&format!(
        "Genre pool size {} ({} iterations)",
        stats.genres, stats.iterations
    ));
    let _ = write!(
        out,
        "\n  Avg. mallets to match genre across five areas: {:.2}",
        stats.avg_genre_mallets
    );
    let _ = write!(
        out,
        "\n  Avg. mallets to match length + genre across five areas: {:.2}",
        stats.avg_combo_mallets
    );
    out
}

pub fn format_reshaped(title: &str, genres: &[String], reshaped: &Reshaped) -> String {
    let width = genre_width(genres);
    let mut out = section(title);
    for (idx, (rounded, pct)) in reshaped
        .rounded()
        .into_iter()
        .zip(reshaped.percentages())
        .enumerate()
    {
        let _ = write!(
            out,
            "\n  {:<width$} : {:>6} ({:.1}%)",
            label(genres, idx),
            rounded,
            pct
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BreakpointHistogram;

    fn genres() -> Vec<String> {
        vec!["Romance".into(), "Comedy".into()]
    }

    #[test]
    fn run_lists_values_and_extension() {
        colored::control::set_override(false);
        let outcome = TrialOutcome {
            values: vec![85, 79],
            ready: false,
            extended: true,
        };
        let text = format_run("Sample", &genres(), &outcome);
        assert!(text.contains("Romance :  85"));
        assert!(text.contains("Comedy  :  79"));
        assert!(text.contains("auto-extended"));
        assert!(text.contains("NOT READY"));
    }

    #[test]
    fn aggregate_shows_ratio_and_histogram_shares() {
        colored::control::set_override(false);
        let stats = AggregateStats {
            runs: 4,
            averages: vec![90.0, 70.5],
            ready_runs: 1,
            readiness_ratio: 0.25,
            histograms: vec![BreakpointHistogram {
                threshold: 80,
                counts: vec![1, 2, 1],
            }],
            extension_counts: vec![0],
        };
        let text = format_aggregate(&genres(), &stats);
        assert!(text.contains("25.00% (1/4)"));
        assert!(text.contains("Genres above 80: 1=50.00% 2=25.00%"));
        assert!(text.contains("70.50"));
    }

    #[test]
    fn dual_reports_each_stage() {
        colored::control::set_override(false);
        let stage = |extended| TrialOutcome {
            values: vec![100, 100],
            ready: true,
            extended,
        };
        let sample = PipelineOutcome {
            first: stage(true),
            second: stage(false),
        };
        let stats = AggregateStats {
            runs: 10,
            averages: vec![100.0, 100.0],
            ready_runs: 10,
            readiness_ratio: 1.0,
            histograms: Vec::new(),
            extension_counts: vec![5, 2],
        };
        let text = format_dual(&genres(), &sample, &stats);
        assert!(text.contains("Setup 1 extended: 50.00%"));
        assert!(text.contains("Setup 2 extended: 20.00%"));
        assert!(text.contains("Average extensions per run: 0.700"));
    }

    #[test]
    fn unnamed_genres_get_a_label() {
        colored::control::set_override(false);
        let reshaped = Reshaped {
            counts: vec![1.0, 3.0, 0.0],
            total: 4.0,
        };
        let text = format_reshaped("Scaled", &genres(), &reshaped);
        assert!(text.contains("Genre 3"));
        assert!(text.contains("(75.0%)"));
    }

    #[test]
    fn cycle_and_reroll_summaries() {
        colored::control::set_override(false);
        let cycle = CycleStats {
            cycles: 10,
            avg_runs: 3.5,
            avg_tokens: 35.0,
            avg_hunts: 300.0,
            avg_yield: 17.5,
            last_cycle_runs: 4,
            last_cycle_hunts: 320,
        };
        let text = format_cycle(&cycle);
        assert!(text.contains("3.50 (last cycle took 4 runs)"));
        assert!(text.contains("mallets gained per cycle: 17.50"));

        let reroll = RerollStats {
            genres: 5,
            iterations: 100,
            avg_genre_mallets: 10.0,
            avg_combo_mallets: 60.0,
        };
        assert!(format_reroll(&reroll).contains("five areas: 60.00"));
    }
}
