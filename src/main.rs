use clap::{Parser, Subcommand};
use cliff_sim::aggregate::{aggregate_parallel, Pipeline, StagePlan};
use cliff_sim::config::{Config, SetupConfig};
use cliff_sim::cycle::{simulate_cycle_economy_parallel, CycleParams};
use cliff_sim::error::{Result, SimError};
use cliff_sim::optimizer::{optimize_parallel, OptimizerParams};
use cliff_sim::report;
use cliff_sim::reroll::simulate_rerolls_parallel;
use cliff_sim::reshape::{fix_start, scale_counts, ChapterLength};
use cliff_sim::rng::Rng;
use cliff_sim::spend::validated_sequence;
use cliff_sim::worker::SimWorker;
use log::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "data/config.json")]
    config: String,

    /// Random seed (overrides the config seed)
    #[arg(short, long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
enum Commands {
    /// Simulate one setup: a sample run plus the Monte Carlo summary (default)
    Simulate {
        /// Number of simulated runs
        #[arg(short = 'n', long)]
        runs: Option<usize>,
        /// Top up extra hunts when the highest-page genres end short
        #[arg(long)]
        auto_extend: bool,
        /// Added to the auto-extend thresholds
        #[arg(long, default_value_t = 0)]
        margin: u32,
    },
    /// Two setups back to back, the second starting where the first ended
    Dual {
        #[arg(short = 'n', long)]
        runs: Option<usize>,
        /// Drop pages of genres the first setup already pushed past 90 (93 extended)
        #[arg(long)]
        pruned: bool,
    },
    /// Search for the page distribution most likely to make every genre ready
    Optimize {
        /// Perturbation range in percent
        #[arg(long)]
        range: Option<f64>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        candidates: Option<usize>,
        /// Simulated runs per candidate
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Farm short runs until every genre clears 80, over many cycles
    Cycle {
        #[arg(long)]
        cycles: Option<usize>,
        /// 50-notoriety cheese per run
        #[arg(long)]
        mid: Option<usize>,
        /// 125-notoriety cheese per run
        #[arg(long)]
        high: Option<usize>,
        /// Mallets earned per run
        #[arg(long = "yield")]
        yield_per_run: Option<f64>,
    },
    /// Mallets needed to line up a genre across five areas
    Reroll {
        #[arg(long)]
        iterations: Option<usize>,
        /// Genre pool size; repeat for several
        #[arg(short = 'k', long = "pool-size")]
        pool_sizes: Vec<usize>,
    },
    /// Scale the configured pages to a percentage of their total
    Scale {
        /// Target total in percent (5 to 400)
        #[arg(default_value_t = 100.0)]
        percent: f64,
    },
    /// Boost one genre by a chapter and set its final share of the pages
    FixStart {
        genre: String,
        /// Chapter length in hunts: 10, 20 or 30
        #[arg(long, default_value_t = 10)]
        length: usize,
        /// Target share in percent (5 to 90)
        #[arg(long, default_value_t = 50.0)]
        share: f64,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Simulate {
            runs: None,
            auto_extend: false,
            margin: 0,
        }
    }
}

fn genre_index(config: &Config, name: &str) -> Result<usize> {
    config
        .genres
        .iter()
        .position(|g| g.eq_ignore_ascii_case(name))
        .ok_or_else(|| SimError::Config(format!("unknown genre '{}'", name)))
}

fn run(args: Args) -> Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let mut rng = match args.seed.or(config.seed) {
        Some(seed) => Rng::from_seed(seed),
        None => Rng::new(),
    };
    let worker = SimWorker::new_with_config(&config.worker)?;
    let genres = &config.genres;

    println!("{}", report::header("Notoriety Planner"));

    match args.command.unwrap_or_default() {
        Commands::Simulate {
            runs,
            auto_extend,
            margin,
        } => {
            let sequence = validated_sequence(&config.tiers, config.extend)?;
            let plan = StagePlan::new(
                sequence,
                config.pages.clone(),
                config.extend,
                auto_extend,
                margin,
                false,
            );
            let start = config.notoriety.clone();
            let sample = plan.run(&start, &mut rng);
            println!("{}", report::format_run("Sample run", genres, &sample));

            let runs = runs.unwrap_or(config.runs);
            let stats = aggregate_parallel(
                &worker,
                |rng: &mut Rng| plan.run(&start, rng).into(),
                runs,
                &config.breakpoints,
                rng.next_u64(),
            )?;
            println!("{}", report::format_aggregate(genres, &stats));
        }
        Commands::Dual { runs, pruned } => {
            let dual = &config.dual;
            let stage = |setup: &SetupConfig, second_stage: bool| -> Result<StagePlan> {
                Ok(StagePlan::new(
                    validated_sequence(&setup.tiers, setup.extend)?,
                    setup.pages.clone(),
                    setup.extend,
                    setup.auto_extend,
                    setup.margin,
                    second_stage,
                ))
            };
            let pipeline = Pipeline {
                start: config.notoriety.clone(),
                first: stage(&dual.first, false)?,
                second: stage(&dual.second, true)?,
                pruned: pruned || dual.pruned,
            };
            let sample = pipeline.run(&mut rng);
            let runs = runs.unwrap_or(dual.runs);
            let stats = aggregate_parallel(
                &worker,
                |rng: &mut Rng| pipeline.run(rng).into(),
                runs,
                &config.breakpoints,
                rng.next_u64(),
            )?;
            println!("{}", report::format_dual(genres, &sample, &stats));
        }
        Commands::Optimize {
            range,
            iterations,
            candidates,
            samples,
        } => {
            let sequence = validated_sequence(&config.tiers, config.extend)?;
            let defaults = OptimizerParams::from(&config.optimizer);
            let params = OptimizerParams {
                range: range.unwrap_or(defaults.range),
                iterations: iterations.unwrap_or(defaults.iterations),
                candidates: candidates.unwrap_or(defaults.candidates),
                samples: samples.unwrap_or(defaults.samples),
            };
            let base: Vec<f64> = config.pages.iter().map(|&p| p as f64).collect();
            let result = optimize_parallel(
                &worker,
                &config.notoriety,
                &sequence,
                &base,
                params,
                &mut rng,
            )?;
            println!("{}", report::format_optimizer(genres, &result));
        }
        Commands::Cycle {
            cycles,
            mid,
            high,
            yield_per_run,
        } => {
            let defaults = CycleParams::from(&config.cycle);
            let params = CycleParams {
                cycles: cycles.unwrap_or(defaults.cycles),
                mid_tokens: mid.unwrap_or(defaults.mid_tokens),
                high_tokens: high.unwrap_or(defaults.high_tokens),
                yield_per_run: yield_per_run.unwrap_or(defaults.yield_per_run),
            };
            let stats =
                simulate_cycle_economy_parallel(&worker, params, genres.len(), rng.next_u64())?;
            println!("{}", report::format_cycle(&stats));
        }
        Commands::Reroll {
            iterations,
            pool_sizes,
        } => {
            let iterations = iterations.unwrap_or(config.reroll.iterations);
            let pools = if pool_sizes.is_empty() {
                config.reroll.pool_sizes.clone()
            } else {
                pool_sizes
            };
            for k in pools {
                let stats = simulate_rerolls_parallel(&worker, k, iterations, rng.next_u64())?;
                println!("{}", report::format_reroll(&stats));
            }
        }
        Commands::Scale { percent } => {
            let scaled = scale_counts(&config.pages, percent)
                .ok_or_else(|| SimError::Config("no pages to scale".into()))?;
            let title = format!("Scaled distribution ({:.0}%)", percent);
            println!("{}", report::format_reshaped(&title, genres, &scaled));
        }
        Commands::FixStart {
            genre,
            length,
            share,
        } => {
            let target = genre_index(&config, &genre)?;
            let length = ChapterLength::from_hunts(length).ok_or_else(|| {
                SimError::Config(format!("chapter length must be 10, 20 or 30 (got {})", length))
            })?;
            let fixed = fix_start(&config.pages, target, length, share / 100.0)
                .ok_or_else(|| SimError::Config("no pages to adjust".into()))?;
            println!(
                "{}",
                report::format_reshaped("Adjusted distribution", genres, &fixed)
            );
        }
    }
    info!("Done.");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
