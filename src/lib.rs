//! Monte Carlo planner for genre notoriety: simulates cheese spending over a
//! weighted genre distribution, estimates how often every genre ends ready,
//! and searches page distributions that make readiness more likely.

pub mod aggregate;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod extension;
pub mod optimizer;
pub mod report;
pub mod reroll;
pub mod reshape;
pub mod rng;
pub mod selector;
pub mod spend;
pub mod worker;

pub use aggregate::{aggregate, aggregate_parallel, AggregateStats, Pipeline, StagePlan, Trial};
pub use config::Config;
pub use cycle::{simulate_cycle_economy, CycleParams, CycleStats};
pub use engine::{apply_step, simulate_run, RunOutcome};
pub use error::{Result, SimError};
pub use extension::{simulate_with_extension, ExtensionConfig, TrialOutcome};
pub use optimizer::{optimize, optimize_parallel, OptimizerParams, OptimizerResult};
pub use rng::{Rng, Sampler};
pub use selector::CumulativeTable;
pub use worker::SimWorker;
