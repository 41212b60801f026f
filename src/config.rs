use crate::engine::clamp_notoriety;
use crate::error::{Result, SimError};
use crate::spend::TierCounts;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_GENRES: [&str; 5] = ["Romance", "Adventure", "Comedy", "Tragedy", "Suspense"];

// --- Configuration (Data-Driven) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub genres: Vec<String>,
    pub notoriety: Vec<u32>,
    pub pages: Vec<u32>,
    pub tiers: TierCounts,
    pub extend: bool,
    pub breakpoints: Vec<u32>,
    pub runs: usize,
    pub seed: Option<u64>,
    pub dual: DualConfig,
    pub optimizer: OptimizerConfig,
    pub cycle: CycleConfig,
    pub reroll: RerollConfig,
    pub worker: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        let genres: Vec<String> = DEFAULT_GENRES.iter().map(|g| g.to_string()).collect();
        let k = genres.len();
        Config {
            genres,
            notoriety: vec![0; k],
            pages: vec![0; k],
            tiers: TierCounts::all_mid(crate::spend::BASE_HUNTS),
            extend: false,
            breakpoints: vec![80, 90, 93],
            runs: 100_000,
            seed: None,
            dual: DualConfig::default(),
            optimizer: OptimizerConfig::default(),
            cycle: CycleConfig::default(),
            reroll: RerollConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

/// One setup of the back-to-back (two-stage) simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub tiers: TierCounts,
    pub pages: Vec<u32>,
    pub extend: bool,
    pub auto_extend: bool,
    pub margin: u32,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            tiers: TierCounts::all_mid(crate::spend::BASE_HUNTS),
            pages: Vec::new(),
            extend: false,
            auto_extend: false,
            margin: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DualConfig {
    pub runs: usize,
    pub pruned: bool,
    pub first: SetupConfig,
    pub second: SetupConfig,
}

impl Default for DualConfig {
    fn default() -> Self {
        DualConfig {
            runs: 50_000,
            pruned: false,
            first: SetupConfig {
                margin: 10,
                ..SetupConfig::default()
            },
            second: SetupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Perturbation range in percent of each genre's page count.
    pub range: f64,
    pub iterations: usize,
    pub candidates: usize,
    pub samples: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            range: 20.0,
            iterations: 10,
            candidates: 12,
            samples: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub cycles: usize,
    pub mid_tokens: usize,
    pub high_tokens: usize,
    pub yield_per_run: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            cycles: 10_000,
            mid_tokens: 8,
            high_tokens: 2,
            yield_per_run: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerollConfig {
    pub iterations: usize,
    pub pool_sizes: Vec<usize>,
}

impl Default for RerollConfig {
    fn default() -> Self {
        RerollConfig {
            iterations: 40_000,
            pool_sizes: vec![5, 6],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 0 means one thread per core minus `reserve_cores`.
    pub max_threads: usize,
    pub reserve_cores: usize,
    pub stack_size_mb: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            max_threads: 0,
            reserve_cores: 1,
            stack_size_mb: 4,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validated()
    }

    /// Reads `path`, falling back to `../../path` (binary launched from
    /// `target/<profile>`).
    pub fn load(path: &str) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(first) => {
                let alt = Path::new("../..").join(path);
                match fs::read_to_string(&alt) {
                    Ok(text) => {
                        info!("Config found at {}", alt.display());
                        text
                    }
                    Err(_) => return Err(SimError::Io(first)),
                }
            }
        };
        Self::from_json(&text)
    }

    /// Like [`Config::load`] but a missing file yields the built-in defaults.
    /// Parse and validation errors are still reported.
    pub fn load_or_default(path: &str) -> Result<Self> {
        match Self::load(path) {
            Err(SimError::Io(e)) => {
                warn!("Config {} not readable ({}); using defaults.", path, e);
                Self::default().validated()
            }
            other => other,
        }
    }

    /// Checks per-genre vectors against the genre list and clamps notoriety.
    /// Empty page vectors are widened to zeros.
    pub fn validated(mut self) -> Result<Self> {
        let k = self.genres.len();
        if k == 0 {
            return Err(SimError::Config("at least one genre is required".into()));
        }
        self.notoriety = fit_len("notoriety", self.notoriety, k)?;
        self.notoriety = clamp_notoriety(&self.notoriety);
        self.pages = fit_len("pages", self.pages, k)?;
        self.dual.first.pages = fit_len("dual.first.pages", self.dual.first.pages, k)?;
        self.dual.second.pages = fit_len("dual.second.pages", self.dual.second.pages, k)?;
        self.runs = self.runs.max(1);
        self.dual.runs = self.dual.runs.max(1);
        Ok(self)
    }
}

fn fit_len(name: &str, values: Vec<u32>, k: usize) -> Result<Vec<u32>> {
    if values.is_empty() {
        return Ok(vec![0; k]);
    }
    if values.len() != k {
        return Err(SimError::Config(format!(
            "{} has {} entries but there are {} genres",
            name,
            values.len(),
            k
        )));
    }
    Ok(values)
}
