use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cheese quantities must sum to {expected} hunts (current: {actual})")]
    BudgetMismatch { expected: usize, actual: usize },

    #[error("provide at least one cheese so notoriety can advance")]
    EmptySpend,

    #[error("a farming cycle did not finish within {max_runs} runs; add cheese or drop genres")]
    CycleStalled { max_runs: usize },

    #[error("worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
