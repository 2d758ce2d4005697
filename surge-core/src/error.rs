pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid `executor` `{0}` (expected `ramping-arrival-rate`)")]
    InvalidExecutor(String),

    #[error("`stages` must be a non-empty array of {{ duration, target }} with a positive total duration")]
    InvalidStages,

    #[error("`time_unit` must be a positive duration")]
    InvalidTimeUnit,

    #[error("`pre_allocated_vus` must be a positive integer")]
    InvalidPreAllocatedVus,

    #[error("`max_vus` ({max_vus}) must be >= `pre_allocated_vus` ({pre_allocated_vus})")]
    InvalidMaxVus {
        pre_allocated_vus: u64,
        max_vus: u64,
    },

    #[error("`url` must not be empty")]
    InvalidUrl,
}
