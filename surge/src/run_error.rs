use crate::exit_codes::ExitCode;

/// Why a subcommand stopped before producing a verdict on the checks.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Flags, profile or scenario config were rejected before any request went out.
    #[error("{0:#}")]
    InvalidInput(anyhow::Error),

    /// The scenario started but the run or its report could not complete.
    #[error("{0:#}")]
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }
}

/// Print a failed outcome to stderr and collapse it into the process exit code.
pub fn report(outcome: Result<ExitCode, RunError>) -> ExitCode {
    outcome.unwrap_or_else(|err| {
        eprintln!("{err}");
        err.exit_code()
    })
}
