#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run completed but one or more checks failed.
    ChecksFailed = 10,

    /// Invalid CLI/profile/scenario options (bad flags, bad YAML, invalid stages, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, task failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_checks(checks_passed: bool) -> Self {
        if checks_passed {
            Self::Success
        } else {
            Self::ChecksFailed
        }
    }
}
