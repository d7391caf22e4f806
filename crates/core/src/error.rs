use crate::array::ArrayError;

/// Errors raised while configuring the facade or building a command line.
///
/// These are raised before (or instead of) spawning a process and are never
/// converted into an empty result.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Must include input keyword argument to all operator calls")]
    MissingInput,

    #[error("Only one output allowed, received {0} output paths")]
    MultipleOutputs(usize),

    #[error("No output path given and forced output is disabled; nothing to reuse")]
    MissingOutput,

    #[error("Unknown value for debug: {0}")]
    InvalidDebugLevel(String),

    #[error("Could not locate the NCO operators (set NCOpath or add ncks to PATH)")]
    NcoNotFound,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Top-level error type for operator invocations.
#[derive(Debug, thiserror::Error)]
pub enum NcoError {
    #[error("Unknown method {0}!")]
    UnknownOperator(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operator ran and exited non-zero.
    #[error("(returncode:{exit_code}) {stderr}")]
    ExecutionFailed {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },

    #[error("Failed to spawn operator process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Temporary file error: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Could not find the NCO version in: {0}")]
    UnrecognizedVersion(String),

    #[error(transparent)]
    Array(#[from] ArrayError),
}

impl NcoError {
    /// `true` when the operator itself ran and reported failure.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ExecutionFailed { .. })
    }

    /// Exit code of a failed operator run, if this is an execution failure.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExecutionFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
