//! Error types for a repair run
//!
//! Every variant of [`RepairError`] is terminal for the run that produced it.
//! The core never retries; a batch driver may start a fresh run.

use thiserror::Error;

/// Malformed target descriptor. Raised before any external tool runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("target file does not match the required format ([path]/[to]/ClassName.java): {0}")]
    File(String),

    #[error("target method does not match the required format (package.Class#method(T1, T2)): {0}")]
    Method(String),

    #[error("target path is not usable: {0}")]
    Path(String),
}

/// Failure to splice a method into a Java source file.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("unparseable method: {0}")]
    Unparseable(String),

    #[error("incomplete method signature: missing {0}")]
    InvalidSignature(&'static str),

    #[error("invalid parameter: '{0}'")]
    InvalidParameter(String),

    #[error("no type declaration found in file")]
    NoPrimaryType,

    #[error("method '{0}' not found in primary type")]
    MethodNotFound(String),

    #[error("suggestion rewrites '{found}' instead of '{expected}'")]
    UnexpectedMethod { expected: String, found: String },

    #[error("signature mismatch: expected one of [{expected}], got {found}")]
    SignatureMismatch { expected: String, found: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to the language model.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model response took longer than {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("no API key configured. Run 'amend setup' or set OPENAI_API_KEY")]
    MissingApiKey,

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("mock response unavailable: {0}")]
    Mock(String),

    #[error("model calls are disabled in dry-run mode")]
    Disabled,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// Run-level failure of the correction pipeline.
#[derive(Error, Debug)]
pub enum RepairError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("minimization failed: {0}")]
    Minimization(String),

    #[error("verification tool failed: {0}")]
    VerificationTool(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model response contained no fenced code block")]
    EmptySuggestion,

    #[error("splice failed: {0}")]
    Splice(#[from] SpliceError),

    #[error("promotion failed: {0}")]
    Promotion(String),

    #[error("no convergence after {iterations} iteration(s): {reason}")]
    NonConvergence { iterations: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepairError {
    /// Short machine-readable label, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RepairError::Format(_) => "format",
            RepairError::Minimization(_) => "minimization",
            RepairError::VerificationTool(_) => "verification_tool",
            RepairError::Llm(LlmError::Timeout(_)) => "llm_timeout",
            RepairError::Llm(_) => "llm_transport",
            RepairError::EmptySuggestion => "empty_suggestion",
            RepairError::Splice(SpliceError::SignatureMismatch { .. }) => "signature_mismatch",
            RepairError::Splice(_) => "splice",
            RepairError::Promotion(_) => "promotion",
            RepairError::NonConvergence { .. } => "non_convergence",
            RepairError::Io(_) => "io",
        }
    }
}
