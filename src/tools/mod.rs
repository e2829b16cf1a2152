//! External tools: the minimizer and the verifier
//!
//! The correction loop only depends on the [`Minimizer`] and [`Verifier`]
//! traits. The default adapters shell out to Specimin and the Checker
//! Framework.

pub mod minimizer;
pub mod runner;
pub mod verifier;

pub use minimizer::SpeciminMinimizer;
pub use verifier::CheckerFrameworkVerifier;

use crate::error::RepairError;
use crate::target::TargetDescriptor;
use crate::workspace::WorkingCopy;
use std::path::Path;

/// Produces a compilable extract around the target method.
pub trait Minimizer: Send + Sync {
    fn minimize(&self, target: &TargetDescriptor) -> Result<WorkingCopy, RepairError>;
}

/// Runs static verification over one source file.
pub trait Verifier: Send + Sync {
    fn verify(&self, file: &Path) -> Verification;
}

/// Result of one verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Clean,
    /// Checker output from the first `error:` onward
    Diagnostics(String),
    /// The tool itself failed to run
    ToolError(String),
}
