use super::runner::{run_command, CommandOutcome, CommandSpec};
use super::{Verification, Verifier};
use crate::config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ERROR_MARKER: &str = "error:";

/// Compiles one file with the Checker Framework's javac wrapper.
#[derive(Debug, Clone)]
pub struct CheckerFrameworkVerifier {
    checker_jar: PathBuf,
    classpath: String,
    processors: String,
    timeout: Duration,
}

impl CheckerFrameworkVerifier {
    pub fn new(
        checker_jar: impl Into<PathBuf>,
        classpath: impl Into<String>,
        processors: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            checker_jar: checker_jar.into(),
            classpath: classpath.into(),
            processors: processors.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.checker_jar.clone(),
            config.checker_classpath.clone(),
            config.checker_processors.clone(),
            Duration::from_secs(config.verifier_timeout_secs),
        )
    }

    fn command_for(&self, file: &Path, class_dir: &Path) -> CommandSpec {
        let cwd = file.parent().unwrap_or_else(|| Path::new("."));
        CommandSpec::new("checker", cwd, "java")
            .arg("-jar")
            .arg(self.checker_jar.display().to_string())
            .arg("-cp")
            .arg(self.classpath.clone())
            .arg("-processor")
            .arg(self.processors.clone())
            .arg("-d")
            .arg(class_dir.display().to_string())
            .arg(file.display().to_string())
            .timeout(self.timeout)
    }
}

impl Verifier for CheckerFrameworkVerifier {
    fn verify(&self, file: &Path) -> Verification {
        // Class files go to a scratch dir so the working copy only holds sources
        let class_dir = match tempfile::Builder::new().prefix("amend-classes-").tempdir() {
            Ok(dir) => dir,
            Err(e) => return Verification::ToolError(format!("cannot create class dir: {}", e)),
        };

        let spec = self.command_for(file, class_dir.path());
        tracing::info!(file = %file.display(), "running checker");
        let outcome = run_command(&spec);

        classify(&outcome, file)
    }
}

/// Map a finished checker run to a verification result.
///
/// Diagnostics are searched in the whole output, never in the log tail.
fn classify(outcome: &CommandOutcome, file: &Path) -> Verification {
    if !outcome.ran() {
        tracing::error!("{}", outcome.failure_summary());
        return Verification::ToolError(outcome.failure_summary());
    }

    match extract_errors(&outcome.output) {
        Some(diagnostics) => {
            tracing::warn!(lines = diagnostics.lines().count(), "checker reported errors");
            Verification::Diagnostics(diagnostics)
        }
        None => {
            tracing::info!(file = %file.display(), "checker is clean");
            Verification::Clean
        }
    }
}

/// Everything from the first `error:` onward, trimmed.
pub fn extract_errors(output: &str) -> Option<String> {
    let start = output.find(ERROR_MARKER)?;
    let errors = output[start..].trim();
    (!errors.is_empty()).then(|| errors.to_string())
}
