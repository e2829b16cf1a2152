use super::runner::{run_command, CommandSpec};
use super::Minimizer;
use crate::config::Config;
use crate::error::RepairError;
use crate::target::TargetDescriptor;
use crate::workspace::WorkingCopy;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(windows)]
const GRADLE_WRAPPER: &str = "gradlew.bat";
#[cfg(not(windows))]
const GRADLE_WRAPPER: &str = "gradlew";

/// Runs Specimin through its Gradle wrapper.
#[derive(Debug, Clone)]
pub struct SpeciminMinimizer {
    specimin_dir: PathBuf,
    timeout: Duration,
    tolerate_exit_failure: bool,
}

impl SpeciminMinimizer {
    pub fn new(specimin_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            specimin_dir: specimin_dir.into(),
            timeout,
            tolerate_exit_failure: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.specimin_dir.clone(),
            Duration::from_secs(config.minimizer_timeout_secs),
        )
        .tolerate_exit_failure(!config.model.corrects())
    }

    /// Keep going after a non-zero Specimin exit as long as the extract exists.
    pub fn tolerate_exit_failure(mut self, tolerate: bool) -> Self {
        self.tolerate_exit_failure = tolerate;
        self
    }

    fn command_for(&self, target: &TargetDescriptor, output_dir: &Path) -> CommandSpec {
        let args = format!(
            "--args=--outputDirectory \"{}\" --root \"{}\" --targetFile \"{}\" --targetMethod \"{}\"",
            output_dir.display(),
            target.root().display(),
            target.relative_file(),
            target.method_reference()
        );
        CommandSpec::new(
            "specimin",
            &self.specimin_dir,
            self.specimin_dir.join(GRADLE_WRAPPER).display().to_string(),
        )
        .arg("run")
        .arg(args)
        .timeout(self.timeout)
    }
}

impl Minimizer for SpeciminMinimizer {
    fn minimize(&self, target: &TargetDescriptor) -> Result<WorkingCopy, RepairError> {
        let working_copy = WorkingCopy::create(target)?;
        let spec = self.command_for(target, working_copy.dir());
        tracing::info!(command = %spec.label(), "running specimin");

        let outcome = run_command(&spec);
        if !outcome.ran() {
            return Err(RepairError::Minimization(outcome.failure_summary()));
        }
        if !outcome.success {
            if self.tolerate_exit_failure {
                tracing::warn!("{}; continuing", outcome.failure_summary());
            } else {
                return Err(RepairError::Minimization(format!(
                    "{}\n{}",
                    outcome.failure_summary(),
                    outcome.output_tail().trim()
                )));
            }
        }

        if !working_copy.is_populated() {
            return Err(RepairError::Minimization(format!(
                "specimin produced no '{}' in {}",
                target.relative_file(),
                working_copy.dir().display()
            )));
        }

        tracing::info!(
            dir = %working_copy.dir().display(),
            duration_ms = outcome.duration_ms,
            "minimized"
        );
        Ok(working_copy)
    }
}
