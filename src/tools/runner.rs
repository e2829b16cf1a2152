use crate::util::{run_command_with_timeout, tail_chars};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

const OUTPUT_TAIL_MAX_CHARS: usize = 8_000;

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, cwd: impl AsRef<Path>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line for logs
    pub fn label(&self) -> String {
        let mut label = self.program.clone();
        for arg in &self.args {
            label.push(' ');
            label.push_str(arg);
        }
        label
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub name: String,
    pub command: String,
    pub duration_ms: u64,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// stdout then stderr, untruncated
    pub output: String,
    /// Set when the process could not be started or waited on
    pub spawn_error: Option<String>,
}

impl CommandOutcome {
    pub fn ran(&self) -> bool {
        self.spawn_error.is_none() && !self.timed_out
    }

    /// The last few thousand characters of `output`, for logs and error messages
    pub fn output_tail(&self) -> &str {
        tail_chars(&self.output, OUTPUT_TAIL_MAX_CHARS)
    }

    /// Short reason for a failed run, for error messages
    pub fn failure_summary(&self) -> String {
        if let Some(error) = &self.spawn_error {
            return format!("{}: {}", self.name, error);
        }
        if self.timed_out {
            return format!("{} timed out after {}ms", self.name, self.duration_ms);
        }
        match self.exit_code {
            Some(code) => format!("{} exited with status {}", self.name, code),
            None => format!("{} was terminated by a signal", self.name),
        }
    }
}

pub fn run_command(spec: &CommandSpec) -> CommandOutcome {
    let mut command = Command::new(&spec.program);
    command.current_dir(&spec.cwd).args(&spec.args);

    let start = Instant::now();
    let command_label = spec.label();
    tracing::debug!(name = %spec.name, command = %command_label, cwd = %spec.cwd.display(), "running");

    match run_command_with_timeout(&mut command, spec.timeout) {
        Ok(result) => {
            for line in result.stdout.lines().chain(result.stderr.lines()) {
                tracing::trace!(target: "amend::tools::output", "{}", line);
            }
            CommandOutcome {
                name: spec.name.clone(),
                command: command_label,
                duration_ms: start.elapsed().as_millis() as u64,
                success: result.success(),
                exit_code: result.status.and_then(|s| s.code()),
                timed_out: result.timed_out,
                output: result.combined_output(),
                spawn_error: None,
            }
        }
        Err(error) => CommandOutcome {
            name: spec.name.clone(),
            command: command_label,
            duration_ms: start.elapsed().as_millis() as u64,
            success: false,
            exit_code: None,
            timed_out: false,
            output: String::new(),
            spawn_error: Some(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_joins_args() {
        let spec = CommandSpec::new("java", "/tmp", "java")
            .arg("-jar")
            .arg("checker.jar");
        assert_eq!(spec.label(), "java -jar checker.jar");
    }

    #[test]
    fn test_spawn_failure_is_recorded() {
        let spec = CommandSpec::new("missing", std::env::temp_dir(), "amend-no-such-program");
        let outcome = run_command(&spec);
        assert!(!outcome.success);
        assert!(!outcome.ran());
        assert!(outcome.failure_summary().starts_with("missing:"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_is_recorded() {
        let spec = CommandSpec::new("sh", std::env::temp_dir(), "sh")
            .arg("-c")
            .arg("echo boom; exit 4");
        let outcome = run_command(&spec);
        assert!(outcome.ran());
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(4));
        assert!(outcome.output.contains("boom"));
        assert_eq!(outcome.failure_summary(), "sh exited with status 4");
    }

    #[cfg(unix)]
    #[test]
    fn test_long_output_is_kept_whole() {
        let spec = CommandSpec::new("sh", std::env::temp_dir(), "sh")
            .arg("-c")
            .arg("echo 'C.java:3: error: leak'; i=0; while [ $i -lt 300 ]; do echo \"C.java:$i: warning: [deprecation] a fairly long warning line\"; i=$((i+1)); done");
        let outcome = run_command(&spec);
        assert!(outcome.output.chars().count() > OUTPUT_TAIL_MAX_CHARS);
        assert!(outcome.output.starts_with("C.java:3: error: leak"));
        assert_eq!(outcome.output_tail().chars().count(), OUTPUT_TAIL_MAX_CHARS);
        assert!(!outcome.output_tail().contains("error: leak"));
    }
}
