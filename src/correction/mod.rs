//! The correction loop
//!
//! Minimize once, then verify → prompt → extract → splice until the checker
//! is quiet, then promote the corrected method into the original file.
//!
//! The loop is bounded by `max_iterations` and stops early when a correction
//! leaves the diagnostics unchanged.

pub mod promotion;
pub mod report;


pub use promotion::promote;
pub use report::{CorrectionAttempt, RunReport};

use crate::config::Config;
use crate::error::RepairError;
use crate::java::splice_file;
use crate::llm::{extract_code_block, LanguageModel, ModelChoice};
use crate::prompt::PromptTemplate;
use crate::target::TargetDescriptor;
use crate::tools::{Minimizer, Verification, Verifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs for one correction run
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    pub model: ModelChoice,
    pub max_iterations: usize,
    /// Treat verifier crashes as a clean result
    pub tool_error_is_clean: bool,
    pub prompt: PromptTemplate,
}

impl CorrectionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model,
            max_iterations: config.max_iterations,
            tool_error_is_clean: config.tool_error_is_clean,
            prompt: PromptTemplate::new(config.prompt_prefix.clone(), config.prompt_suffix.clone()),
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Progress notifications. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionEvent {
    Minimized { dir: PathBuf },
    Verified { iteration: usize, diagnostics: Option<String> },
    Prompting { iteration: usize },
    SuggestionReceived { iteration: usize, chars: usize },
    Spliced { iteration: usize },
    Promoting { file: PathBuf },
    Promoted { file: PathBuf },
}

impl CorrectionEvent {
    fn log(&self) {
        match self {
            CorrectionEvent::Minimized { dir } => {
                tracing::info!(dir = %dir.display(), "working copy ready")
            }
            CorrectionEvent::Verified {
                iteration,
                diagnostics: None,
            } => tracing::info!(iteration, "verification clean"),
            CorrectionEvent::Verified {
                iteration,
                diagnostics: Some(diagnostics),
            } => tracing::warn!(iteration, "verification reported errors:\n{}", diagnostics),
            CorrectionEvent::Prompting { iteration } => {
                tracing::info!(iteration, "requesting correction")
            }
            CorrectionEvent::SuggestionReceived { iteration, chars } => {
                tracing::info!(iteration, chars, "suggestion received")
            }
            CorrectionEvent::Spliced { iteration } => tracing::info!(iteration, "suggestion spliced"),
            CorrectionEvent::Promoting { file } => {
                tracing::info!(file = %file.display(), "promoting corrected method")
            }
            CorrectionEvent::Promoted { file } => {
                tracing::info!(file = %file.display(), "original updated")
            }
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// The first verification was clean. Nothing was prompted or written.
    AlreadyClean,
    /// The corrected method was promoted into the original file.
    Corrected { iterations: usize },
    /// Verified once and stopped. `None` means the extract was clean.
    DryRun { diagnostics: Option<String> },
}

/// Result of a run plus its report
#[derive(Debug)]
pub struct CorrectionRun {
    pub result: Result<CorrectionOutcome, RepairError>,
    pub report: RunReport,
}

pub async fn run_correction(
    target: &TargetDescriptor,
    minimizer: &dyn Minimizer,
    verifier: &dyn Verifier,
    model: &dyn LanguageModel,
    config: &CorrectionConfig,
) -> CorrectionRun {
    run_correction_with_progress(target, minimizer, verifier, model, config, |_| {}).await
}

pub async fn run_correction_with_progress<F>(
    target: &TargetDescriptor,
    minimizer: &dyn Minimizer,
    verifier: &dyn Verifier,
    model: &dyn LanguageModel,
    config: &CorrectionConfig,
    mut on_progress: F,
) -> CorrectionRun
where
    F: FnMut(&CorrectionEvent),
{
    let mut report = RunReport::begin(target, config.model);
    tracing::info!(run_id = %report.run_id, target = %target, model = %config.model, "starting correction");

    let mut emit = |event: CorrectionEvent| {
        event.log();
        on_progress(&event);
    };
    let result = drive(
        target,
        minimizer,
        verifier,
        model,
        config,
        &mut report.attempts,
        &mut emit,
    )
    .await;

    match &result {
        Ok(outcome) => tracing::info!(?outcome, "correction finished"),
        Err(err) => tracing::error!(kind = err.kind(), "correction failed: {}", err),
    }
    report.finish(&result);
    CorrectionRun { result, report }
}

async fn drive<E>(
    target: &TargetDescriptor,
    minimizer: &dyn Minimizer,
    verifier: &dyn Verifier,
    model: &dyn LanguageModel,
    config: &CorrectionConfig,
    attempts: &mut Vec<CorrectionAttempt>,
    emit: &mut E,
) -> Result<CorrectionOutcome, RepairError>
where
    E: FnMut(CorrectionEvent),
{
    let original = target.original_file()?;

    // Dropping the working copy removes it, on every exit path below
    let working = minimizer.minimize(target)?;
    emit(CorrectionEvent::Minimized {
        dir: working.dir().to_path_buf(),
    });

    let first = verify_step(verifier, working.file(), config, 0, emit)?;
    if !config.model.corrects() {
        return Ok(CorrectionOutcome::DryRun { diagnostics: first });
    }
    let Some(mut diagnostics) = first else {
        return Ok(CorrectionOutcome::AlreadyClean);
    };

    let mut iteration = 0;
    loop {
        if iteration >= config.max_iterations {
            return Err(RepairError::NonConvergence {
                iterations: iteration,
                reason: "iteration limit reached with diagnostics remaining".to_string(),
            });
        }
        iteration += 1;

        let source = tokio::fs::read_to_string(working.file()).await?;
        let prompt = config
            .prompt
            .build(&source, target.method_name(), &diagnostics);

        emit(CorrectionEvent::Prompting { iteration });
        let response = model.complete(&prompt).await?;
        let suggestion = extract_code_block(&response).ok_or(RepairError::EmptySuggestion)?;
        emit(CorrectionEvent::SuggestionReceived {
            iteration,
            chars: suggestion.chars().count(),
        });

        splice_file(working.file(), &suggestion, Some(target.method_name()))?;
        emit(CorrectionEvent::Spliced { iteration });

        let after = verify_step(verifier, working.file(), config, iteration, emit)?;
        attempts.push(CorrectionAttempt {
            iteration,
            diagnostics_before: diagnostics.clone(),
            suggestion,
            diagnostics_after: after.clone(),
        });

        match after {
            None => break,
            Some(next) if next == diagnostics => {
                return Err(RepairError::NonConvergence {
                    iterations: iteration,
                    reason: "correction left the diagnostics unchanged".to_string(),
                });
            }
            Some(next) => diagnostics = next,
        }
    }

    emit(CorrectionEvent::Promoting {
        file: original.clone(),
    });
    promote(working.file(), &original, target)?;
    emit(CorrectionEvent::Promoted { file: original });

    Ok(CorrectionOutcome::Corrected {
        iterations: iteration,
    })
}

/// `Ok(None)` when clean, `Ok(Some(diagnostics))` otherwise.
fn verify_step<E>(
    verifier: &dyn Verifier,
    file: &Path,
    config: &CorrectionConfig,
    iteration: usize,
    emit: &mut E,
) -> Result<Option<String>, RepairError>
where
    E: FnMut(CorrectionEvent),
{
    let diagnostics = match verifier.verify(file) {
        Verification::Clean => None,
        Verification::Diagnostics(text) if text.trim().is_empty() => None,
        Verification::Diagnostics(text) => Some(text),
        Verification::ToolError(message) if config.tool_error_is_clean => {
            tracing::warn!("verifier failed ({}); treating as clean", message);
            None
        }
        Verification::ToolError(message) => return Err(RepairError::VerificationTool(message)),
    };

    emit(CorrectionEvent::Verified {
        iteration,
        diagnostics: diagnostics.clone(),
    });
    Ok(diagnostics)
}
