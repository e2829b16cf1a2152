//! Batch traversal
//!
//! Walks a directory for Java sources and repairs every public method of
//! every public top-level type, one run at a time. A failed run is logged
//! and the batch moves on.

use crate::correction::{run_correction, CorrectionConfig, CorrectionOutcome};
use crate::java::public_method_references;
use crate::llm::LanguageModel;
use crate::target::{TargetDescriptor, SOURCE_EXTENSION};
use crate::tools::{Minimizer, Verifier};
use crate::util::slash_relative;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Conventional Maven/Gradle source root
pub const JAVA_SOURCE_DIR: &str = "src/main/java";

/// One method to repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTarget {
    pub root: PathBuf,
    pub relative_file: String,
    pub method_ref: String,
}

#[derive(Debug)]
pub struct BatchResult {
    pub target: String,
    pub outcome: std::result::Result<CorrectionOutcome, String>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<BatchResult>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Enumerate targets under `dir`. Files must live under `project_root`.
///
/// Files under `<project_root>/src/main/java` are addressed relative to that
/// source root, which also becomes their root.
pub fn discover_targets(dir: &Path, project_root: &Path) -> Result<Vec<BatchTarget>> {
    if !dir.is_dir() {
        bail!("'{}' does not exist or is not a directory", dir.display());
    }
    let root = project_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve project root '{}'", project_root.display()))?;
    let source_root = root.join(JAVA_SOURCE_DIR);

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION))
        .collect();
    files.sort();

    let mut targets = Vec::new();
    for file in files {
        let absolute = match file.canonicalize() {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(file = %file.display(), "cannot resolve: {}", err);
                continue;
            }
        };

        let (file_root, relative) = if absolute.starts_with(&source_root) {
            (source_root.clone(), slash_relative(&source_root, &absolute))
        } else {
            (root.clone(), slash_relative(&root, &absolute))
        };
        let Some(relative) = relative else {
            tracing::warn!(
                file = %absolute.display(),
                "project root '{}' is not a prefix of this file; skipping",
                root.display()
            );
            continue;
        };

        let contents = match std::fs::read_to_string(&absolute) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(file = %absolute.display(), "cannot read: {}", err);
                continue;
            }
        };

        for method_ref in public_method_references(&contents) {
            targets.push(BatchTarget {
                root: file_root.clone(),
                relative_file: relative.clone(),
                method_ref,
            });
        }
    }

    tracing::info!(count = targets.len(), dir = %dir.display(), "discovered targets");
    Ok(targets)
}

/// Run every target in order. Never stops early.
pub async fn run_batch(
    targets: &[BatchTarget],
    minimizer: &dyn Minimizer,
    verifier: &dyn Verifier,
    model: &dyn LanguageModel,
    config: &CorrectionConfig,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (index, target) in targets.iter().enumerate() {
        tracing::info!(
            "[{}/{}] {} in {}",
            index + 1,
            targets.len(),
            target.method_ref,
            target.relative_file
        );

        let outcome = match TargetDescriptor::parse(&target.root, &target.relative_file, &target.method_ref) {
            Ok(descriptor) => run_correction(&descriptor, minimizer, verifier, model, config)
                .await
                .result
                .map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };

        if let Err(err) = &outcome {
            tracing::error!(target = %target.method_ref, "failed: {}", err);
        }
        summary.results.push(BatchResult {
            target: target.method_ref.clone(),
            outcome,
        });
    }

    tracing::info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "batch complete"
    );
    summary
}
