use super::CorrectionOutcome;
use crate::error::RepairError;
use crate::llm::ModelChoice;
use crate::target::TargetDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// One prompt → splice → verify round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionAttempt {
    pub iteration: usize,
    pub diagnostics_before: String,
    pub suggestion: String,
    /// `None` when the spliced extract verified clean
    pub diagnostics_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: String,
    pub message: String,
}

/// Summary of one correction run, written by `amend run --report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target: String,
    pub file: String,
    pub model: ModelChoice,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: Vec<CorrectionAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CorrectionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl RunReport {
    pub fn begin(target: &TargetDescriptor, model: ModelChoice) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target: target.method_reference(),
            file: target.relative_file().to_string(),
            model,
            started_at: Utc::now(),
            finished_at: None,
            attempts: Vec::new(),
            outcome: None,
            error: None,
        }
    }

    pub fn finish(&mut self, result: &Result<CorrectionOutcome, RepairError>) {
        self.finished_at = Some(Utc::now());
        match result {
            Ok(outcome) => self.outcome = Some(outcome.clone()),
            Err(err) => {
                self.error = Some(ReportError {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_some() && self.error.is_none()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize report: {}", e))
    }

    pub fn write_to(&self, path: &Path) -> Result<(), String> {
        let content = self.to_json()?;
        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write report to {}: {}", path.display(), e))
    }
}
