use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which model answers the correction prompts
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ModelChoice {
    /// OpenAI-compatible chat model
    #[default]
    #[serde(rename = "gpt-4")]
    #[value(name = "gpt-4")]
    Gpt4,
    /// Canned response read from `mock_response_path`
    #[serde(rename = "mock")]
    #[value(name = "mock")]
    Mock,
    /// Minimize and verify once, report diagnostics, change nothing
    #[serde(rename = "dryrun")]
    #[value(name = "dryrun")]
    DryRun,
}

impl ModelChoice {
    pub fn id(&self) -> &'static str {
        match self {
            ModelChoice::Gpt4 => "gpt-4",
            ModelChoice::Mock => "mock",
            ModelChoice::DryRun => "dryrun",
        }
    }

    /// Whether a run with this model may prompt, splice and promote
    pub fn corrects(&self) -> bool {
        !matches!(self, ModelChoice::DryRun)
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gpt-4" => Ok(ModelChoice::Gpt4),
            "mock" => Ok(ModelChoice::Mock),
            "dryrun" => Ok(ModelChoice::DryRun),
            other => Err(format!(
                "unsupported model '{}' (expected gpt-4, mock or dryrun)",
                other
            )),
        }
    }
}

/// Token usage reported by the chat endpoint
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}
