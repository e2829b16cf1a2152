//! Language model access
//!
//! The correction loop only sees [`LanguageModel`]. Concrete models are
//! picked from [`ModelChoice`] by [`model_for`].

pub mod client;
pub mod models;
pub mod parse;

pub use client::ChatClient;
pub use models::ModelChoice;
pub use parse::extract_code_block;

use crate::config::Config;
use crate::error::LlmError;
use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Something that turns a prompt into a free-text answer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Answers every prompt with the contents of a file.
pub struct MockModel {
    response_path: PathBuf,
}

impl MockModel {
    pub fn new(response_path: impl Into<PathBuf>) -> Self {
        Self {
            response_path: response_path.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        tokio::fs::read_to_string(&self.response_path)
            .await
            .map_err(|e| LlmError::Mock(format!("{}: {}", self.response_path.display(), e)))
    }
}

/// Stand-in for dry runs, which never prompt.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

/// Build the model selected in `config`.
pub fn model_for(config: &Config) -> Result<Box<dyn LanguageModel>, LlmError> {
    match config.model {
        ModelChoice::Gpt4 => Ok(Box::new(ChatClient::from_config(config)?)),
        ModelChoice::Mock => {
            let path = config.mock_response_path.clone().ok_or_else(|| {
                LlmError::Mock("mock_response_path is not configured".to_string())
            })?;
            Ok(Box::new(MockModel::new(path)))
        }
        ModelChoice::DryRun => Ok(Box::new(DisabledModel)),
    }
}

/// Await `request`, logging a heartbeat every `heartbeat` and giving up after `limit`.
///
/// The heartbeat task is aborted however the wait ends. A zero heartbeat
/// disables it.
pub async fn wait_with_heartbeat<F, T>(
    request: F,
    heartbeat: Duration,
    limit: Duration,
) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    let heartbeat_task = (!heartbeat.is_zero()).then(|| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracing::info!("still waiting for model response...");
            }
        })
    });

    let result = tokio::time::timeout(limit, request).await;

    if let Some(task) = heartbeat_task {
        task.abort();
    }

    match result {
        Ok(inner) => inner,
        Err(_) => {
            tracing::error!("model response took longer than {:?}", limit);
            Err(LlmError::Timeout(limit.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_timeout_is_reported_as_timeout() {
        let never = std::future::pending::<Result<String, LlmError>>();
        let result =
            wait_with_heartbeat(never, Duration::from_millis(10), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_response_passes_through() {
        let ready = async { Ok::<_, LlmError>("answer".to_string()) };
        let result = wait_with_heartbeat(ready, Duration::ZERO, Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), "answer");
    }

    #[tokio::test]
    async fn test_inner_error_is_not_masked() {
        let failing = async { Err::<String, _>(LlmError::Transport("reset".to_string())) };
        let result = wait_with_heartbeat(failing, Duration::from_secs(1), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(LlmError::Transport(_))));
    }

    #[tokio::test]
    async fn test_mock_model_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("response.txt");
        std::fs::write(&path, "```java\nvoid a() {}\n```").unwrap();

        let model = MockModel::new(&path);
        assert_eq!(model.complete("ignored").await.unwrap(), "```java\nvoid a() {}\n```");

        let missing = MockModel::new(dir.path().join("absent.txt"));
        assert!(matches!(missing.complete("x").await, Err(LlmError::Mock(_))));
    }

    #[test]
    fn test_model_for_selection() {
        let config = Config {
            model: ModelChoice::Mock,
            ..Config::default()
        };
        assert!(matches!(model_for(&config), Err(LlmError::Mock(_))));

        let config = Config {
            model: ModelChoice::DryRun,
            ..Config::default()
        };
        assert!(model_for(&config).is_ok());
    }
}
