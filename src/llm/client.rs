use super::models::Usage;
use super::{wait_with_heartbeat, LanguageModel};
use crate::config::Config;
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000; // 2 seconds
const BACKOFF_MULTIPLIER: u64 = 2; // Exponential backoff

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model_id: String,
    system_message: String,
    heartbeat: Duration,
    timeout: Duration,
}

impl ChatClient {
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key = config.api_key().ok_or(LlmError::MissingApiKey)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            model_id: config.model_id.clone(),
            system_message: config.system_message.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            timeout: Duration::from_secs(config.response_timeout_secs),
        })
    }

    async fn send(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model_id,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_message,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut retry_count = 0;
        loop {
            tracing::info!(url = %self.api_url, model = %self.model_id, "sending chat request");
            let response = self
                .http
                .post(&self.api_url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let retry_header = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await?;
            tracing::info!(status = status.as_u16(), "chat response received");

            if status.is_success() {
                return parse_chat_response(&text);
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let retry_after = retry_header
                    .or_else(|| parse_retry_after(&text))
                    .unwrap_or_else(|| {
                        (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                    });

                tracing::warn!(
                    "rate limited, retrying in {}s (attempt {}/{})",
                    retry_after,
                    retry_count,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            let message = match status.as_u16() {
                401 => "Invalid API key. Run 'amend setup' to update it.".to_string(),
                429 => format!("Rate limited after {} retries", retry_count),
                500..=599 => "Server error. The service may be temporarily unavailable.".to_string(),
                _ => truncate_str(&text, 200).to_string(),
            };
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        wait_with_heartbeat(self.send(prompt), self.heartbeat, self.timeout).await
    }
}

fn parse_chat_response(text: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| LlmError::MalformedResponse(format!("{}: {}", e, truncate_str(text, 200))))?;

    if let Some(usage) = &parsed.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "token usage"
        );
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

/// Extract a retry-after hint from an error body (if present)
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    let after_retry = &text_lower[pos..];
    for word in after_retry.split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word
            .trim_matches(|c: char| !c.is_numeric())
            .parse::<u64>()
        {
            if secs > 0 && secs < 300 {
                return Some(secs);
            }
        }
    }
    None
}

/// Truncate a string for display (Unicode-safe)
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"```java\nvoid a() {}\n```"}}],"usage":{"total_tokens":5}}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "```java\nvoid a() {}\n```");
    }

    #[test]
    fn test_null_content_is_empty() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "");
    }

    #[test]
    fn test_malformed_response() {
        assert!(matches!(
            parse_chat_response("not json"),
            Err(LlmError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_chat_response(r#"{"choices":[]}"#),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("Please retry after 7 seconds"), Some(7));
        assert_eq!(parse_retry_after("slow down"), None);
        assert_eq!(parse_retry_after("retry in 9000 seconds"), None);
    }

    #[test]
    fn test_truncate_str_unicode() {
        assert_eq!(truncate_str("ééééé", 2), "éé");
        assert_eq!(truncate_str("ab", 5), "ab");
    }
}
