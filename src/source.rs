//! Candidate source implementations.
//!
//! - **[`OpenAiSource`]** asks a chat-completions model for listings as a
//!   JSON array, with retry and backoff.
//! - **[`FileSource`]** replays a saved response (or a hand-written JSON
//!   array) from disk.
//! - **[`DisabledSource`]** refuses every fetch.
//!
//! Use [`create_source`] to build the one selected by `[source].provider`.
//!
//! # Failure mapping
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Network error / timeout after all retries | [`SourceError::Unreachable`] |
//! | HTTP 429 / 5xx after all retries | [`SourceError::BadResponse`] |
//! | Other HTTP error status | [`SourceError::BadResponse`] (no retry) |
//! | Malformed envelope or empty content | [`SourceError::BadResponse`] |
//! | Response file cannot be read | [`SourceError::Unreachable`] |
//!
//! Only `Unreachable` fails an ingestion cycle.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use car_scout_core::{CandidateSource, SourceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Config, SourceConfig};

const SYSTEM_PROMPT: &str = "You are a sports car search specialist with access to current \
automotive market data. Provide realistic and accurate information about sports cars currently \
available in the market.";

/// Build the candidate source selected by the configuration.
///
/// # Errors
///
/// Fails if the OpenAI provider is selected and `OPENAI_API_KEY` is not
/// set, or if the file provider has no `path`.
pub fn create_source(config: &Config) -> Result<Box<dyn CandidateSource>> {
    match config.source.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiSource::new(&config.source)?)),
        "file" => {
            let path = config
                .source
                .path
                .clone()
                .context("source.path required for file provider")?;
            Ok(Box::new(FileSource::new(path)))
        }
        "disabled" => Ok(Box::new(DisabledSource)),
        other => bail!("Unknown source provider: {}", other),
    }
}

/// Build the user prompt for a query.
pub fn build_prompt(query: &str, count: usize) -> String {
    format!(
        r#"List {count} {query} that are currently available for sale in the US market.
For each car, provide the following information in a JSON array format:
- make (manufacturer name)
- model (model name)
- year (4-digit year)
- price (realistic MSRP in USD, numeric value)
- url (use a placeholder URL like https://manufacturer.com/model)
- description (brief description including key features)
- image_url (use placeholder)

Return ONLY a valid JSON array with realistic data for actual current models. Example format:
[
  {{
    "make": "Ferrari",
    "model": "296 GTB",
    "year": 2024,
    "price": 321400,
    "url": "https://ferrari.com/296-gtb",
    "description": "Hybrid V6 supercar with 818 hp",
    "image_url": "https://ferrari.com/296-gtb.jpg"
  }}
]"#
    )
}

// ============ Disabled ============

/// Source used when `provider = "disabled"`.
pub struct DisabledSource;

#[async_trait]
impl CandidateSource for DisabledSource {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn fetch(&self, _query: &str) -> Result<String, SourceError> {
        Err(SourceError::Unreachable(
            "candidate source is disabled (set [source].provider)".to_string(),
        ))
    }
}

// ============ File ============

/// Reads the response text from a file on every fetch; the query is only
/// logged.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CandidateSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, query: &str) -> Result<String, SourceError> {
        debug!(query, path = %self.path.display(), "reading candidates from file");
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Unreachable(format!("cannot read {}: {}", self.path.display(), e))
        })
    }
}

// ============ OpenAI ============

/// Chat-completions backed source.
///
/// Calls `POST {api_base}/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAiSource {
    api_key: String,
    config: SourceConfig,
    client: reqwest::Client,
}

impl OpenAiSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &SourceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            api_key: api_key.into(),
            config: config.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first non-empty assistant message out of a response body.
fn parse_chat_response(body: &str) -> Result<String, SourceError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::BadResponse(format!("malformed chat response: {}", e)))?;
    parsed
        .choices
        .into_iter()
        .find_map(|c| c.message.content.filter(|s| !s.trim().is_empty()))
        .ok_or_else(|| SourceError::BadResponse("no response content from model".to_string()))
}

#[async_trait]
impl CandidateSource for OpenAiSource {
    fn name(&self) -> &str {
        "openai"
    }

    async fn fetch(&self, query: &str) -> Result<String, SourceError> {
        let prompt = build_prompt(query, self.config.count);
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };
        let url = self.endpoint();

        let mut last_err: Option<SourceError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(self.api_key.trim())
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        return parse_chat_response(&text);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "OpenAI request failed; will retry");
                        last_err = Some(SourceError::BadResponse(format!(
                            "OpenAI API error {}: {}",
                            status, text
                        )));
                        continue;
                    }

                    return Err(SourceError::BadResponse(format!(
                        "OpenAI API error {}: {}",
                        status, text
                    )));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "OpenAI request did not complete");
                    last_err = Some(SourceError::Unreachable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SourceError::Unreachable("OpenAI request failed after retries".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_query_and_count() {
        let p = build_prompt("electric hatchbacks", 5);
        assert!(p.starts_with("List 5 electric hatchbacks"));
        assert!(p.contains("\"make\": \"Ferrari\""));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[{\"make\":\"BMW\"}]"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), r#"[{"make":"BMW"}]"#);
    }

    #[test]
    fn test_parse_chat_response_empty_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            parse_chat_response(body),
            Err(SourceError::BadResponse(_))
        ));
        assert!(matches!(
            parse_chat_response("<html>bad gateway</html>"),
            Err(SourceError::BadResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let cfg = SourceConfig {
            api_base: "http://localhost:9999/v1/".to_string(),
            ..SourceConfig::default()
        };
        let src = OpenAiSource::with_api_key(&cfg, "sk-test").unwrap();
        assert_eq!(src.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unreachable() {
        let src = FileSource::new("/definitely/not/here.json");
        assert!(matches!(
            src.fetch("q").await,
            Err(SourceError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_source() {
        assert!(matches!(
            DisabledSource.fetch("q").await,
            Err(SourceError::Unreachable(_))
        ));
    }
}
