// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenAI-compatible chat completions client used as the visual judge.

use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use retouch_core::config::OracleConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::oracle::{OracleError, SYSTEM_PROMPT, USER_PROMPT, VisualJudge};
use crate::retry::{self, RetryConfig};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// PNG bytes as a base64 data URL.
fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn image_part(png: &[u8]) -> ContentPart {
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: png_data_url(png),
            detail: "high",
        },
    }
}

/// Map a non-success HTTP status to an oracle error.
fn status_error(status: StatusCode, body: String) -> OracleError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OracleError::Unauthorized(status.as_u16()),
        _ => OracleError::Http {
            status: status.as_u16(),
            message: body.chars().take(500).collect(),
        },
    }
}

fn transport_error(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout(err.to_string())
    } else {
        OracleError::Connection(err.to_string())
    }
}

/// Vision judge backed by `/chat/completions`.
pub struct OpenAiJudge {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
}

impl OpenAiJudge {
    /// Build a judge from configuration. Fails with
    /// [`OracleError::NotConfigured`] when no API key is set.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(OracleError::NotConfigured)?
            .to_string();

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| OracleError::Connection(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryConfig::with_max_retries(config.max_retries),
        })
    }

    fn request_body(&self, original_png: &[u8], edited_png: &[u8]) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        image_part(original_png),
                        image_part(edited_png),
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn send(&self, request: &ChatRequest<'_>) -> Result<String, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            error!(status = status.as_u16(), "oracle returned an error status");
            return Err(status_error(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|err| OracleError::InvalidResponse(format!("malformed completion: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::InvalidResponse("completion has no content".into()))
    }
}

impl VisualJudge for OpenAiJudge {
    #[instrument(skip_all, fields(model = %self.model, original_bytes = original_png.len(), edited_bytes = edited_png.len()))]
    fn judge(&self, original_png: &[u8], edited_png: &[u8]) -> Result<String, OracleError> {
        let request = self.request_body(original_png, edited_png);
        let content = retry::run(&self.retry, |_| self.send(&request), thread::sleep)?;
        debug!(response_len = content.len(), "oracle answered");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> OracleConfig {
        OracleConfig {
            api_key: Some("sk-test".into()),
            base_url: "https://example.invalid/v1/".into(),
            ..OracleConfig::default()
        }
    }

    #[test]
    fn missing_key_is_not_configured() {
        assert!(matches!(
            OpenAiJudge::from_config(&OracleConfig::default()),
            Err(OracleError::NotConfigured)
        ));
        let blank = OracleConfig {
            api_key: Some("   ".into()),
            ..OracleConfig::default()
        };
        assert!(matches!(OpenAiJudge::from_config(&blank), Err(OracleError::NotConfigured)));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let judge = OpenAiJudge::from_config(&configured()).unwrap();
        assert_eq!(judge.endpoint, "https://example.invalid/v1/chat/completions");
        assert_eq!(judge.retry.max_retries, 2);
    }

    #[test]
    fn request_carries_prompt_and_both_images_in_order() {
        let judge = OpenAiJudge::from_config(&configured()).unwrap();
        let body = serde_json::to_value(judge.request_body(b"before", b"after")).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);

        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], png_data_url(b"before"));
        assert_eq!(parts[1]["image_url"]["detail"], "high");
        assert_eq!(parts[2]["image_url"]["url"], png_data_url(b"after"));
    }

    #[test]
    fn data_url_is_base64_png() {
        assert_eq!(png_data_url(b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn statuses_map_to_errors() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            OracleError::Unauthorized(401)
        ));
        let limited = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(limited.is_transient());
        let bad = status_error(StatusCode::BAD_REQUEST, "x".repeat(2000));
        match bad {
            OracleError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.len(), 500);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn completion_content_is_extracted() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"{\"passed\":true}"}}]}"#)
                .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"passed\":true}"));
    }
}
