use crate::config::Settings;
use crate::error::{AnalysisError, TransportError};
use crate::llm::{LlmClient, Provider};
use crate::prompt::PromptPayload;
use anyhow::Context;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        Self::new(
            api_key,
            settings.gemini_base_url.clone(),
            settings.gemini_model.clone(),
            Duration::from_secs(settings.gemini_timeout_secs),
        )
    }

    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(payload: &PromptPayload) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: payload.text.clone(),
        }];
        if let Some(image) = &payload.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                },
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                candidate_count: 1,
                response_mime_type: "application/json",
            },
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                after: self.timeout,
            }
        } else if err.is_connect() {
            TransportError::Connect(error_chain(&err))
        } else {
            TransportError::Request(error_chain(&err))
        }
    }

    fn response_text(body: &GenerateContentResponse) -> Option<String> {
        let parts = body
            .candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?;
        let text: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text.concat())
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn complete(&self, payload: &PromptPayload) -> Result<String, AnalysisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| TransportError::Request(format!("invalid API key header: {e}")))?,
        );

        tracing::info!(
            model = %self.model,
            prompt_len = payload.text.len(),
            has_image = payload.image.is_some(),
            "sending Gemini generateContent request"
        );

        let res = self
            .http
            .post(self.url())
            .headers(headers)
            .json(&Self::request_body(payload))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::warn!(%status, model = %self.model, "Gemini request rejected");
            let code = status.as_u16();
            let err = if code == 401 || code == 403 || text.contains("API_KEY_INVALID") {
                TransportError::Auth {
                    status: code,
                    body: text,
                }
            } else {
                TransportError::Http {
                    status: code,
                    body: text,
                }
            };
            return Err(err.into());
        }

        let body = serde_json::from_str::<GenerateContentResponse>(&text).map_err(|e| {
            AnalysisError::MalformedResponse {
                detail: format!("failed to decode Gemini response envelope: {e}"),
                raw_output: text.clone(),
            }
        })?;

        Self::response_text(&body).ok_or_else(|| {
            let finish_reason = body
                .candidates
                .as_ref()
                .and_then(|c| c.first())
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "none".to_string());
            let block_reason = body
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "none".to_string());
            AnalysisError::MalformedResponse {
                detail: format!(
                    "model returned no text (finish_reason={finish_reason}, block_reason={block_reason})"
                ),
                raw_output: text.clone(),
            }
        })
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    candidate_count: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
