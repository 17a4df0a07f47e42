//! Google Generative Language (`generateContent`) client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::NarrativeProvider;
use crate::config::{GEMINI_API_URL, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};

const TEMPERATURE: f64 = 0.0;
const MAX_OUTPUT_TOKENS: u32 = 2048;
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_key,
            model,
            base_url: GEMINI_API_URL.to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidatePart {
    text: Option<String>,
}

fn build_request<'a>(user_prompt: &'a str, system_instruction: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part { text: user_prompt }],
        }],
        system_instruction: (!system_instruction.is_empty()).then(|| Content {
            parts: vec![Part {
                text: system_instruction,
            }],
        }),
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
    }
}

/// Text of the first part of the first candidate, if non-empty.
fn first_text(resp: GenerateResponse) -> Option<String> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
}

#[async_trait::async_trait]
impl NarrativeProvider for GeminiClient {
    async fn generate(&self, user_prompt: &str, system_instruction: &str) -> Result<Option<String>> {
        debug!(model = %self.model, "[GEMINI] generateContent");

        let resp = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&build_request(user_prompt, system_instruction))
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Narrative(format!("{status}: {body}")));
        }

        let body = resp
            .json::<GenerateResponse>()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;
        let text = first_text(body);
        if text.is_none() {
            warn!(model = %self.model, "[GEMINI] no text content in response");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_wire_format() {
        let v = serde_json::to_value(build_request("data", "be terse")).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "data");
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(v["generationConfig"]["temperature"], 0.0);
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn empty_system_instruction_is_omitted() {
        let v = serde_json::to_value(build_request("data", "")).unwrap();
        assert!(v.get("systemInstruction").is_none());
    }

    #[test]
    fn extracts_first_candidate_text() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Tactical report"},{"text":"ignored"}],"role":"model"},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(resp).as_deref(), Some("Tactical report"));
    }

    #[test]
    fn missing_text_is_none() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        ] {
            let resp: GenerateResponse = serde_json::from_str(body).unwrap();
            assert_eq!(first_text(resp), None, "{body}");
        }
    }

    #[test]
    fn endpoint_includes_model() {
        let c = GeminiClient::new("k".into(), "gemini-2.5-flash".into()).unwrap();
        assert_eq!(
            c.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn transport_error_does_not_expose_api_key() {
        let mut c = GeminiClient::new("SECRET-KEY-123".into(), "gemini-2.5-flash".into()).unwrap();
        c.base_url = "http://127.0.0.1:9".into();
        let err = c.generate("data", "").await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET-KEY-123"));
    }
}
