//! Ollama-backed LLM judgments and embeddings.
//!
//! Both calls go through `/api/generate` with `format: "json"` and
//! temperature 0 so the model is forced into deterministic structured output.
//! Responses are parsed strictly; anything that does not decode is an error
//! and the caller applies its own fallback.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ContentAnalysis, Embedder, LlmClient, ServiceError};
use crate::config::OllamaConfig;

const MATCH_TIMEOUT: Duration = Duration::from_secs(8);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    /// The model's output, itself a JSON document.
    response: String,
}

#[derive(Deserialize)]
struct MatchVerdict {
    #[serde(rename = "match")]
    is_match: bool,
}

fn default_neutral() -> f32 {
    30.0
}

#[derive(Deserialize)]
struct AnalysisPayload {
    #[serde(default = "default_neutral")]
    entity_score: f32,
    #[serde(default = "default_neutral")]
    criticality_score: f32,
    #[serde(default)]
    is_opinion: bool,
}

/// Truncate on a char boundary; prompts cap the candidate texts so a long
/// article cannot blow the model context.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct OllamaClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(cfg: &OllamaConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
        }
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ServiceError> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: 0.0,
                num_ctx: 2048,
            },
        };
        let resp = self
            .http
            .post(&self.api_url)
            .timeout(timeout)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = resp.json().await?;
        Ok(body.response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn same_event(&self, reference: &str, candidate: &str) -> Result<bool, ServiceError> {
        let prompt = format!(
            "Act as a strict news editor. Compare these two news texts.\n\
             Do they report the EXACT SAME specific event/incident?\n\n\
             Ref News: \"{}\"\n\
             New News: \"{}\"\n\n\
             Answer ONLY JSON: {{\"match\": true}} or {{\"match\": false}}",
            truncate(reference, 600),
            truncate(candidate, 600),
        );
        let raw = self.generate(&prompt, MATCH_TIMEOUT).await?;
        let verdict: MatchVerdict =
            serde_json::from_str(&raw).map_err(|e| ServiceError::BadResponse {
                service: "ollama-match",
                detail: e.to_string(),
            })?;
        Ok(verdict.is_match)
    }

    async fn analyze(&self, text: &str) -> Result<ContentAnalysis, ServiceError> {
        let prompt = format!(
            "Analyze this Turkish news for Trend Potential Score (TPS).\n\
             Text: \"{}\"\n\n\
             Task:\n\
             1. Entity Impact (E): Is this about National leaders, Regional figures, or Unknowns? (Range: 20-100)\n\
             2. Semantic Criticality (S): Is this High (Major/Dangerous), Medium, or Low? (Range: 20-100)\n\
             3. Opinion Check: Is this a personal commentary/blog post or objective news?\n\n\
             Return JSON ONLY:\n\
             {{\"entity_score\": 20-100, \"criticality_score\": 20-100, \"is_opinion\": true/false}}",
            truncate(text, 800),
        );
        let raw = self.generate(&prompt, ANALYZE_TIMEOUT).await?;
        let payload: AnalysisPayload =
            serde_json::from_str(&raw).map_err(|e| ServiceError::BadResponse {
                service: "ollama-analysis",
                detail: e.to_string(),
            })?;
        Ok(ContentAnalysis {
            entity_score: payload.entity_score,
            criticality_score: payload.criticality_score,
            is_opinion: payload.is_opinion,
        })
    }
}

pub struct OllamaEmbedder {
    http: reqwest::Client,
    embed_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(cfg: &OllamaConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(8))
            .build()
            .expect("reqwest client");
        Self {
            http,
            embed_url: cfg.embed_url.clone(),
            model: cfg.embed_model.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let req = EmbedRequest {
            model: &self.model,
            prompt: text,
        };
        let resp = self
            .http
            .post(&self.embed_url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: EmbedResponse = resp.json().await?;
        if body.embedding.is_empty() {
            return Err(ServiceError::BadResponse {
                service: "ollama-embeddings",
                detail: "empty embedding vector".into(),
            });
        }
        Ok(body.embedding)
    }
}
