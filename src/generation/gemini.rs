//! Google Gemini (`POST {base}/{version}/models/{model}:generateContent`).
//!
//! Gemini has no separate system role in the basic API, so the system
//! prompt is folded into the single user turn. Both the model name and the
//! API version drift between releases; every `(model, version)` pair is a
//! candidate, models in order, versions within each model.

use anyhow::Result;

use super::{http_client, model_candidates, try_candidates, GenerationError, Generator};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-flash-latest", "gemini-2.0-flash"];
const DEFAULT_API_VERSIONS: &[&str] = &["v1beta", "v1"];

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub model: String,
    pub version: String,
}

pub struct Gemini {
    base_url: String,
    api_key: String,
    endpoints: Vec<Endpoint>,
    temperature: f64,
    client: reqwest::blocking::Client,
}

impl Gemini {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim()
            .trim_end_matches('/')
            .to_string();

        let versions: Vec<String> = if config.api_versions.is_empty() {
            DEFAULT_API_VERSIONS.iter().map(|v| v.to_string()).collect()
        } else {
            config.api_versions.clone()
        };

        let endpoints = model_candidates(config, DEFAULT_MODELS)
            .into_iter()
            .flat_map(|model| {
                versions.iter().map(move |version| Endpoint {
                    model: model.clone(),
                    version: version.clone(),
                })
            })
            .collect();

        Ok(Self {
            base_url,
            api_key,
            endpoints,
            temperature: config.temperature,
            client: http_client(config)?,
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn call(&self, endpoint: &Endpoint, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, endpoint.version, endpoint.model
        );
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(GenerationError::from_status(
                &format!("{}@{}", endpoint.model, endpoint.version),
                status.as_u16(),
                body_text,
            ));
        }

        let json: serde_json::Value = response.json()?;
        parse_generate_response(&json)
    }
}

impl Generator for Gemini {
    fn name(&self) -> &str {
        "gemini"
    }

    fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let prompt = format!("{}\n\nUser: {}", system, user);
        try_candidates(&self.endpoints, GenerationError::is_not_found, |endpoint| {
            self.call(endpoint, &prompt)
        })
    }
}

/// Extract `candidates[0].content.parts[0].text`.
fn parse_generate_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let candidates = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GenerationError::InvalidResponse("Gemini returned no candidates".to_string()))?;
    let parts = candidates[0]
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            GenerationError::InvalidResponse("Gemini returned empty content parts".to_string())
        })?;
    Ok(parts[0]
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .trim()
        .to_string())
}
