//! OpenAI-compatible chat completions (`POST {base}/v1/chat/completions`).
//!
//! Also used for Mistral, whose API accepts the same request and response
//! shapes.

use anyhow::Result;

use super::{http_client, model_candidates, try_candidates, GenerationError, Generator};
use crate::config::ProviderConfig;

pub struct OpenAiChat {
    name: String,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    temperature: f64,
    client: reqwest::blocking::Client,
}

impl OpenAiChat {
    pub fn new(
        name: &str,
        config: &ProviderConfig,
        default_base_url: &str,
        default_models: &[&str],
        api_key: String,
    ) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(default_base_url)
            .trim()
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            name: name.to_string(),
            base_url,
            api_key,
            models: model_candidates(config, default_models),
            temperature: config.temperature,
            client: http_client(config)?,
        })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    fn call(&self, model: &str, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(GenerationError::from_status(model, status.as_u16(), body_text));
        }

        let json: serde_json::Value = response.json()?;
        parse_chat_response(&json)
    }
}

impl Generator for OpenAiChat {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        try_candidates(&self.models, GenerationError::is_not_found, |model| {
            self.call(model, system, user)
        })
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            GenerationError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}
