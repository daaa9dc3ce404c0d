//! Unified OpenAI-compatible text generator.
//!
//! One struct handles chat completions for every OpenAI-compatible API.
//! Providers are distinguished only by endpoint URL, auth style and API key.

use async_trait::async_trait;
use serde_json::{Value, json};
use shiftdesk_core::config::{GeneratorEndpoint, SuggestConfig};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::TextGenerator;

use super::registry::{AuthStyle, GeneratorProfile};

const SYSTEM_PROMPT: &str = "You are a workforce scheduling assistant. \
Answer with a single JSON object and nothing else.";

/// Env vars consulted after the provider's own keys.
const SHARED_KEY_ENV: &[&str] = &["SHIFTDESK_API_KEY", "OPENAI_API_KEY"];

pub struct OpenAiCompatibleGenerator {
    name: String,
    api_key: String,
    base_url: String,
    chat_path: String,
    models_path: String,
    auth_style: AuthStyle,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleGenerator {
    /// Create from a registry profile and one configured endpoint.
    ///
    /// Resolution order:
    /// - API key: `endpoint.api_key` > profile env vars > `SHIFTDESK_API_KEY` > `OPENAI_API_KEY`
    /// - Base URL: `endpoint.endpoint` > profile env override > profile default
    pub fn from_profile(
        profile: &GeneratorProfile,
        endpoint: &GeneratorEndpoint,
        config: &SuggestConfig,
    ) -> Self {
        let api_key = if !endpoint.api_key.is_empty() {
            endpoint.api_key.clone()
        } else {
            profile
                .env_keys
                .iter()
                .chain(SHARED_KEY_ENV)
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let base_url = if !endpoint.endpoint.is_empty() {
            endpoint.endpoint.trim_end_matches('/').to_string()
        } else {
            profile
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST / LLAMACPP_HOST usually omit the /v1 suffix
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| profile.base_url.to_string())
        };

        Self {
            name: profile.name.to_string(),
            api_key,
            base_url,
            chat_path: profile.chat_path.to_string(),
            models_path: profile.models_path.to_string(),
            auth_style: profile.auth_style,
            model: endpoint.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        }
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &GeneratorEndpoint, config: &SuggestConfig) -> Self {
        let base_url = endpoint
            .provider
            .strip_prefix("custom:")
            .filter(|url| !url.is_empty())
            .unwrap_or(endpoint.endpoint.as_str())
            .trim_end_matches('/')
            .to_string();

        let api_key = if !endpoint.api_key.is_empty() {
            endpoint.api_key.clone()
        } else {
            SHARED_KEY_ENV
                .iter()
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            models_path: "/models".to_string(),
            auth_style,
            model: endpoint.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(ShiftdeskError::external(format!(
                "{}: API key missing",
                self.name
            )));
        }

        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt));
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            ShiftdeskError::external(format!("{} connection failed ({url}): {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ShiftdeskError::external(format!(
                "{} API error {status}: {text}",
                self.name
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ShiftdeskError::external(format!("{}: {e}", self.name)))?;

        json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(String::from)
            .ok_or_else(|| ShiftdeskError::external(format!("{}: no content in response", self.name)))
    }

    async fn health_check(&self) -> Result<bool> {
        if self.auth_style != AuthStyle::None {
            // Cloud providers: a key is all we can check offline
            return Ok(!self.api_key.is_empty());
        }
        let url = format!("{}{}", self.base_url, self.models_path);
        Ok(self.client.get(&url).send().await.is_ok())
    }
}
