//! OpenAI-compatible chat-completions client used as a [`Generator`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use groundrag_core::traits::{GenerationRequest, Generator};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "You are a vehicle maintenance assistant. You answer strictly from the evidence \
you are given and cite it. You never invent specifications, part numbers or section references.";

/// The `generator` (and optional `secondary_generator`) config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key; local servers
    /// usually need none.
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.0,
            max_tokens: Some(512),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: OpenAiSettings,
    auth_header: Option<String>,
    label: String,
}

impl OpenAiGenerator {
    /// Reads the API key from `api_key_env`; an unset variable means requests
    /// go out without an `Authorization` header.
    pub fn new(settings: OpenAiSettings) -> Self {
        let api_key = settings.api_key_env.as_deref().and_then(|var| match std::env::var(var) {
            Ok(key) => Some(key),
            Err(_) => {
                warn!(var, "API key variable not set; sending unauthenticated requests");
                None
            }
        });
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(mut settings: OpenAiSettings, api_key: Option<String>) -> Self {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        let label = format!("openai:{}", settings.model);
        Self { client: reqwest::Client::new(), auth_header: api_key.map(|k| format!("Bearer {k}")), settings, label }
    }

    fn chat_completions_url(&self) -> String { format!("{}/v1/chat/completions", self.settings.base_url) }

    fn build_request(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": self.settings.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn parse_response(json: serde_json::Value) -> anyhow::Result<String> {
    let response: ChatResponse =
        serde_json::from_value(json).map_err(|e| anyhow::anyhow!("failed to parse chat response: {e}"))?;
    let choice = response.choices.into_iter().next().ok_or_else(|| anyhow::anyhow!("no choices in chat response"))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str { &self.label }

    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        let mut http = self.client.post(self.chat_completions_url()).timeout(request.timeout).json(&self.build_request(request));
        if let Some(auth) = &self.auth_header {
            http = http.header(reqwest::header::AUTHORIZATION, auth);
        }
        let response = http.send().await?.error_for_status()?;
        let json: serde_json::Value = response.json().await?;
        let text = parse_response(json)?;
        debug!(generator = %self.label, chars = text.len(), "chat completion received");
        Ok(text)
    }
}
