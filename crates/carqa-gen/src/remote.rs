//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//! Transport failures and timeouts surface as `Error::Unavailable`;
//! retry/backoff is the caller's concern, not this core's.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::traits::Generator;
use carqa_core::types::ChatMessage;

pub struct RemoteGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl RemoteGenerator {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self { client, endpoint, model, api_key, temperature: 0.1 })
    }
}

impl Generator for RemoteGenerator {
    fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage { role: "system", content: system });
        wire.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));
        let body = ChatRequest { model: &self.model, messages: wire, temperature: self.temperature };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| Error::Unavailable(format!("generation request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Unavailable(format!("generation service error: {e}")))?;
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| Error::Unavailable(format!("malformed generation response: {e}")))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Unavailable("generation response had no choices".to_string()))?;
        tracing::debug!(model = %self.model, chars = answer.len(), "generated answer");
        Ok(answer)
    }
}
