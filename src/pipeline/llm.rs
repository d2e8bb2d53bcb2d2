use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::models::enums::MessageRole;
use crate::models::Message;

use super::ChatError;

/// Token accounting reported by the upstream model, when available.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One completed model reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Seam between the chat pipeline and the model endpoint. Production uses
/// the HTTP client below; tests substitute a scripted mock.
pub trait ChatCompletion {
    fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        image_url: Option<&str>,
    ) -> Result<ChatReply, ChatError>;
}

/// Blocking HTTP client for an OpenAI-compatible chat completion endpoint.
pub struct LlmClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

/// Plain text for ordinary turns, a parts array when an image rides along.
#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum WirePart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: WireImageRef },
}

#[derive(Serialize)]
struct WireImageRef {
    url: String,
}

#[derive(Deserialize)]
struct WireResponse {
    model: Option<String>,
    choices: Vec<WireChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ChatError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn role_name(role: MessageRole) -> &'static str {
        match role {
            MessageRole::User => "user",
            MessageRole::Ai => "assistant",
        }
    }

    fn build_messages(
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        image_url: Option<&str>,
    ) -> Vec<WireMessage> {
        let mut messages = vec![WireMessage {
            role: "system",
            content: WireContent::Text(system_prompt.to_string()),
        }];

        for msg in history {
            messages.push(WireMessage {
                role: Self::role_name(msg.role),
                content: WireContent::Text(msg.content.clone()),
            });
        }

        let content = match image_url {
            Some(url) => WireContent::Parts(vec![
                WirePart::Text {
                    text: user_message.to_string(),
                },
                WirePart::ImageUrl {
                    image_url: WireImageRef {
                        url: url.to_string(),
                    },
                },
            ]),
            None => WireContent::Text(user_message.to_string()),
        };
        messages.push(WireMessage {
            role: "user",
            content,
        });

        messages
    }
}

impl ChatCompletion for LlmClient {
    fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        image_url: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        if user_message.trim().is_empty() {
            return Err(ChatError::MissingInput);
        }

        let request = WireRequest {
            model: &self.model,
            messages: Self::build_messages(system_prompt, history, user_message, image_url),
        };

        debug!(
            model = %self.model,
            history_len = history.len(),
            has_image = image_url.is_some(),
            "dispatching chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ChatError::Connection(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ChatError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireResponse = response
            .json()
            .map_err(|e| ChatError::ResponseParsing(e.to_string()))?;
        let text = wire
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::ResponseParsing("response had no choices".into()))?;

        Ok(ChatReply {
            text,
            model: wire.model.unwrap_or_else(|| self.model.clone()),
            usage: wire.usage.unwrap_or_default(),
        })
    }
}
