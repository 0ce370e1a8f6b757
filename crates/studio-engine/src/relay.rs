use serde_json::Value;
use studio_contracts::chat::{ChatReply, ChatRole, Conversation};
use studio_contracts::errors::RelayError;

use crate::config::EngineConfig;
use crate::error_chain_text;
use crate::providers::{truncate_text, ChatProvider, ChatRequest, ChatTurn, GeminiChatProvider};

/// Forwards a client conversation to the chat model and returns its reply text.
pub struct ChatRelay {
    provider: Box<dyn ChatProvider>,
    model: String,
}

impl ChatRelay {
    pub fn new<P: ChatProvider + 'static>(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider: Box::new(provider),
            model: model.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            GeminiChatProvider::new(&config.gemini)?,
            config.gemini.text_model.clone(),
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn relay(&self, conversation: &Conversation) -> Result<ChatReply, RelayError> {
        if !self.provider.is_configured() {
            return Err(RelayError::Configuration(
                "GEMINI_API_KEY is not configured on the server.".to_string(),
            ));
        }
        if conversation.is_empty() {
            return Err(RelayError::bad_input("No messages provided"));
        }

        let request = self.build_request(conversation);
        tracing::info!(
            provider = self.provider.name(),
            model = %self.model,
            turns = request.turns.len(),
            "relaying chat"
        );

        let reply = self.provider.generate(&request).map_err(|err| {
            tracing::error!(
                provider = self.provider.name(),
                error = %error_chain_text(&err, 1024),
                "chat request failed"
            );
            RelayError::Upstream("Failed to generate content".to_string())
        })?;

        if !reply.is_success() {
            tracing::error!(
                provider = self.provider.name(),
                status = reply.status_code,
                body = %truncate_text(&reply.body, 1024),
                "chat provider returned an error"
            );
            return Err(RelayError::Upstream(format!(
                "Gemini API error: {}",
                reply.status_code
            )));
        }

        let text = reply_text(&reply.payload);
        if text.is_empty() {
            return Err(RelayError::Upstream(
                "No reply returned from Gemini.".to_string(),
            ));
        }
        Ok(ChatReply { reply: text })
    }

    pub fn build_request(&self, conversation: &Conversation) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            turns: conversation
                .messages
                .iter()
                .map(|message| ChatTurn {
                    role: provider_role(message.role),
                    text: message.content.clone(),
                })
                .collect(),
        }
    }
}

pub fn provider_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

/// Text parts of the first candidate, joined in order and trimmed.
pub fn reply_text(payload: &Value) -> String {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>()
        .trim()
        .to_string()
}
