use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embeddings::api_error;
use crate::errors::{QaError, QaResult};

pub struct LLMConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// A chat-completion model that turns one prompt into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> QaResult<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for the OpenAI `/chat/completions` endpoint, bound to one key.
pub struct ChatOpenAi {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    config: LLMConfig,
}

impl ChatOpenAi {
    pub fn new(api_base: &str, api_key: &str, config: LLMConfig) -> QaResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(ChatOpenAi {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            config,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn parse_response(response: ChatResponse) -> QaResult<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| QaError::InvalidResponse("No completion returned".to_string()))
    }
}

#[async_trait]
impl ChatModel for ChatOpenAi {
    async fn complete(&self, prompt: &str) -> QaResult<String> {
        if prompt.trim().is_empty() {
            return Err(QaError::InvalidResponse("Prompt cannot be empty".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| QaError::InvalidResponse(e.to_string()))?;
        Self::parse_response(body)
    }
}
