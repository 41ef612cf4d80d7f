use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{QaError, QaResult};

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> QaResult<Vec<f64>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Converts a non-success HTTP response into `QaError::Api`, preferring the
/// provider's own error message when the body carries one.
pub(crate) async fn api_error(response: reqwest::Response) -> QaError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);
    QaError::Api { status, message }
}

/// Embedding client for the OpenAI `/embeddings` endpoint, bound to one key.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> QaResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn parse_response(response: EmbeddingResponse) -> QaResult<Vec<f64>> {
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| QaError::InvalidResponse("No embedding returned".to_string()))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> QaResult<Vec<f64>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| QaError::InvalidResponse(e.to_string()))?;
        Self::parse_response(body)
    }
}
