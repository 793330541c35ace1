//! Ollama client for embeddings, one-shot completion, and chat.
//!
//! All inference is delegated to a running Ollama server; this crate
//! never loads models in-process.

use ollama_rs::{
    Ollama,
    generation::{
        chat::{ChatMessage, request::ChatMessageRequest},
        completion::request::GenerationRequest,
        embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    },
    models::ModelOptions,
};

use crate::error::Result;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";

/// Sampling knobs forwarded to the model. `None` leaves the server
/// default in place.
#[derive(Debug, Clone, Default)]
pub struct SamplingOptions {
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl SamplingOptions {
    fn to_model_options(&self) -> ModelOptions {
        let mut opts = ModelOptions::default();
        if let Some(n) = self.max_new_tokens {
            opts = opts.num_predict(n as i32);
        }
        if let Some(t) = self.temperature {
            opts = opts.temperature(t);
        }
        if let Some(p) = self.top_p {
            opts = opts.top_p(p);
        }
        if let Some(k) = self.top_k {
            opts = opts.top_k(k);
        }
        opts
    }
}

/// Thin wrapper around [`Ollama`] with this pipeline's three calls.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
}

impl OllamaClient {
    /// Connect to an Ollama server; `None` means localhost:11434.
    pub fn from_url(url: Option<&str>) -> Result<Self> {
        let inner = Ollama::try_new(url.unwrap_or(DEFAULT_BASE_URL))?;
        Ok(Self { inner })
    }

    /// Embed a single string.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let req = GenerateEmbeddingsRequest::new(
            model.to_string(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self.inner.generate_embeddings(req).await?;
        Ok(res.embeddings.into_iter().next().unwrap_or_default())
    }

    /// Embed multiple strings in one call, one vector per input.
    pub async fn embed_batch(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            model.to_string(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self.inner.generate_embeddings(req).await?;
        Ok(res.embeddings)
    }

    /// One-shot completion with an optional system instruction.
    pub async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        sampling: &SamplingOptions,
    ) -> Result<String> {
        let mut req = GenerationRequest::new(
            model.to_string(),
            prompt.to_string(),
        )
        .options(sampling.to_model_options());
        if let Some(system) = system {
            req = req.system(system.to_string());
        }
        let res = self.inner.generate(req).await?;
        Ok(res.response)
    }

    /// Multi-turn chat over a full message history.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        sampling: &SamplingOptions,
    ) -> Result<String> {
        let req = ChatMessageRequest::new(model.to_string(), messages)
            .options(sampling.to_model_options());
        let res = self.inner.send_chat_messages(req).await?;
        Ok(res.message.content)
    }
}
