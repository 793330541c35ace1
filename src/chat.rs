//! Multi-turn chat with optional per-turn retrieval grounding.
//!
//! Each turn re-retrieves against the latest user message and rebuilds
//! the system message from the hits, so the grounding context follows
//! the conversation instead of being frozen at the first question.

use ollama_rs::generation::chat::ChatMessage;

use crate::{
    error::Result,
    ollama::{OllamaClient, SamplingOptions},
    query::{retrieve, snippet},
    vector_db::{Hit, VectorDb},
};

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub chat_model: String,
    pub embed_model: String,
    pub top_k: usize,
    pub system_prompt: String,
    pub sampling: SamplingOptions,
}

/// System message for a grounded turn: base instruction plus the
/// retrieved passages.
pub fn rag_system_prompt(base: &str, hits: &[Hit]) -> String {
    if hits.is_empty() {
        return base.to_string();
    }
    let mut out = String::from(base);
    out.push_str("\n\nManual passages relevant to the last question:\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] {}\n{}\n",
            i + 1,
            hit.record.title(),
            snippet(&hit.record.text)
        ));
    }
    out
}

/// One conversation: message history plus the retrieval collaborators.
pub struct ChatSession<'a> {
    client: &'a OllamaClient,
    index: Option<&'a VectorDb>,
    config: ChatConfig,
    history: Vec<ChatMessage>,
}

impl<'a> ChatSession<'a> {
    /// `index = None` disables retrieval; the chat is then a plain LLM
    /// conversation under the base system prompt.
    pub fn new(
        client: &'a OllamaClient,
        index: Option<&'a VectorDb>,
        config: ChatConfig,
    ) -> Self {
        Self {
            client,
            index,
            config,
            history: Vec::new(),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Run one turn: retrieve (when grounded), send the full history,
    /// record both sides in it, and return the assistant reply.
    pub async fn turn(&mut self, user_input: &str) -> Result<String> {
        let system = match self.index {
            Some(db) => {
                let hits = retrieve(
                    self.client,
                    db,
                    user_input,
                    &self.config.embed_model,
                    self.config.top_k,
                )
                .await?;
                rag_system_prompt(&self.config.system_prompt, &hits)
            }
            None => self.config.system_prompt.clone(),
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(user_input.to_string()));

        let reply = self
            .client
            .chat(&self.config.chat_model, messages, &self.config.sampling)
            .await?;

        self.history.push(ChatMessage::user(user_input.to_string()));
        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChunkMeta, ChunkRecord};

    fn hit(text: &str) -> Hit {
        Hit {
            id: 0,
            score: 0.7,
            record: ChunkRecord {
                id: "m_00000".into(),
                text: text.to_string(),
                meta: ChunkMeta {
                    doc: "manual".into(),
                    section_path: Some(vec!["SCF".into()]),
                    ..Default::default()
                },
            },
        }
    }

    #[test]
    fn grounded_system_prompt_includes_passages() {
        let prompt =
            rag_system_prompt("Base instruction.", &[hit("convergence")]);
        assert!(prompt.starts_with("Base instruction."));
        assert!(prompt.contains("[1] SCF"));
        assert!(prompt.contains("convergence"));
    }

    #[test]
    fn no_hits_leaves_base_prompt_unchanged() {
        assert_eq!(rag_system_prompt("Base.", &[]), "Base.");
    }

    #[test]
    fn new_session_has_empty_history() {
        let client = OllamaClient::from_url(None).unwrap();
        let session = ChatSession::new(
            &client,
            None,
            ChatConfig {
                chat_model: "llama3.2".into(),
                embed_model: "nomic-embed-text".into(),
                top_k: 4,
                system_prompt: "Base.".into(),
                sampling: SamplingOptions::default(),
            },
        );
        assert_eq!(session.history_len(), 0);
    }
}
