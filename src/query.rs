//! One-shot retrieval-augmented question answering.
//!
//! A query is embedded, the top-k chunks are pulled from the index by
//! cosine similarity, and a grounded prompt is assembled from capped
//! passage snippets for the LLM to answer from.

use crate::{
    error::Result,
    ollama::{OllamaClient, SamplingOptions},
    vector_db::{Hit, VectorDb},
};

/// Passage text is capped at this many characters inside the prompt.
pub const SNIPPET_CHARS: usize = 600;

pub const DEFAULT_TOP_K: usize = 4;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant answering \
questions about the ORCA quantum chemistry package. Answer using only \
the provided manual passages. If the passages do not contain the \
answer, say so instead of guessing.";

/// Answer plus the passages it was grounded on.
#[derive(Debug)]
pub struct QueryOutcome {
    pub answer: String,
    pub hits: Vec<Hit>,
}

/// The first `SNIPPET_CHARS` characters of a passage, with a marker
/// when truncated.
pub fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let mut s: String = text.chars().take(SNIPPET_CHARS).collect();
    s.push('…');
    s
}

/// Assemble the user prompt: numbered passages, then the question.
pub fn build_prompt(question: &str, hits: &[Hit]) -> String {
    let mut prompt = String::from("Passages:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {}\n{}\n\n",
            i + 1,
            hit.record.title(),
            snippet(&hit.record.text)
        ));
    }
    prompt.push_str(&format!("Question: {question}\nAnswer:"));
    prompt
}

/// Human-readable source listing printed under the answer.
pub fn render_passages(hits: &[Hit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} (score {:.3})\n{}\n\n",
            i + 1,
            hit.record.title(),
            hit.score,
            snippet(&hit.record.text)
        ));
    }
    out.trim_end().to_string()
}

/// Retrieve the top-k chunks for `question` from the index.
///
/// Warns when the index was built with a different embedding model
/// than the one used here.
pub async fn retrieve(
    client: &OllamaClient,
    db: &VectorDb,
    question: &str,
    embed_model: &str,
    top_k: usize,
) -> Result<Vec<Hit>> {
    if let Some(indexed_model) = db.embed_model()?
        && indexed_model != embed_model
    {
        tracing::warn!(
            indexed = indexed_model,
            querying = embed_model,
            "index was built with a different embedding model; \
             similarities may be meaningless"
        );
    }
    let query_vec = client.embed(embed_model, question).await?;
    db.top_k(&query_vec, top_k)
}

/// Full query pipeline: retrieve, build the grounded prompt, generate.
#[allow(clippy::too_many_arguments)]
pub async fn answer_query(
    client: &OllamaClient,
    db: &VectorDb,
    question: &str,
    embed_model: &str,
    llm_model: &str,
    top_k: usize,
    system_prompt: &str,
    sampling: &SamplingOptions,
) -> Result<QueryOutcome> {
    let hits = retrieve(client, db, question, embed_model, top_k).await?;
    let prompt = build_prompt(question, &hits);
    let answer = client
        .complete(llm_model, Some(system_prompt), &prompt, sampling)
        .await?;
    Ok(QueryOutcome { answer, hits })
}
