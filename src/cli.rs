use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{
    chunker::{DEFAULT_OVERLAP, DEFAULT_TARGET_CHARS},
    indexer::DEFAULT_BATCH_SIZE,
    query::DEFAULT_TOP_K,
};

/// Default character budget for the plain paragraph chunker.
pub const DEFAULT_PARA_MAX_CHARS: usize = 4000;
/// Default overlap for the plain paragraph chunker.
pub const DEFAULT_PARA_OVERLAP: usize = 400;

#[derive(Debug, Parser)]
#[command(
    name = "ragmill",
    about = "PDF-to-Markdown conversion, chunking, vector indexing, and \
             RAG chat over document manuals"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a PDF (or a directory of PDFs) to Markdown
    Convert(ConvertArgs),
    /// Split a PDF into fixed-size page-range parts
    Split(SplitArgs),
    /// Concatenate converted Markdown parts into one document
    Concat(ConcatArgs),
    /// Chunk converted documents into a JSONL chunk file
    Chunk {
        #[command(subcommand)]
        action: ChunkAction,
    },
    /// Clean a chunk file in place
    Tidy(TidyArgs),
    /// Embed a chunk file and build the vector index
    Index(IndexArgs),
    /// Ask a question against the index
    Query(QueryArgs),
    /// Multi-turn chat grounded in the index
    Chat(ChatArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Convert --

#[derive(Debug, Parser)]
pub struct ConvertArgs {
    /// PDF file or directory of PDFs
    pub input: PathBuf,

    /// Output Markdown file (single input) or directory (directory
    /// input); defaults next to the input
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Run an OCR pre-pass on pages without a text layer
    #[arg(long)]
    pub ocr: bool,

    /// OCR every page, replacing any existing text layer
    #[arg(long, requires = "ocr")]
    pub force_full_page_ocr: bool,

    /// Tesseract language code(s) for OCR, e.g. "eng" or "eng+deu"
    #[arg(long, requires = "ocr")]
    pub ocr_lang: Option<String>,
}

// -- Split --

#[derive(Debug, Parser)]
pub struct SplitArgs {
    /// The PDF to split
    pub input: PathBuf,

    /// Pages per part
    #[arg(long, default_value = "100")]
    pub pages: usize,

    /// Output directory (defaults to the input's directory)
    #[arg(long)]
    pub outdir: Option<PathBuf>,
}

// -- Concat --

#[derive(Debug, Parser)]
pub struct ConcatArgs {
    /// Directory holding the Markdown parts
    pub dir: PathBuf,

    /// Output file (defaults to <dir>/combined.md)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

// -- Chunk --

#[derive(Debug, Subcommand)]
pub enum ChunkAction {
    /// Heading-aware chunking of one Markdown document
    Md {
        /// The Markdown file to chunk
        #[arg(long)]
        input: PathBuf,

        /// Document name recorded in chunk metadata (defaults to the
        /// input's file stem)
        #[arg(long)]
        doc_name: Option<String>,

        /// Character target per chunk
        #[arg(long, default_value_t = DEFAULT_TARGET_CHARS)]
        target_chars: usize,

        /// Character overlap between adjacent chunks
        #[arg(long, default_value_t = DEFAULT_OVERLAP)]
        overlap: usize,

        /// Output chunk file
        #[arg(long, default_value = "chunks.jsonl")]
        out: PathBuf,
    },
    /// Paragraph chunking of a directory of Markdown/HTML files
    Dir {
        /// Directory of *.md / *.html files
        #[arg(long)]
        src: PathBuf,

        /// Output chunk file
        #[arg(long, default_value = "chunks.jsonl")]
        out: PathBuf,

        /// Directory figure image paths are resolved against
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Character budget per chunk
        #[arg(long, default_value_t = DEFAULT_PARA_MAX_CHARS)]
        max_chars: usize,

        /// Character overlap between adjacent chunks
        #[arg(long, default_value_t = DEFAULT_PARA_OVERLAP)]
        overlap: usize,
    },
}

// -- Tidy --

#[derive(Debug, Parser)]
pub struct TidyArgs {
    /// The chunk file to clean in place
    #[arg(long, default_value = "chunks.jsonl")]
    pub chunks: PathBuf,

    /// Skip the timestamped backup of the original
    #[arg(long)]
    pub no_backup: bool,
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// The chunk file to index
    #[arg(long, default_value = "chunks.jsonl")]
    pub chunks: PathBuf,

    /// Index directory (overrides RAGMILL_PERSIST and the data dir)
    #[arg(long)]
    pub persist: Option<PathBuf>,

    /// Embedding model (overrides RAGMILL_EMBED_MODEL)
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Records embedded per Ollama call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Ollama server URL (overrides RAGMILL_OLLAMA_URL)
    #[arg(long)]
    pub ollama_url: Option<String>,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The question to answer
    #[arg(long, required_unless_present = "interactive")]
    pub query: Option<String>,

    /// Read questions from stdin in a loop instead
    #[arg(long)]
    pub interactive: bool,

    /// Index directory (overrides RAGMILL_PERSIST and the data dir)
    #[arg(long)]
    pub persist: Option<PathBuf>,

    /// Number of passages to retrieve
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Embedding model (overrides RAGMILL_EMBED_MODEL)
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Answering model (overrides RAGMILL_CHAT_MODEL)
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Override the grounding system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Ollama server URL (overrides RAGMILL_OLLAMA_URL)
    #[arg(long)]
    pub ollama_url: Option<String>,

    #[command(flatten)]
    pub sampling: SamplingArgs,
}

// -- Chat --

#[derive(Debug, Parser)]
pub struct ChatArgs {
    /// Plain chat without retrieval grounding
    #[arg(long)]
    pub no_rag: bool,

    /// Index directory (overrides RAGMILL_PERSIST and the data dir)
    #[arg(long)]
    pub persist: Option<PathBuf>,

    /// Chat model (overrides RAGMILL_CHAT_MODEL)
    #[arg(long)]
    pub chat_model: Option<String>,

    /// Embedding model (overrides RAGMILL_EMBED_MODEL)
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Passages retrieved per turn
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Override the grounding system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Ollama server URL (overrides RAGMILL_OLLAMA_URL)
    #[arg(long)]
    pub ollama_url: Option<String>,

    #[command(flatten)]
    pub sampling: SamplingArgs,
}

// -- Sampling --

#[derive(Debug, Parser)]
pub struct SamplingArgs {
    /// Maximum tokens to generate
    #[arg(long)]
    pub max_new_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff
    #[arg(long)]
    pub top_k_sampling: Option<u32>,
}

impl SamplingArgs {
    pub fn to_options(&self) -> crate::ollama::SamplingOptions {
        crate::ollama::SamplingOptions {
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k_sampling,
        }
    }
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "ragmill",
            &mut std::io::stdout(),
        );
    }
}

/// Resolve a setting: explicit flag first, then an environment
/// variable, then the built-in default.
pub fn resolve_setting(
    flag: Option<&str>,
    env_var: &str,
    default: &str,
) -> String {
    if let Some(value) = flag {
        return value.to_string();
    }
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_chunk_md_defaults() {
        let cli = Cli::parse_from([
            "ragmill", "chunk", "md", "--input", "manual.md",
        ]);
        match cli.command {
            Command::Chunk {
                action:
                    ChunkAction::Md {
                        input,
                        doc_name,
                        target_chars,
                        overlap,
                        out,
                    },
            } => {
                assert_eq!(input, PathBuf::from("manual.md"));
                assert_eq!(doc_name, None);
                assert_eq!(target_chars, DEFAULT_TARGET_CHARS);
                assert_eq!(overlap, DEFAULT_OVERLAP);
                assert_eq!(out, PathBuf::from("chunks.jsonl"));
            }
            _ => panic!("expected chunk md command"),
        }
    }

    #[test]
    fn query_requires_question_or_interactive() {
        assert!(Cli::try_parse_from(["ragmill", "query"]).is_err());
        assert!(
            Cli::try_parse_from(["ragmill", "query", "--interactive"])
                .is_ok()
        );
        assert!(Cli::try_parse_from([
            "ragmill", "query", "--query", "how do I run TDDFT?"
        ])
        .is_ok());
    }

    #[test]
    fn ocr_flags_require_ocr() {
        assert!(Cli::try_parse_from([
            "ragmill",
            "convert",
            "a.pdf",
            "--force-full-page-ocr"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "ragmill",
            "convert",
            "a.pdf",
            "--ocr",
            "--force-full-page-ocr"
        ])
        .is_ok());
    }

    #[test]
    fn resolve_setting_priority() {
        assert_eq!(
            resolve_setting(Some("flag"), "RAGMILL_TEST_UNSET", "dflt"),
            "flag"
        );
        assert_eq!(
            resolve_setting(None, "RAGMILL_TEST_UNSET", "dflt"),
            "dflt"
        );
    }
}
