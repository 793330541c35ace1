use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ragmill::{
    chat::{ChatConfig, ChatSession},
    cli::{self, ChunkAction, Cli, Command},
    concat, convert,
    convert::ConvertOptions,
    data_dir::DataDir,
    error::Result,
    indexer, ingest,
    ollama::{DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL, OllamaClient},
    query::{self, DEFAULT_SYSTEM_PROMPT},
    split, tidy,
    vector_db::VectorDb,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RAGMILL_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Convert(args) => cmd_convert(&args)?,
        Command::Split(args) => {
            let outdir = match &args.outdir {
                Some(dir) => dir.clone(),
                None => args
                    .input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };
            let parts = split::split_pdf(&args.input, args.pages, &outdir)?;
            println!("Wrote {} part(s) to {}", parts.len(), outdir.display());
        }
        Command::Concat(args) => {
            let out = args
                .out
                .clone()
                .unwrap_or_else(|| args.dir.join("combined.md"));
            let n = concat::concat_markdown(&args.dir, &out)?;
            println!("Joined {n} part(s) into {}", out.display());
        }
        Command::Chunk { action } => match action {
            ChunkAction::Md {
                input,
                doc_name,
                target_chars,
                overlap,
                out,
            } => {
                let doc = doc_name.unwrap_or_else(|| {
                    input
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "document".to_string())
                });
                let n = ingest::chunk_markdown_file(
                    &input,
                    &doc,
                    target_chars,
                    overlap,
                    &out,
                )?;
                println!("Wrote {n} chunk(s) to {}", out.display());
            }
            ChunkAction::Dir {
                src,
                out,
                assets,
                max_chars,
                overlap,
            } => {
                let n = ingest::chunk_directory(
                    &src,
                    &out,
                    assets.as_deref(),
                    max_chars,
                    overlap,
                )?;
                println!("Wrote {n} record(s) to {}", out.display());
            }
        },
        Command::Tidy(args) => {
            let stats = tidy::process_chunks(&args.chunks, !args.no_backup)?;
            println!(
                "Cleaned {}: {} record(s), {} changed, {} malformed \
                 line(s) dropped",
                args.chunks.display(),
                stats.total,
                stats.changed,
                stats.skipped
            );
        }
        Command::Index(args) => {
            let runtime = build_runtime()?;
            runtime.block_on(cmd_index(cli.data_dir.as_deref(), &args))?;
        }
        Command::Query(args) => {
            let runtime = build_runtime()?;
            runtime.block_on(cmd_query(cli.data_dir.as_deref(), &args))?;
        }
        Command::Chat(args) => {
            let runtime = build_runtime()?;
            runtime.block_on(cmd_chat(cli.data_dir.as_deref(), &args))?;
        }
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn cmd_convert(args: &cli::ConvertArgs) -> Result<()> {
    let opts = ConvertOptions {
        ocr: args.ocr,
        force_full_page_ocr: args.force_full_page_ocr,
        ocr_lang: args.ocr_lang.clone(),
    };

    if args.input.is_dir() {
        let out_dir = args.out.clone().unwrap_or_else(|| args.input.clone());
        let stats = convert::convert_dir(&args.input, &out_dir, &opts)?;
        println!("Converted {}/{} PDF(s)", stats.converted, stats.total);
    } else {
        let out = match &args.out {
            Some(out) => out.clone(),
            None => {
                let parent = args
                    .input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                convert::markdown_path_for(&args.input, &parent)
            }
        };
        convert::convert_file(&args.input, &out, &opts)?;
        println!("Converted {} -> {}", args.input.display(), out.display());
    }
    Ok(())
}

/// The index database path: --persist flag, then RAGMILL_PERSIST, then
/// the resolved data directory.
fn resolve_index_path(
    persist: Option<&Path>,
    data_dir_flag: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(dir) = persist {
        std::fs::create_dir_all(dir)?;
        return Ok(dir.join("index.redb"));
    }
    if let Ok(val) = std::env::var("RAGMILL_PERSIST")
        && !val.is_empty()
    {
        let dir = PathBuf::from(val);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir.join("index.redb"));
    }
    Ok(DataDir::resolve(data_dir_flag)?.index_db())
}

fn resolve_url(flag: Option<&str>) -> Option<String> {
    flag.map(str::to_string).or_else(|| {
        std::env::var("RAGMILL_OLLAMA_URL")
            .ok()
            .filter(|s| !s.is_empty())
    })
}

async fn cmd_index(
    data_dir_flag: Option<&Path>,
    args: &cli::IndexArgs,
) -> Result<()> {
    let embed_model = cli::resolve_setting(
        args.embed_model.as_deref(),
        "RAGMILL_EMBED_MODEL",
        DEFAULT_EMBED_MODEL,
    );
    let client =
        OllamaClient::from_url(resolve_url(args.ollama_url.as_deref()).as_deref())?;
    let db_path = resolve_index_path(args.persist.as_deref(), data_dir_flag)?;
    let db = VectorDb::open(&db_path)?;

    let n = indexer::index_chunks(
        &client,
        &db,
        &args.chunks,
        &embed_model,
        args.batch_size,
    )
    .await?;
    println!(
        "Indexed {n} record(s) with {embed_model} into {}",
        db_path.display()
    );
    Ok(())
}

async fn cmd_query(
    data_dir_flag: Option<&Path>,
    args: &cli::QueryArgs,
) -> Result<()> {
    let embed_model = cli::resolve_setting(
        args.embed_model.as_deref(),
        "RAGMILL_EMBED_MODEL",
        DEFAULT_EMBED_MODEL,
    );
    let llm_model = cli::resolve_setting(
        args.llm_model.as_deref(),
        "RAGMILL_CHAT_MODEL",
        DEFAULT_CHAT_MODEL,
    );
    let system_prompt = args
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let sampling = args.sampling.to_options();

    let client =
        OllamaClient::from_url(resolve_url(args.ollama_url.as_deref()).as_deref())?;
    let db_path = resolve_index_path(args.persist.as_deref(), data_dir_flag)?;
    let db = VectorDb::open(&db_path)?;
    if db.is_empty()? {
        tracing::warn!(
            index = %db_path.display(),
            "index is empty; run `ragmill index` first"
        );
    }

    if let Some(question) = &args.query {
        run_query_once(
            &client,
            &db,
            question,
            &embed_model,
            &llm_model,
            args.top_k,
            &system_prompt,
            &sampling,
        )
        .await?;
    }

    if args.interactive {
        let stdin = std::io::stdin();
        loop {
            print!("query> ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question == "exit" || question == "quit" {
                break;
            }
            run_query_once(
                &client,
                &db,
                question,
                &embed_model,
                &llm_model,
                args.top_k,
                &system_prompt,
                &sampling,
            )
            .await?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_query_once(
    client: &OllamaClient,
    db: &VectorDb,
    question: &str,
    embed_model: &str,
    llm_model: &str,
    top_k: usize,
    system_prompt: &str,
    sampling: &ragmill::ollama::SamplingOptions,
) -> Result<()> {
    let outcome = query::answer_query(
        client,
        db,
        question,
        embed_model,
        llm_model,
        top_k,
        system_prompt,
        sampling,
    )
    .await?;
    println!("{}\n", outcome.answer.trim());
    println!("Sources:\n{}", query::render_passages(&outcome.hits));
    Ok(())
}

async fn cmd_chat(
    data_dir_flag: Option<&Path>,
    args: &cli::ChatArgs,
) -> Result<()> {
    let chat_model = cli::resolve_setting(
        args.chat_model.as_deref(),
        "RAGMILL_CHAT_MODEL",
        DEFAULT_CHAT_MODEL,
    );
    let embed_model = cli::resolve_setting(
        args.embed_model.as_deref(),
        "RAGMILL_EMBED_MODEL",
        DEFAULT_EMBED_MODEL,
    );
    let system_prompt = args
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let client =
        OllamaClient::from_url(resolve_url(args.ollama_url.as_deref()).as_deref())?;

    let db = if args.no_rag {
        None
    } else {
        let db_path =
            resolve_index_path(args.persist.as_deref(), data_dir_flag)?;
        let db = VectorDb::open(&db_path)?;
        if db.is_empty()? {
            tracing::warn!(
                index = %db_path.display(),
                "index is empty; answers will not be grounded"
            );
        }
        Some(db)
    };

    let mut session = ChatSession::new(
        &client,
        db.as_ref(),
        ChatConfig {
            chat_model: chat_model.clone(),
            embed_model,
            top_k: args.top_k,
            system_prompt,
            sampling: args.sampling.to_options(),
        },
    );

    println!("Chatting with {chat_model}; type 'exit' to leave.");
    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        let reply = session.turn(input).await?;
        println!("{}\n", reply.trim());
    }
    Ok(())
}
