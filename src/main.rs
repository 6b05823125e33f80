//! ragpilot CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ragpilot::agent::AgentController;
use ragpilot::cli::{Args, Commands};
use ragpilot::config::Config;
use ragpilot::embedding::OllamaEmbedder;
use ragpilot::generation::{AnswerGenerator, ContextConfig};
use ragpilot::grading::grader_from_config;
use ragpilot::index::{MemoryIndex, QdrantIndex, VectorIndex};
use ragpilot::indexer::Indexer;
use ragpilot::ingest::{chunker, loader};
use ragpilot::llm::OllamaClient;
use ragpilot::retrieval::{Retriever, SearchParams};
use ragpilot::rewrite::LlmRewriter;
use ragpilot::session::{SessionStore, SessionStoreConfig};
use ragpilot::types::Answer;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path).context("Failed to load configuration")?;

    // CLI flags override the config file.
    if let Some(model) = &args.model {
        config.ollama.chat_model = model.clone();
    }
    if let Some(host) = &args.host {
        config.ollama.host = host.clone();
    }
    if let Some(port) = args.port {
        config.ollama.port = port;
    }
    config.validate().context("Invalid configuration")?;

    match &args.command {
        Commands::Index { paths } => cmd_index(&config, paths).await,
        Commands::Ask { question, session } => {
            cmd_ask(&config, question, session.as_deref()).await
        }
        Commands::Chat { session } => cmd_chat(&config, session.as_deref()).await,
        Commands::Sessions => cmd_sessions(&config),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn build_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        _ => {
            let index = QdrantIndex::connect(
                &config.index.qdrant_url,
                &config.index.collection,
                config.index.dimension,
            )
            .await
            .context("Failed to connect to Qdrant")?;
            Ok(Arc::new(index))
        }
    }
}

fn session_store(config: &Config) -> Result<SessionStore> {
    Ok(SessionStore::new(SessionStoreConfig {
        storage_dir: PathBuf::from(&config.paths.session_dir),
    })?)
}

async fn build_controller(config: &Config, session: Option<&str>) -> Result<AgentController> {
    let embedder = Arc::new(OllamaEmbedder::new(
        &config.ollama_url(),
        &config.ollama.embedding_model,
    )?);
    let index = build_index(config).await?;

    let llm = Arc::new(OllamaClient::with_config(
        &config.ollama_url(),
        &config.ollama.chat_model,
    )?);
    if !llm.health_check().await? {
        anyhow::bail!("Ollama is not reachable at {}", config.ollama_url());
    }

    let retriever = Arc::new(Retriever::with_params(
        embedder,
        index,
        SearchParams {
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
            strict_empty_index: config.retrieval.strict_empty_index,
        },
    ));
    let grader = grader_from_config(
        &config.agent.grader,
        config.agent.grader_threshold,
        llm.clone(),
    )?;
    let rewriter = Arc::new(LlmRewriter::new(llm.clone()));
    let generator = AnswerGenerator::with_config(llm, ContextConfig::default());

    let store = session_store(config)?;
    let history = match session {
        Some(id) => Some((id, store.load(id)?)),
        None => None,
    };

    let mut controller =
        AgentController::new(retriever, grader, rewriter, generator, config.agent.clone())
            .with_session_store(store);
    if let Some((id, turns)) = history {
        controller = controller.with_history(id, turns);
    }

    Ok(controller)
}

async fn cmd_index(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let embedder = Arc::new(OllamaEmbedder::new(
        &config.ollama_url(),
        &config.ollama.embedding_model,
    )?);
    let index = build_index(config).await?;
    let indexer = Indexer::new(embedder, index);

    let mut total = 0;
    for path in paths {
        let docs = loader::loader_for(path)
            .load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        for doc in &docs {
            let chunks: Vec<_> =
                chunker::split(doc, config.chunking.chunk_size, config.chunking.overlap)?
                    .collect();
            let count = indexer.upsert(&chunks).await?;
            total += count;
            println!("{} {} ({} chunks)", "indexed".green(), doc.source, count);
        }
    }

    println!("{} {} chunks total", "done:".bold(), total);
    Ok(())
}

async fn cmd_ask(config: &Config, question: &str, session: Option<&str>) -> Result<()> {
    let mut controller = build_controller(config, session).await?;
    let answer = controller.run_turn(question).await?;
    print_answer(&answer);
    Ok(())
}

async fn cmd_chat(config: &Config, session: Option<&str>) -> Result<()> {
    let mut controller = build_controller(config, session).await?;
    println!(
        "{} session {} (type 'exit' to quit)",
        "ragpilot".bold(),
        controller.memory().session_id()
    );

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                editor.add_history_entry(line)?;

                match controller.run_turn(line).await {
                    Ok(answer) => print_answer(&answer),
                    Err(e) => eprintln!("{} {} ({})", "error:".red(), e, e.code()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn cmd_sessions(config: &Config) -> Result<()> {
    let store = session_store(config)?;
    for id in store.list_sessions()? {
        println!("{}", id);
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    if answer.degraded {
        println!("{}", "(low confidence)".yellow());
    }
    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        for (i, citation) in answer.citations.iter().enumerate() {
            println!(
                "{}",
                format!("  [{}] {} @ {}", i + 1, citation.source, citation.offset).dimmed()
            );
        }
    }
}
