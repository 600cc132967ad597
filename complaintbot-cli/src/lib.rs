//! # complaintbot-cli
//!
//! Command-line front end for the complaint index: build it from the CFPB
//! CSV, inspect it, ask questions and chat.
//!
//! Configuration is layered: the YAML file (`--config`, or
//! `complaintbot.yaml` in the working directory if present) is overridden
//! by `COMPLAINTBOT_*` environment variables, which are overridden by flags.
//! A `.env` file is loaded before arguments are parsed.

pub mod chat;
pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use complaintbot_rag::{
    EmbeddingProvider, FileVectorStore, Generator, HashEmbeddingProvider, MockGenerator,
    OpenAIEmbeddingProvider, OpenAIGenerator, RagConfig, RagPipeline,
};
use complaintbot_telemetry::{LogFormat, TelemetryConfig};
use tracing::{debug, info};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "complaintbot.yaml";

/// Answer returned by the offline generator; the retrieved sources are the
/// useful part of an offline answer.
pub const OFFLINE_ANSWER: &str =
    "Offline mode: no generative model is configured. The most relevant complaint excerpts are listed below.";

#[derive(Debug, Parser)]
#[command(name = "complaintbot")]
#[command(version)]
#[command(
    about = "Answer questions about customer complaints from their own narratives",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// YAML configuration file [default: ./complaintbot.yaml if present]
    #[arg(long, env = "COMPLAINTBOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted vector index
    #[arg(long, env = "COMPLAINTBOT_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Collection to index into and query
    #[arg(long, env = "COMPLAINTBOT_COLLECTION", global = true)]
    pub collection: Option<String>,

    /// Use the local hashing embedder and a canned generator (no network)
    #[arg(long, env = "COMPLAINTBOT_OFFLINE", global = true)]
    pub offline: bool,

    /// Log output format (pretty, json)
    #[arg(long, env = "COMPLAINTBOT_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// Logging setup implied by `-v` and `--log-format`. `RUST_LOG` still wins.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        TelemetryConfig {
            level: level.to_string(),
            format: self.log_format,
            ..TelemetryConfig::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load, clean, chunk and index the complaints CSV
    Index {
        /// CSV file to index [default: data_path from the config]
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Drop the collection before indexing
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the chunks nearest to a query, without generating an answer
    Query {
        /// Query text
        text: String,

        /// Number of chunks to retrieve [default: top_k from the config]
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a single question
    Ask {
        /// The question
        question: String,

        /// Number of chunks to retrieve [default: top_k from the config]
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a fixed question set and print a Markdown evaluation table
    Eval {
        /// File with one question per line [default: built-in questions]
        #[arg(short, long)]
        questions: Option<PathBuf>,

        /// Write the table to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the collection's metric, dimensions and size
    Status,

    /// Interactive question answering
    Chat {
        /// Number of chunks to retrieve [default: top_k from the config]
        #[arg(short, long)]
        k: Option<usize>,
    },
}

/// Load the YAML layer and apply flag and environment overrides.
///
/// # Errors
///
/// Fails if an explicitly named config file cannot be read or parsed, or if
/// the merged configuration is invalid.
pub fn load_config(args: &GlobalArgs) -> anyhow::Result<RagConfig> {
    let mut config = match &args.config {
        Some(path) => RagConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            debug!(path = DEFAULT_CONFIG_FILE, "using config from working directory");
            RagConfig::from_yaml_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_FILE}"))?
        }
        None => RagConfig::default(),
    };

    if let Some(db_path) = &args.db_path {
        config.db_path = db_path.clone();
    }
    if let Some(collection) = &args.collection {
        config.collection_name = collection.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Wire the adapters named by `config` into a pipeline over the on-disk store.
///
/// Offline, the hashing embedder (with the configured dimensions) and a
/// canned generator replace the OpenAI-compatible clients, so indexing and
/// retrieval work without credentials.
///
/// # Errors
///
/// Fails if the store directory cannot be opened or, online, if an API key
/// is missing.
pub async fn build_pipeline(config: RagConfig, offline: bool) -> anyhow::Result<RagPipeline> {
    let store = FileVectorStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open vector store at {}", config.db_path.display()))?;

    let (embedder, generator): (Arc<dyn EmbeddingProvider>, Arc<dyn Generator>) = if offline {
        (
            Arc::new(HashEmbeddingProvider::new(config.embedding.dimensions)?),
            Arc::new(MockGenerator::fixed(OFFLINE_ANSWER)),
        )
    } else {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        (
            Arc::new(
                OpenAIEmbeddingProvider::from_settings(&config.embedding, timeout).context(
                    "failed to set up the embedding client (use --offline to run without one)",
                )?,
            ),
            Arc::new(
                OpenAIGenerator::from_settings(&config.generation, timeout).context(
                    "failed to set up the generation client (use --offline to run without one)",
                )?,
            ),
        )
    };

    info!(
        db_path = %config.db_path.display(),
        collection = %config.collection_name,
        embedder = embedder.name(),
        generator = generator.name(),
        "pipeline ready"
    );

    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(Arc::new(store))
        .generator(generator)
        .build()?)
}

/// Run a parsed command line, writing command output to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.global)?;
    let pipeline = build_pipeline(config, cli.global.offline).await?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Index { data, rebuild } => {
            let data = data.unwrap_or_else(|| pipeline.config().data_path.clone());
            commands::index(&pipeline, &data, rebuild, &mut out).await?;
        }
        Command::Query { text, k } => {
            commands::query(&pipeline, &text, k, &mut out).await?;
        }
        Command::Ask { question, k } => {
            commands::ask(&pipeline, &question, k, &mut out).await?;
        }
        Command::Eval { questions, output } => {
            let questions = match questions {
                Some(path) => commands::read_questions(&path)?,
                None => complaintbot_rag::DEFAULT_EVALUATION_QUESTIONS
                    .iter()
                    .map(|q| q.to_string())
                    .collect(),
            };
            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    commands::eval(&pipeline, &questions, &mut file).await?;
                    eprintln!("Evaluation table written to {}", path.display());
                }
                None => commands::eval(&pipeline, &questions, &mut out).await?,
            }
        }
        Command::Status => {
            commands::status(&pipeline, &mut out).await?;
        }
        Command::Chat { k } => {
            drop(out);
            chat::run_chat(&pipeline, k).await?;
        }
    }

    Ok(())
}
