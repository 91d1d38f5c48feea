//! Command-line surface for yarrow.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use yarrow_core::{CastContext, PipelineConfig, QueryPipeline, QueryResponse};
use yarrow_db::MemoryPassageStore;
use yarrow_model::{create_embedding_client, create_generation_client, create_relevance_client};

/// Ask questions about the I Ching corpus with cited answers.
#[derive(Debug, Parser)]
#[command(name = "yarrow", version, about)]
pub struct Cli {
    /// Path to the pipeline config file (default: ~/.yarrow/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (e.g. `info`, `yarrow_core=debug`).
    #[arg(long, global = true, env = "YARROW_LOG", default_value = "warn")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask a question and print the cited answer.
    Ask {
        /// The question.
        question: String,

        /// Path to the passage store (JSONL).
        #[arg(long, env = "YARROW_STORE")]
        store: PathBuf,

        /// Display name of a pre-cast hexagram, if any.
        #[arg(long)]
        cast_name: Option<String>,

        /// Summary line for the pre-cast hexagram.
        #[arg(long, requires = "cast_name")]
        cast_summary: Option<String>,

        /// Print the full response as JSON instead of formatted output.
        #[arg(long)]
        json: bool,
    },

    /// Show recent entries from the query log.
    Log {
        /// Number of entries to show.
        #[arg(long, default_value_t = 10)]
        last: usize,
    },
}

/// Run the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_or_default()?,
    };

    match cli.command {
        Command::Ask {
            question,
            store,
            cast_name,
            cast_summary,
            json,
        } => run_ask(config, question, store, cast_name, cast_summary, json),
        Command::Log { last } => run_log(config, last),
    }
}

fn run_ask(
    config: PipelineConfig,
    question: String,
    store_path: PathBuf,
    cast_name: Option<String>,
    cast_summary: Option<String>,
    json: bool,
) -> Result<()> {
    let store = MemoryPassageStore::load(&store_path)
        .with_context(|| format!("loading passage store from {}", store_path.display()))?;

    // Model clients are wired unconditionally; the pipeline degrades on
    // its own when a service is unreachable.
    let embedder: Option<Arc<dyn yarrow_model::EmbeddingClient>> =
        create_embedding_client(&config.models).ok().map(Arc::from);
    let relevance: Option<Arc<dyn yarrow_model::RelevanceClient>> =
        create_relevance_client(&config.models).ok().map(Arc::from);
    let generator: Arc<dyn yarrow_model::GenerationClient> =
        Arc::from(create_generation_client(&config.models)?);

    let pipeline = QueryPipeline::new(Arc::new(store), embedder, relevance, generator, config);

    let cast_context = cast_name.map(|name| CastContext {
        name,
        summary: cast_summary.unwrap_or_default(),
        ..CastContext::default()
    });

    let response = pipeline.process(&question, cast_context)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_response(&response);
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!();
    println!("{}", response.answer);
    println!();

    let confidence_pct = response.confidence * 100.0;
    let line = format!(
        "type: {}   confidence: {:.0}%   time: {:.0} ms",
        response.query_type,
        confidence_pct,
        response.stage_timings_ms.get("total").copied().unwrap_or(0.0)
    );
    if response.success {
        println!("{}", line.dimmed());
    } else {
        println!("{}", line.red());
    }

    if !response.sources.is_empty() {
        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["#", "passage", "hexagram", "type", "score", "preview"]);
        for source in &response.sources {
            table.add_row(vec![
                source.rank.to_string(),
                source.passage_id.clone(),
                source.entry_code.clone().unwrap_or_default(),
                source.content_type.clone(),
                format!("{:.2}", source.relevance_score),
                source.text_preview.clone(),
            ]);
        }
        println!("{table}");
    }
}

fn run_log(config: PipelineConfig, last: usize) -> Result<()> {
    let Some(path) = &config.query_log_path else {
        println!("No query log configured (set queryLogPath in the config).");
        return Ok(());
    };

    let entries = yarrow_core::read_query_log(path)?;
    if entries.is_empty() {
        println!("Query log is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["when", "type", "strategy", "conf", "ms", "ok", "question"]);
    for entry in entries.iter().rev().take(last) {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.query_type.clone(),
            entry.strategy.clone().unwrap_or_default(),
            format!("{:.2}", entry.confidence),
            format!("{:.0}", entry.duration_ms),
            if entry.success { "yes" } else { "no" }.to_string(),
            entry.query.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}
