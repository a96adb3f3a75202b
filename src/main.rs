use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docsiq::completion::HttpCompletionClient;
use docsiq::config::Config;
use docsiq::embedding::HttpEmbedder;
use docsiq::pipeline::RagPipeline;
use docsiq::retrieval::QdrantRetriever;

#[derive(Parser)]
#[command(name = "docsiq", version, about = "Ask questions over the indexed document corpus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and print the answer with its sources
    Ask {
        question: String,
        /// Session id for conversational continuity; generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// Report reachability of the vector store and cache backends
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsiq=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let embedder = Arc::new(HttpEmbedder::new(
        &config.embedding,
        config.embedding_api_key(),
    )?);
    let retriever = Arc::new(QdrantRetriever::new(
        &config.qdrant,
        config.retrieval.min_score,
    )?);
    let model = Arc::new(HttpCompletionClient::new(
        &config.completion,
        config.completion_api_key(),
    )?);
    let pipeline = RagPipeline::new(embedder, retriever, model, &config);

    match cli.command {
        Commands::Ask { question, session } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            match pipeline.answer_query(&question, &session, "cli").await {
                Ok(result) => {
                    println!("{}\n", result.answer);
                    if !result.sources.is_empty() {
                        println!("Sources:");
                        for url in &result.sources {
                            println!("  - {}", url);
                        }
                    }
                    println!("\nSession: {}", result.session_id);
                }
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Health => {
            let status = pipeline.health().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
