use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pdf_rag::commands::{ask, index_document, serve, show_status};
use pdf_rag::config::{ChatProviderKind, Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Chat with a PDF using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure providers, chunking and storage
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a PDF or text file, replacing the previously indexed document
    Index {
        /// Path of the document to index
        file: PathBuf,
        /// Embedding model to use instead of the configured one
        #[arg(long)]
        embedding_model: Option<String>,
    },
    /// Ask a question about the indexed document
    Ask {
        /// The question
        message: String,
        /// Chat provider (ollama or openai)
        #[arg(long)]
        provider: Option<ChatProviderKind>,
        /// Chat model to use instead of the configured one
        #[arg(long)]
        model: Option<String>,
        /// Embedding model for the question; defaults to the one the document was indexed with
        #[arg(long)]
        embedding_model: Option<String>,
    },
    /// Start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show provider reachability and the indexed document
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index {
            file,
            embedding_model,
        } => {
            index_document(&Config::load_default()?, &file, embedding_model.as_deref()).await?;
        }
        Commands::Ask {
            message,
            provider,
            model,
            embedding_model,
        } => {
            ask(
                &Config::load_default()?,
                &message,
                provider,
                model.as_deref(),
                embedding_model.as_deref(),
            )
            .await?;
        }
        Commands::Serve { host, port } => {
            serve(&Config::load_default()?, host, port).await?;
        }
        Commands::Status => {
            show_status(&Config::load_default()?).await?;
        }
    }

    Ok(())
}
