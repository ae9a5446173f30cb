//! kbchat CLI: the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `ask`     — Run one agent turn and print the streamed steps
//! - `config`  — Print the default configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "kbchat",
    about = "kbchat — knowledge-base chatbot with a tool-calling agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the default search paths
    #[arg(short, long, global = true, env = "KBCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// The question to send to the agent
        question: String,
    },

    /// Print the default configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(cli.config, port).await?,
        Commands::Ask { question } => commands::ask::run(cli.config, question).await?,
        Commands::Config => commands::config_cmd::print_default(),
    }

    Ok(())
}
