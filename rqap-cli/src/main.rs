//! rqap - Command-line client for Rserve-compatible R servers.
//!
//! Provides both an interactive session and one-shot evaluation.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use rqap_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rqap")]
#[command(about = "Command-line client for Rserve-compatible R compute servers")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6311", env = "RQAP_SERVER")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Render results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Repl,

    /// Evaluate an R expression and print the result
    Eval {
        /// The expression to evaluate
        expr: String,
    },

    /// Evaluate an R expression, discarding the result
    Void {
        /// The expression to evaluate
        expr: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConnectionConfig::new(cli.server)
        .with_request_timeout(Duration::from_secs(cli.timeout));
    let mut client = Client::new(config);

    match cli.command {
        None | Some(Commands::Repl) => repl::run(&mut client, cli.server, cli.json).await,
        Some(cmd) => {
            client.connect().await?;
            let result = commands::execute(&mut client, cmd, cli.json).await;
            let _ = client.close().await;
            println!("{}", result?);
            Ok(())
        }
    }
}
