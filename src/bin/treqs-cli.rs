use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Method;
use tracing_subscriber::EnvFilter;
use treqs::TraceClient;

#[derive(Parser)]
#[command(name = "treqs-cli")]
#[command(about = "Capture a runtime trace of a single HTTP request", long_about = None)]
struct Cli {
    /// Request URL.
    #[arg(short, long)]
    url: String,

    /// Tracer key.
    #[arg(short, long, default_value = "treqs")]
    key: String,

    /// HTTP request method.
    #[arg(short, long, default_value = "GET")]
    method: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a request and download its capture
    Capture {
        /// Write the capture here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a stored capture
    Read {
        /// Session id returned by a traced request
        #[arg(long)]
        id: String,

        /// Write the capture here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Discard every stored capture
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "treqs_cli=info,treqs=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let client = TraceClient::new(cli.url, cli.key).with_method(method);

    match cli.command {
        Commands::Capture { output } => {
            let (traced, trace) = client.capture().await?;
            tracing::info!(
                session = %traced.id,
                status = %traced.status,
                bytes = trace.len(),
                "Trace captured"
            );
            write_trace(&trace, output)?;
        }
        Commands::Read { id, output } => {
            let trace = client.read(&id).await?;
            write_trace(&trace, output)?;
        }
        Commands::Reset => {
            client.reset().await?;
            tracing::info!("Trace sessions reset");
        }
    }

    Ok(())
}

fn write_trace(trace: &[u8], output: Option<PathBuf>) -> std::io::Result<()> {
    match output {
        Some(path) => fs::write(path, trace),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(trace)?;
            stdout.flush()
        }
    }
}
