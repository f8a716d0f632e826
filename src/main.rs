//! codegen-stream - Stream LLM code generations into files and actions.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use codegen_stream::ai::{AiClient, AiError};
use codegen_stream::config::{AppConfig, ConfigError, ConfigLoader};
use codegen_stream::dispatch::{
    register_remote_capabilities, CapabilityRegistry, DryRunWriter, FileWriter, FsWriter,
    RegistryError,
};
use codegen_stream::display::{self, ConsoleSink};
use codegen_stream::generation::{GenerationError, Generator};
use codegen_stream::parser::StreamProcessor;
use codegen_stream::server::{GenerationServer, ServerError};

#[derive(Parser)]
#[command(
    name = "codegen-stream",
    about = "Stream LLM code generations into files and actions",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate code for a prompt.
    Generate {
        /// What to generate.
        prompt: String,
        /// Project directory to write into (overrides config).
        #[arg(short, long)]
        project_dir: Option<PathBuf>,
        /// Print streaming message and plan text as it arrives.
        #[arg(long)]
        show_deltas: bool,
        /// Do not truncate long values in output.
        #[arg(long)]
        raw: bool,
    },
    /// Feed a saved model response through the parser.
    Replay {
        /// File containing raw model output.
        file: PathBuf,
        /// Characters per simulated chunk.
        #[arg(long, default_value_t = 16)]
        chunk_size: usize,
        /// Project directory to write into (overrides config).
        #[arg(short, long)]
        project_dir: Option<PathBuf>,
        /// Resolve paths but write nothing.
        #[arg(long)]
        dry_run: bool,
        /// Print streaming message and plan text as it arrives.
        #[arg(long)]
        show_deltas: bool,
    },
    /// Serve the generation HTTP API.
    Serve {
        /// Host address to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => ConfigLoader::with_path(path).load(),
        None => ConfigLoader::new().load(),
    }
}

fn build_registry(config: &AppConfig) -> Result<Arc<CapabilityRegistry>, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    register_remote_capabilities(&mut registry, &config.actions)?;
    Ok(Arc::new(registry))
}

fn build_writer(config: &AppConfig, project_dir: Option<PathBuf>) -> Arc<dyn FileWriter> {
    let writer = match project_dir {
        Some(dir) => FsWriter::new(dir, config.output.source_root.clone()),
        None => FsWriter::from_config(&config.output),
    };
    Arc::new(writer)
}

/// Split `text` into chunks of at most `size` characters.
fn char_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (index, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&text[start..index]);
            start = index;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Cancel `cancel` on Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            cancel.cancel();
        }
    });
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Generate {
            prompt,
            project_dir,
            show_deltas,
            raw,
        } => {
            let client = AiClient::from_config(config.ai.clone())?;
            display::print_generation_start(client.model(), &prompt, raw);

            let generator = Generator::new(
                Arc::new(client),
                build_writer(&config, project_dir),
                build_registry(&config)?,
                config.parser.clone(),
            );
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let mut processor = generator.processor(ConsoleSink::new(raw, show_deltas));
            let result = generator.generate(&prompt, &mut processor, &cancel).await?;
            display::print_result(&result);
        }
        Commands::Replay {
            file,
            chunk_size,
            project_dir,
            dry_run,
            show_deltas,
        } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| CliError::Read {
                    path: file.clone(),
                    source,
                })?;
            let writer: Arc<dyn FileWriter> = if dry_run {
                Arc::new(DryRunWriter::new(config.output.source_root.clone()))
            } else {
                build_writer(&config, project_dir)
            };

            let mut processor = StreamProcessor::new(
                &config.parser,
                writer,
                build_registry(&config)?,
                ConsoleSink::new(false, show_deltas),
            );
            let chunks = char_chunks(&text, chunk_size);
            tracing::info!(file = %file.display(), chunks = chunks.len(), "Replaying response");
            for chunk in chunks {
                processor.process_chunk(chunk).await;
            }
            let result = processor.finalize().await;
            display::print_result(&result);
        }
        Commands::Serve { host, port } => {
            let mut server_config = config.server.clone();
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            let generator = Generator::new(
                Arc::new(AiClient::from_config(config.ai.clone())?),
                Arc::new(FsWriter::from_config(&config.output)),
                build_registry(&config)?,
                config.parser.clone(),
            );
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            GenerationServer::new(Arc::new(generator), server_config)
                .with_cancellation(cancel)
                .run()
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
