use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grafthost::config::{ArchiveMode, HostConfig};
use grafthost::error::HostError;
use grafthost::host::Host;
use grafthost::plugins::{scan, PluginRegistry, SourceKind};

#[derive(Parser)]
#[command(name = "grafthost")]
#[command(about = "Extensible plugin host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, load, and start all units, then run until interrupted
    Run {
        /// Plugins directory (overrides config)
        #[arg(short, long)]
        plugins_dir: Option<PathBuf>,
        /// Mount archives in place instead of extracting them
        #[arg(long)]
        mount: bool,
        /// Shut down immediately after the activation pass
        #[arg(long)]
        once: bool,
    },
    /// List discovered plugin candidates
    List {
        /// Plugins directory (overrides config)
        #[arg(short, long)]
        plugins_dir: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) | None => {
            println!("grafthost {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::List { plugins_dir }) => cmd_list(plugins_dir),
        Some(Commands::Run {
            plugins_dir,
            mount,
            once,
        }) => cmd_run(plugins_dir, mount, once).await,
    }
}

fn cmd_list(plugins_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = resolve_plugins_dir(plugins_dir)?;
    let candidates = scan(&dir).with_context(|| format!("scanning {}", dir.display()))?;
    for candidate in candidates {
        let kind = match candidate.kind {
            SourceKind::LooseFile => "loose",
            SourceKind::Archive => "archive",
        };
        println!("{:8} {}", kind, candidate.path.display());
    }
    Ok(())
}

async fn cmd_run(plugins_dir: Option<PathBuf>, mount: bool, once: bool) -> anyhow::Result<()> {
    let config = HostConfig::load().with_context(|| "Failed to load configuration")?;
    let dir = match plugins_dir {
        Some(dir) => dir,
        None => config.plugins_path(),
    };
    let archive_mode = if mount {
        ArchiveMode::Mount
    } else {
        config.archive_mode
    };
    let staging = config.staging_dir.as_ref().map(PathBuf::from);

    let candidates = match scan(&dir) {
        Ok(candidates) => candidates,
        Err(e @ HostError::Discovery(_)) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let host = Arc::new(Host::new());
    let mut registry = PluginRegistry::with_options(host, archive_mode, staging)?;
    let summary = registry.activate_all(candidates);
    tracing::info!(
        started = summary.started,
        failed = summary.failed,
        "Host ready"
    );

    if !once {
        tokio::signal::ctrl_c()
            .await
            .with_context(|| "Failed to wait for shutdown signal")?;
        tracing::info!("Shutdown signal received");
    }

    registry.shutdown();

    // Partial plugin sets are not fatal, but they are visible in the
    // exit code.
    if summary.failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn resolve_plugins_dir(cli_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match cli_dir {
        Some(dir) => Ok(dir),
        None => {
            let config = HostConfig::load().with_context(|| "Failed to load configuration")?;
            Ok(config.plugins_path())
        }
    }
}
