use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::{Config, LoggingSettings, StorageBackend};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The main entry point for the review assigner service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load(&cli)?;

    // Keeps the background log writer alive until the process exits.
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Serve(_) => web_server::run_server(config).await,
        Commands::Migrate => handle_migrate(&config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Assigns pull request reviewers from the author's team.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml if present).
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Apply pending database migrations and exit.
    Migrate,
}

#[derive(Parser)]
struct ServeArgs {
    /// Overrides `storage.backend`.
    #[arg(long, value_enum)]
    storage: Option<StorageBackend>,

    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

/// Loads the configuration and applies command-line overrides on top of it.
fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = configuration::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Commands::Serve(args) = &cli.command {
        if let Some(storage) = args.storage {
            config.storage.backend = storage;
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        configuration::validate(&config)?;
    }
    Ok(config)
}

// ==============================================================================
// Logging
// ==============================================================================

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(settings: &LoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("Invalid logging.level")?;

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "review-assigner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

// ==============================================================================
// Migrate Command
// ==============================================================================

async fn handle_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = database::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    database::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Migrations are up to date.");
    Ok(())
}
