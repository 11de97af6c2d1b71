use tracing_subscriber::EnvFilter;

// This main function is the entry point when running `cargo run -p web-server`.
// It serves with `config.toml` (if present) and `APP__*` overrides.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = configuration::load_config(None)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    web_server::run_server(config).await
}
