use tracing::info;

mod context;
mod server;
mod tools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // config first: its log_level seeds the default filter
    let config = rollcall_core::Config::load(None)?;

    // stdout carries the MCP framing; all diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        db = %config.db_path,
        dry_run = config.dry_run,
        allowlist = config.allowlist().len(),
        "rollcall-mcp starting"
    );

    let store = rollcall_store::Store::open(&config.db_path)?;
    let ctx = context::Context::new(config, store);

    server::run(ctx).await
}
