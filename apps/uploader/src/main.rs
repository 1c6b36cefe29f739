//! OncoStage uploader entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the file ids.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let invocation = match app::parse_args(std::env::args().skip(1))? {
        app::Command::Help => {
            println!("{}", app::USAGE);
            return Ok(());
        }
        app::Command::Upload(invocation) => invocation,
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting OncoStage uploader"
    );

    let config = config::Config::load()?;
    tracing::info!(
        uploader = %config.uploader,
        api = %config.api_base_url,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, invocation))?;

    Ok(())
}
