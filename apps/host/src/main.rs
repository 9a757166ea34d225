//! shelltray-host: owns the notification area for a replacement shell.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

use config::HostConfig;

fn main() -> anyhow::Result<()> {
    let config = HostConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();
    tracing::debug!(path = %config.file_path().display(), "configuration loaded");

    app::run(config)
}
