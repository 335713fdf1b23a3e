use anyhow::{Result, anyhow};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Events go to stderr, stdout only carries the admission response.
pub fn setup_tracing(verbose: bool, log_fmt: &str) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter_layer = EnvFilter::new(level);

    match log_fmt {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "text" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        _ => return Err(anyhow!("Unknown log message format: {}", log_fmt)),
    };

    Ok(())
}
