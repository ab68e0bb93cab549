use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSection;

/// Pick the filter directive: `RUST_LOG`, then the configured filter, then a
/// default that `--verbose` raises to debug.
pub fn filter_directive(section: &LoggingSection, verbose: bool) -> String {
    if let Ok(env) = std::env::var("RUST_LOG")
        && !env.trim().is_empty()
    {
        return env;
    }
    match section.filter {
        Some(ref filter) => filter.clone(),
        None if verbose => "leadboard=debug".to_string(),
        None => "leadboard=warn".to_string(),
    }
}

/// Install the global subscriber. Events go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_tracing(section: &LoggingSection, verbose: bool) -> Result<()> {
    let directive = filter_directive(section, verbose);
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new("leadboard=warn"))?;

    let result = if section.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
