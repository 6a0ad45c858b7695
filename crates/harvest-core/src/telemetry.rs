//! Tracing setup for the `harvest` binary.
//!
//! Log lines go to stderr so stdout stays free for the run summary. The
//! filter comes from `HARVEST_LOG`, then `RUST_LOG`; without either, the
//! harvest crates log at the requested level and everything else at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "HARVEST_LOG";

const HARVEST_TARGETS: [&str; 3] = ["harvest", "harvest_core", "harvest_pipeline"];

/// Filter directives used when neither log variable is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(HARVEST_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber, as JSON lines when `json` is set.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter(level));
    if json {
        registry.with(fmt_layer.json()).try_init().ok();
    } else {
        registry.with(fmt_layer).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_harvest_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,harvest=debug,harvest_core=debug,harvest_pipeline=debug"
        );
        assert!(default_directives(Level::INFO).contains("harvest_pipeline=info"));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still logging");
    }
}
