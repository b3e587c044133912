//! Tracing subscriber setup for the CLI and for tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

fn filter_for(level: &str) -> EnvFilter {
    // RUST_LOG wins over the configured level.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt::Subscriber::builder().with_env_filter(filter_for(&config.level));

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(
            builder
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };
    installed.is_ok()
}

/// Route engine logs through the libtest capture so they show up only for
/// failing tests. Safe to call from every test.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(filter_for("castline=debug"))
        .with_test_writer()
        .try_init();
}
