// ABOUTME: Shared logging setup for cowork binaries
// ABOUTME: init() logs everything at INFO; init_for() keeps dependencies at WARN

use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Crate-filtered logging to stderr. Default: `level` for the named crate,
/// WARN for everything else (tonic and hyper are chatty at INFO).
pub fn init_for(crate_name: &str, level: tracing::Level) {
    let filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(
            directive_for(crate_name, level)
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn directive_for(crate_name: &str, level: tracing::Level) -> String {
    format!("{}={}", crate_name.replace('-', "_"), level)
}
