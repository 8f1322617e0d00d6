//! Basil compiler CLI entry point

fn main() {
    // Initialize structured logging with env-based filter, defaulting to
    // info. --verbose raises the default to debug; RUST_LOG wins over both.
    let default = if std::env::args().any(|arg| arg == "--verbose") {
        "debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();

    basil::cli::run();
}
