use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with file and console logging
///
/// 1. Console (stdout): INFO and above, or whatever `RUST_LOG` asks for
/// 2. File: DEBUG and above, rotated daily under `./logs`
///
/// The returned WorkerGuard must stay alive for the whole program, otherwise
/// buffered file output is lost on shutdown.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // yamdb_backend.log.2026-10-19, yamdb_backend.log.2026-10-20, ...
    let file_appender = rolling::daily("./logs", "yamdb_backend.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
