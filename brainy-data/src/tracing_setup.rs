//! Tracing initialization for host binaries embedding Brainy.
//!
//! This is a helper for whatever process links this library in — it must
//! never be called from library code that itself gets embedded, since
//! installing a global subscriber twice panics. CLIs and servers built on
//! top of `BrainyData` call this once at startup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a registry with an env-filter layer and an fmt layer, and
/// optionally a non-blocking rolling file appender under `log_dir`.
///
/// Returns the file appender's guard when one was configured; the caller
/// must hold onto it for the process lifetime; dropping it stops flushing
/// buffered log lines to disk.
pub fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brainy=info"));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "brainy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
            None
        }
    }
}
