//! Telemetry initialization.
//!
//! Controlled by `STRATA_TELEMETRY`:
//! - unset → no-op (tracing disabled, zero overhead)
//! - `"stderr"` → human-readable events to stderr
//! - `"json"` → JSON events to stderr
//!
//! Log verbosity follows the standard `RUST_LOG` env filter, defaulting
//! to `info`.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber based on `STRATA_TELEMETRY`.
///
/// Safe to call more than once: later calls are no-ops if a subscriber is
/// already installed.
pub fn init() {
    match std::env::var("STRATA_TELEMETRY").ok().as_deref() {
        None | Some("") => {}
        Some("json") => init_stderr(true),
        Some(_) => init_stderr(false),
    }
}

/// Events to stderr via tracing-subscriber's fmt layer.
fn init_stderr(json: bool) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}
