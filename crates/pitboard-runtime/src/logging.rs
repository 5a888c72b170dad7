//! Logging configuration.
//!
//! `RUST_LOG` takes precedence when set. Otherwise everything logs at INFO,
//! and `PITBOARD_DEBUG=1` raises the pitboard crates to DEBUG.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEBUG_DIRECTIVES: &str = "info,pitboard_core=debug,pitboard_runtime=debug";

pub fn init() {
    let debug_logging = std::env::var("PITBOARD_DEBUG").is_ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug_logging { DEBUG_DIRECTIVES } else { "info" })
    });

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    if let Err(e) = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(filter)
        .try_init()
    {
        // Can't use tracing, a subscriber is already installed.
        eprintln!("Logging already initialized: {e}");
        return;
    }

    tracing::info!(debug_logging, "Pitboard logging initialized");
}
