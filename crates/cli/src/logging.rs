//! Tracing setup for the binaries

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` for our crates
/// when `verbose`. Logs go to stderr so stdout stays readable.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,sentralert_lib=debug,sentralert_cli=debug"
    } else {
        "warn"
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
