//! Tracing subscriber setup. `SLSKD_SEARCH_LOG` wins over `RUST_LOG`; with
//! neither set, `-v` selects debug output and the default is warnings only.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SLSKD_SEARCH_LOG";

fn build_env_filter(verbose: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if verbose {
        EnvFilter::new("slskd_search=debug,warn")
    } else {
        EnvFilter::new("warn")
    }
}

/// Installs the global subscriber writing to stderr. Safe to call twice;
/// the second call is a no-op.
pub fn init_logging(verbose: bool) {
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(verbose)
        .without_time()
        .compact();
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(verbose))
        .with(layer)
        .try_init();
}
