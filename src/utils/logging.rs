//! Diagnostic logging setup for the binary.
//!
//! Logs go to stderr so they never interleave with streamed output on stdout.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Directives enabled by `-v` when `RUST_LOG` is not set.
const VERBOSE_DIRECTIVES: &[&str] = &["parley=debug"];

pub fn build_filter(verbose: u8, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|directives| !directives.trim().is_empty()) {
        return EnvFilter::new(directives);
    }

    let mut filter = EnvFilter::new("warn");
    if verbose > 0 {
        for directive in VERBOSE_DIRECTIVES {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }
    if verbose > 1 {
        filter = filter.add_directive(Level::DEBUG.into());
    }
    filter
}

pub fn init(verbose: u8) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(verbose, rust_log.as_deref());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
