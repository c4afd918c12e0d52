use kresolve_core::{Error, Result, LOG_VAR};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize the tracing system
///
/// Events go to stderr; stdout is reserved for resolved manifests. The
/// filter comes from `RUST_LOG`, then `KRESOLVE_LOG`, then defaults to
/// `info` (`debug` when `verbose` is set). Colours are only used when
/// stderr is a terminal.
pub fn init(verbose: bool) -> Result<()> {
    let directive = filter_directive(
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        std::env::var(LOG_VAR).ok(),
        verbose,
    );
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| Error::configuration(format!("invalid log filter '{directive}': {e}")))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("installing tracing subscriber: {e}")))?;

    Ok(())
}

/// Pick the filter directive from the candidate sources, first non-blank wins
fn filter_directive(rust_log: Option<String>, kresolve_log: Option<String>, verbose: bool) -> String {
    rust_log
        .into_iter()
        .chain(kresolve_log)
        .find(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| {
            if verbose {
                "debug".to_string()
            } else {
                DEFAULT_DIRECTIVE.to_string()
            }
        })
}

/// Check if stderr is attached to a terminal
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}
