//! Log output for binaries and examples.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs a fmt subscriber filtered by `RUST_LOG`, writing to stderr.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default(DEFAULT_DIRECTIVE)
}

/// Like [`init`] with a different default filter.
pub fn init_with_default(directive: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        init_with_default("warn");
        assert!(!init());
    }
}
