//! Tracing subscriber setup for binaries and demos.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Like [`init_tracing`], with `default_directives` used when `RUST_LOG`
/// is unset or invalid.
pub fn init_tracing_with(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing_with("debug");
        init_tracing();
    }
}
