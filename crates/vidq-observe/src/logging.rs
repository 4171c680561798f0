use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `VIDQ_LOG` first, then `RUST_LOG`, then a default.
///
/// Call once from a binary's `main`. Library crates only emit events and never install a
/// subscriber themselves.
///
/// Log field contract:
/// - Queue shutdown events carry `queue` (the diagnostic queue name).
/// - Dataset events carry `clip` and, once a window is chosen, `start`/`end`.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Like [`init_tracing`] but does not panic when a global subscriber is already set.
///
/// Intended for tests and embedding, where several entry points may race to install one.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("VIDQ_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
