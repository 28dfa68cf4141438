use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber. Respects `RUST_LOG`, defaulting
/// to `info` for this crate. Safe to call more than once; later calls are
/// ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hrm_client=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
