pub mod builders;

/// Opt-in log output for debugging test runs (RUST_LOG=debug).
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
