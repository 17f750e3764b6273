use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` directives are honoured on
/// top of an `info` baseline. Safe to call more than once.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .try_init();
}
