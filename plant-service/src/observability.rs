use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or unparsable.
const DEFAULT_DIRECTIVES: &str = "plant_service=info,refresh_plants=info";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence; without it only this crate's binaries log,
/// at `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(false)
        .init();
}

fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
