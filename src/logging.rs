use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `info` unless `debug` is set in the settings
/// file, in which case `RUST_LOG` may pick any level.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
