/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
/// Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
