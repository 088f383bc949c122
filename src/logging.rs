use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the `-v` count when set.
pub fn init_logging(verbosity: u8) {
    let filter_string = format!("{},peakprint={}", level_for(verbosity), level_for(verbosity));
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_string));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_thread_ids(verbosity > 1);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}
