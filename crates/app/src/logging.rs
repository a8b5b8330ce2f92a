use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const ENV_LOG: &str = "PRACTICE_LOG";

/// Install the global subscriber. Logs go to stderr so prompts on stdout
/// stay readable.
pub fn init_tracing(default_filter: &str) {
    let directives = std::env::var(ENV_LOG).unwrap_or_else(|_| default_filter.to_owned());
    let env_filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
