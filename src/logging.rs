use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Environment;

/// Default log level for an environment. `RUST_LOG` takes precedence.
pub fn default_level(env: Environment) -> &'static str {
    match env {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    }
}

/// Install the global tracing subscriber.
///
/// `local` prints human-readable lines; `dev` and `prod` emit JSON. Logs go
/// to stderr so command output on stdout stays clean.
/// Calling this twice is harmless; the second call is ignored.
pub fn init(env: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(env)));

    let result = match env {
        Environment::Local => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        Environment::Dev | Environment::Prod => fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
}
