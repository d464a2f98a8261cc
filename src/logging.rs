//! Tracing subscriber setup
//!
//! `RUST_LOG` overrides the default directive, e.g. `RUST_LOG=debug` or
//! `RUST_LOG=relay_chat=trace`.

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Default directive for the server binary
pub const SERVER_DEFAULT_FILTER: &str = "relay_chat=info";

/// Default directive for the client binary
pub const CLIENT_DEFAULT_FILTER: &str = "relay_chat=warn";

/// Install the global subscriber writing to `writer`
pub fn init<W>(default_filter: &str, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(writer)
        .init();
}
