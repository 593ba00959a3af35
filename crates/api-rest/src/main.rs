//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the `.env` loading the
//! workspace's main `docstore-run` binary performs.
//!
//! ## Intended use
//! Useful for development and debugging when the environment is already set
//! up (for example, inside a container that injects `DOCSTORE_*` variables).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone docstore REST API server.
///
/// # Environment Variables
/// - `DOCSTORE_ADDR`: server address (default: "0.0.0.0:3000")
/// - `DOCSTORE_DIR`: storage root; must exist (default: "docstore_data")
/// - `DOCSTORE_AUTH_ENABLED`, `DOCSTORE_TEST_AUTH`, `DOCSTORE_ALLOWED_USERS`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the storage root is missing or unusable, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DOCSTORE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting docstore REST API on {}", addr);

    let cfg = api_rest::config_from_env()?;
    let state = api_rest::build_state(cfg)?;

    api_rest::serve(&addr, state).await
}
