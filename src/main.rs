//! Main entry point for the docstore server.
//!
//! Loads `.env`, initialises tracing, resolves the store configuration from
//! the environment, and serves the REST API until the process exits.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the docstore REST server.
///
/// # Environment Variables
/// - `DOCSTORE_ADDR`: server address (default: "0.0.0.0:3000")
/// - `DOCSTORE_DIR`: storage root directory; must exist
/// - `DOCSTORE_AUTH_ENABLED`: `"true"` to require approved sessions
/// - `DOCSTORE_TEST_AUTH`: `"true"` to enable test-mode token issuance
/// - `DOCSTORE_ALLOWED_USERS`: comma-separated allow-list for real auth
///
/// Variables may also come from a `.env` file in the working directory.
///
/// # Returns
/// * `Ok(())` - if the server starts and runs successfully
///
/// # Errors
/// Returns an error if the tracing configuration cannot be initialised, the
/// storage root is missing, or the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docstore=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DOCSTORE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting docstore on {}", addr);

    let cfg = api_rest::config_from_env()?;
    let state = api_rest::build_state(cfg)?;

    api_rest::serve(&addr, state).await
}
