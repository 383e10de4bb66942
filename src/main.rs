use std::sync::Arc;

use qa_console::config::{Args, Config};
use qa_console::{AppState, create_app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qa_console=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Args = argh::from_env();
    let config = Config::from_args(args);
    tracing::info!("backend API at {}", config.api_url);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let open_browser = config.open;
    let state = Arc::new(AppState::new(config)?);
    let app = create_app(state);

    let url = format!("http://{}", listener.local_addr()?);
    tracing::info!("{}", url);

    if open_browser && let Err(e) = open::that(&url) {
        tracing::error!("Failed to open browser: {}", e);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
