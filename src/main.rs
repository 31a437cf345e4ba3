use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use rules_agent::api;
use rules_agent::config::Config;
use rules_agent::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("{e}");
        anyhow::bail!(e);
    }
    tracing::info!("Search backend: {}", config.search.backend);
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.model);

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/health", get(api::articles::health))
        .route("/api/search/rules", post(api::search::search_rules))
        .route("/api/agent/ask", post(api::agent::ask))
        .route("/api/article/{articleNumber}", get(api::articles::get_article))
        .route("/api/stats", get(api::articles::stats))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
