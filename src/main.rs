mod config;
mod db;
mod error;
mod llm;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("configuration failed");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("database init failed");

    // Initialize LLM client (non-fatal: AI features disabled if config missing).
    let llm: Option<Arc<dyn llm::LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured — AI features disabled");
            None
        }
    };

    let rate_limiter = rate_limit::RateLimiter::connect(config.redis_url.as_deref())
        .await
        .expect("rate limiter init failed");

    let port = config.port;
    let state = state::AppState::new(pool, config, llm, rate_limiter);

    // Spawn background sweep for in-process caches.
    let _sweeper = services::sweeper::spawn_sweep_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "launchkit listening");
    axum::serve(listener, app).await.expect("server failed");
}
