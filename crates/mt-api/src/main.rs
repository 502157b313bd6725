mod pixel;
mod routes;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use http::Method;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use mt_adapters::text_gen::{ChatCompletionClient, TextGenConfig};
use mt_adapters::transport::{HttpMailRelay, RelayConfig};
use mt_config::Config;
use mt_core::correlate::OpenCorrelator;
use mt_core::dispatch::DispatchCoordinator;
use mt_core::ports::{DeliveryStore, MailTransport, TextGenerator};
use mt_core::render::ContentRenderer;
use mt_storage::{migrate, new_pool, SqlStore};

#[derive(Clone)]
struct AppState {
    pool: sqlx::AnyPool,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "OK")
    )
)]
async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[utoipa::path(
    get,
    path = "/api/v1/ping",
    responses(
        (status = 200, description = "Ping with DB check"),
        (status = 500, description = "Database error")
    )
)]
async fn ping(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    // Test DB connection with simple query
    let result: Result<i64, _> = sqlx::query_scalar("SELECT 1")
        .fetch_one(&state.pool)
        .await;

    match result {
        Ok(_) => Ok(Json(json!({"ok": true, "db": "up"}))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz,
        ping,
        routes::track::track,
        routes::campaigns::submit_campaign
    ),
    components(schemas(
        routes::campaigns::CampaignRequest,
        routes::campaigns::CampaignResponse,
        mt_core::dispatch::BatchResult
    )),
    tags(
        (name = "mt-api", description = "Mailtrack campaign dispatch and open tracking API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing (JSON logs)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .without_time()
        .init();

    let config = Config::load()?;
    info!("Starting mt-api on {}", config.bind_addr);

    // Initialize DB
    let pool = new_pool(&config.db_url).await?;
    migrate(&pool).await?;

    let state = AppState { pool: pool.clone() };
    let store: Arc<dyn DeliveryStore> = Arc::new(SqlStore::new(pool));

    // External collaborators
    let generator: Arc<dyn TextGenerator> = Arc::new(ChatCompletionClient::new(
        TextGenConfig::new(
            config.textgen_url.clone(),
            config.textgen_api_key.clone(),
            config.textgen_model.clone(),
            config.textgen_timeout_ms,
        ),
    )?);
    let transport: Arc<dyn MailTransport> = Arc::new(HttpMailRelay::new(RelayConfig::new(
        config.relay_url.clone(),
        config.relay_api_key.clone(),
        config.relay_timeout_ms,
    ))?);

    // Engine
    let renderer = ContentRenderer::new(generator, config.sender.clone(), config.public_url.clone());
    let coordinator = Arc::new(DispatchCoordinator::new(renderer, transport, store.clone()));
    let correlator = Arc::new(OpenCorrelator::new(store));

    let api = ApiDoc::openapi();

    // The pixel is fetched cross-origin by arbitrary mail clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST]);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/ping", get(ping))
        .route("/openapi.json", get(|| async move { Json(api) }))
        .with_state(state)
        .merge(routes::track::track_router(correlator))
        .merge(routes::campaigns::campaign_router(coordinator))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
