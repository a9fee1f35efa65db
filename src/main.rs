use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use dealcoach_api::coach::invoke::OpenAiInvoker;
use dealcoach_api::coach::store::PostgresStore;
use dealcoach_api::coach::CoachPipeline;
use dealcoach_api::config;
use dealcoach_api::server::app;
use dealcoach_api::services::SqlCoachData;
use dealcoach_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Dealcoach API in {:?} mode", config.environment);

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to database: {}", e));

    let api_key = std::env::var("COACH_MODEL_API_KEY").unwrap_or_default();
    let invoker = OpenAiInvoker::new(
        &config.coach.model_base_url,
        &api_key,
        config.coach.model_timeout_secs,
    )
    .unwrap_or_else(|e| panic!("failed to build model client: {}", e));

    let pipeline = Arc::new(CoachPipeline::new(
        config.coach.clone(),
        Arc::new(SqlCoachData::new(pool.clone())),
        Arc::new(PostgresStore::new(pool)),
        Arc::new(invoker),
    ));

    let app = app(AppState::new(pipeline));

    // Allow tests or deployments to override port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Dealcoach API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
