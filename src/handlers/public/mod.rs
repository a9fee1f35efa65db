use axum::response::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Dealcoach API",
            "version": version,
            "description": "AI coaching pipeline for real-estate agent P&L and goal data",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "generate": "/ai-coach/generate (protected)",
                "diag": "/ai-coach/diag (protected)",
            }
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
