use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use futures::StreamExt;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

use crate::coach::pipeline::GenerateRequest;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// POST /ai-coach/generate
///
/// Non-streaming requests get a complete `CoachResponse` object.
/// `stream=true` requests get a `text/plain` event stream of
/// `data: {...}` lines ending in a done/fallback/error marker.
pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    if request.stream {
        let rx = state.pipeline.generate_stream(&user, request).await?;
        let body = Body::from_stream(
            ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.to_sse())),
        );

        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(body)
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
        return Ok(response);
    }

    let response = state.pipeline.generate(&user, &request).await?;
    Ok(Json(Value::Object(response)).into_response())
}

/// GET /ai-coach/diag
///
/// Support endpoint: what the pipeline can currently see for the caller,
/// counts only.
pub async fn diag(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Json<Value> {
    let report = state.pipeline.diag(user.user_id).await;
    Json(serde_json::json!({ "success": true, "data": report }))
}
