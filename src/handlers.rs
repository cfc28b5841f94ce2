/// Axum handlers for the relay
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::{RelayError, StaticError};
use crate::models::{SummaryRequest, SummaryResponse};
use crate::relay;
use crate::static_files;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument};

/// `POST /api/summary`: validate the body, forward it upstream, reply with the summary.
#[instrument(skip(state, body))]
pub async fn summary_handler<T: HttpClient + Sync>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Json<SummaryResponse>, RelayError> {
    debug!("Received summary request body of size: {}", body.len());
    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(RelayError::server)?;

    let request = SummaryRequest::from_json(&payload).inspect_err(|e| {
        info!("Rejecting summary request: {}", e);
    })?;

    let summary = relay::summarize(&state.http_client, &state.upstream, &request).await?;
    Ok(Json(SummaryResponse { summary }))
}

/// Fallback for every other method and path: serve from the static root.
#[instrument(skip(state))]
pub async fn static_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    uri: Uri,
) -> Result<Response, StaticError> {
    let file = static_files::load(&state.static_root, uri.path())
        .await
        .inspect_err(|e| {
            if let StaticError::Io(io) = e {
                error!("Failed to read static file {}: {}", uri.path(), io);
            }
        })?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes).into_response())
}
