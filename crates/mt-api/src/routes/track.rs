use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use http::{header, StatusCode};
use std::sync::Arc;
use tracing::debug;

use mt_core::correlate::OpenCorrelator;

use crate::pixel::PIXEL_PNG;

#[derive(Clone)]
pub struct TrackState {
    pub correlator: Arc<OpenCorrelator>,
}

/// Tracking pixel endpoint. The correlation outcome is log-only; every
/// caller gets the same 1x1 PNG with status 200, so a mail client can never
/// distinguish matched from unmatched fetches.
#[utoipa::path(
    get,
    path = "/track/{id}",
    params(
        ("id" = String, Path, description = "Candidate tracking identifier")
    ),
    responses(
        (status = 200, description = "1x1 tracking pixel")
    )
)]
pub async fn track(
    State(state): State<TrackState>,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let outcome = state.correlator.on_open_signal(&raw_id).await;
    debug!(?outcome, raw_id, "open signal handled");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        PIXEL_PNG,
    )
}

/// Create the tracking pixel router
pub fn track_router(correlator: Arc<OpenCorrelator>) -> Router {
    Router::new()
        .route("/track/{id}", get(track))
        .with_state(TrackState { correlator })
}
