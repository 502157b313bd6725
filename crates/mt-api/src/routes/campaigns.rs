use anyhow::Context;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use mt_core::dispatch::{BatchResult, DispatchCoordinator};
use mt_core::record::{Attachment, CampaignBatch};

use super::error_response;

#[derive(Clone)]
pub struct CampaignState {
    pub coordinator: Arc<DispatchCoordinator>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CampaignRequest {
    pub recipients: Option<Vec<String>>,
    pub subject: String,
    pub prompt: String,
    /// Server-local path of a file to attach to every message in the batch.
    pub attachment_path: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignResponse {
    pub message: String,
    pub result: BatchResult,
}

/// Run one campaign. Individual recipient failures never fail the request;
/// they are reported inside the result for diagnostics.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    request_body = CampaignRequest,
    responses(
        (status = 200, description = "Campaign dispatched", body = CampaignResponse),
        (status = 400, description = "Missing subject or prompt, or unreadable attachment")
    )
)]
pub async fn submit_campaign(
    State(state): State<CampaignState>,
    Json(request): Json<CampaignRequest>,
) -> Response {
    if request.subject.trim().is_empty() || request.prompt.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidCampaign",
            "Subject and prompt are required!",
        );
    }

    let Some(recipients) = request.recipients else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidCampaign",
            "Recipient list is required!",
        );
    };

    let attachment = match load_attachment(request.attachment_path.as_deref()).await {
        Ok(attachment) => attachment,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "AttachmentUnreadable",
                &format!("{e:#}"),
            );
        }
    };

    let batch = CampaignBatch {
        recipients,
        subject: request.subject,
        prompt: request.prompt,
        attachment,
    };

    let result = state.coordinator.run(&batch).await;
    info!(sent = result.sent, failed = result.failed, "campaign completed");

    let message = result.summary();
    (StatusCode::OK, Json(CampaignResponse { message, result })).into_response()
}

async fn load_attachment(path: Option<&str>) -> anyhow::Result<Option<Attachment>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read attachment {path}"))?;
    let filename = std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment.bin")
        .to_string();
    Ok(Some(Attachment { filename, content }))
}

/// Create the campaign submission router
pub fn campaign_router(coordinator: Arc<DispatchCoordinator>) -> Router {
    Router::new()
        .route("/api/v1/campaigns", post(submit_campaign))
        .with_state(CampaignState { coordinator })
}
