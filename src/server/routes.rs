use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::dispatcher::{ImageUpload, UploadOutcome};
use crate::pipeline::process_hyperlinks;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use indicatif::ProgressBar;
use media_tracker_common::ClassificationRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// 画像中継だけ本文上限を `upload_limit` にする（他は axum 既定の 2MB）
pub fn media_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/agents/all/messages", post(message_all))
        .route("/agents/:assistant_id/messages", post(message_one))
        .route(
            "/agents/:assistant_id/sessions/:session_id/images",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/process-hyperlinks", post(process))
}

/// 全アシスタントへ送信して統合テキストを返す
async fn message_all(
    State(state): State<AppState>,
    Json(request): Json<ClassificationRequest>,
) -> Json<Value> {
    let consolidated = state.assistants.dispatch_all(&request).await;
    Json(json!({ "consolidated_response": consolidated }))
}

async fn message_one(
    State(state): State<AppState>,
    Path(assistant_id): Path<String>,
    Json(request): Json<ClassificationRequest>,
) -> ApiResult<Json<Value>> {
    let reply = state.assistants.call_one(&assistant_id, &request).await?;
    Ok(Json(reply))
}

/// multipart の `file` をアシスタントのセッションへ中継
async fn upload_image(
    State(state): State<AppState>,
    Path((assistant_id, session_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut upload: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
            .to_vec();
        upload = Some(ImageUpload {
            file_name,
            bytes,
            content_type,
        });
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".into()))?;

    match state
        .assistants
        .upload_image(&assistant_id, &session_id, upload)
        .await?
    {
        UploadOutcome::Uploaded(json) => Ok(Json(json).into_response()),
        UploadOutcome::Rejected { status, message } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(json!({ "error": message }))).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessParams {
    media_sheet_name: Option<String>,
}

/// 設定のワークブックに対して一括処理を実行
async fn process(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
) -> ApiResult<Json<Value>> {
    let sheet = params
        .media_sheet_name
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("media_sheet_name is required".into()))?;

    let _running = state
        .run_lock
        .try_lock()
        .map_err(|_| ApiError::Conflict("Hyperlink processing is already running".into()))?;

    info!(sheet = %sheet, "hyperlink processing requested");
    let progress = ProgressBar::hidden();
    process_hyperlinks(
        &state.config,
        &state.taxonomy,
        state.pipeline.as_ref(),
        &sheet,
        &progress,
    )
    .await?;

    Ok(Json(json!({ "status": "Processing completed. Check output file." })))
}
