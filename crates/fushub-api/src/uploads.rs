use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use fushub_types::api::UploadResponse;
use fushub_types::models::Bucket;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::storage::{MAX_UPLOAD_SIZE, extension_for, is_safe_path};
use crate::{AppState, db_call};

/// POST /storage/{bucket}: raw image bytes, stored under the caller's folder.
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    let bucket: Bucket = bucket.parse()?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let ext = extension_for(&content_type)
        .ok_or_else(|| ApiError::UnsupportedMediaType(content_type.clone()))?;

    if bytes.is_empty() {
        return Err(ApiError::validation("upload body is empty"));
    }
    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::PayloadTooLarge(MAX_UPLOAD_SIZE));
    }

    let path = format!("{}/{}.{}", session.user_id, Uuid::new_v4(), ext);
    let sha256 = state.storage.write(bucket, &path, &bytes).await?;
    let size = bytes.len() as u64;

    let (p, uid, ct, hash) = (
        path.clone(),
        session.user_id.to_string(),
        content_type,
        sha256.clone(),
    );
    let recorded = db_call(&state, move |db| {
        db.insert_object(bucket.as_str(), &p, &uid, &ct, size as i64, &hash)
    })
    .await;
    if let Err(e) = recorded {
        if let Err(cleanup) = state.storage.delete(bucket, &path).await {
            error!("Failed to remove orphaned object {}/{}: {}", bucket, path, cleanup);
        }
        return Err(e);
    }

    info!("{} uploaded {}/{} ({} bytes)", session.user_id, bucket, path, size);
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            bucket,
            public_url: state.storage.public_url(bucket, &path),
            path,
            size,
            sha256,
        }),
    ))
}

/// DELETE /storage/{bucket}/{*path}. Only the uploader may remove an object.
pub async fn delete_object(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bucket, path)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let bucket: Bucket = bucket.parse()?;
    if !is_safe_path(&path) {
        return Err(ApiError::NotFound("object"));
    }

    let p = path.clone();
    let object = db_call(&state, move |db| db.get_object(bucket.as_str(), &p))
        .await?
        .ok_or(ApiError::NotFound("object"))?;
    if object.uploader_id != session.user_id.to_string() {
        return Err(ApiError::Forbidden("only the uploader can delete this object"));
    }

    let p = path.clone();
    db_call(&state, move |db| db.delete_object(bucket.as_str(), &p)).await?;
    state.storage.delete(bucket, &path).await?;

    Ok(StatusCode::NO_CONTENT)
}
