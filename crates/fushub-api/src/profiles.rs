use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use fushub_types::api::UpdateProfileRequest;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let uid = user_id.to_string();
    let row = db_call(&state, move |db| db.get_profile(&uid))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(mapping::profile(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(mut req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    req.avatar_url = blank_to_none(req.avatar_url.take());
    req.validate()?;
    let full_name = validate_full_name(&req.full_name)?;
    let phone = blank_to_none(req.phone);
    let university = blank_to_none(req.university);
    let avatar_url = req.avatar_url;
    if let Some(url) = &avatar_url {
        validate_http_url(url)?;
    }

    let uid = session.user_id.to_string();
    let row = db_call(&state, move |db| {
        db.update_profile(
            &uid,
            &full_name,
            phone.as_deref(),
            university.as_deref(),
            avatar_url.as_deref(),
        )?;
        db.get_profile(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound("profile"))?;

    Ok(Json(mapping::profile(row)))
}

/// Trimmed, 2..=100 characters.
pub fn validate_full_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(ApiError::validation("full name must be 2 to 100 characters"));
    }
    Ok(name.to_string())
}

pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A well-formed absolute URL on http or https.
pub fn validate_http_url(url: &str) -> ApiResult<()> {
    let http = url.starts_with("https://") || url.starts_with("http://");
    if !http || !validator::validate_url(url) {
        return Err(ApiError::validation("URL must be an http:// or https:// address"));
    }
    Ok(())
}
