use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use fushub_types::api::ToggleFavoriteResponse;
use fushub_types::events::ChangeEvent;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

/// POST /listings/{id}/favorite flips the caller's favorite for the listing.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (uid, lid) = (session.user_id.to_string(), listing_id.to_string());
    let toggled = db_call(&state, move |db| {
        if db.get_listing(&lid)?.is_none() {
            return Ok(None);
        }
        db.toggle_favorite(&uid, &lid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("listing"))?;

    state
        .dispatcher
        .send_to_user(
            session.user_id,
            ChangeEvent::FavoriteToggled {
                listing_id,
                state: toggled,
            },
        )
        .await;

    Ok(Json(ToggleFavoriteResponse {
        listing_id,
        state: toggled,
    }))
}

pub async fn favorite_ids(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let ids = db_call(&state, move |db| db.favorite_listing_ids(&uid)).await?;
    let ids: Vec<Uuid> = ids.iter().map(|id| mapping::uuid(id, "favorite listing_id")).collect();
    Ok(Json(ids))
}

pub async fn favorite_listings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let rows = db_call(&state, move |db| db.favorite_listings(&uid)).await?;
    Ok(Json(rows.into_iter().map(mapping::listing).collect::<Vec<_>>()))
}
