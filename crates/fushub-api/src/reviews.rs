use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use fushub_types::api::{CreateReviewRequest, ReviewEligibility, ReviewListResponse, ReviewResponse};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

const MAX_COMMENT_CHARS: usize = 1000;

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let lid = listing_id.to_string();
    let rows = db_call(&state, move |db| db.reviews_for_listing(&lid)).await?;
    let reviews: Vec<ReviewResponse> = rows.into_iter().map(mapping::review).collect();
    Ok(Json(summarize(reviews)))
}

pub async fn eligibility(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let can_review = can_review(&state, session.user_id, listing_id).await?;
    Ok(Json(ReviewEligibility { can_review }))
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    let comment = req.comment.trim().to_string();
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::validation("comment is longer than 1000 characters"));
    }

    let (lid, uid) = (listing_id.to_string(), session.user_id.to_string());
    let (listing, reviewed, completed) = db_call(&state, move |db| {
        Ok((
            db.get_listing(&lid)?,
            db.has_reviewed(&lid, &uid)?,
            db.has_completed_booking(&lid, &uid)?,
        ))
    })
    .await?;
    if listing.is_none() {
        return Err(ApiError::NotFound("listing"));
    }
    if reviewed {
        return Err(ApiError::Conflict("you already reviewed this listing".into()));
    }
    if !completed {
        return Err(ApiError::Forbidden("only tenants with a completed stay can review"));
    }

    let review_id = Uuid::new_v4();
    let (rid, lid, uid) = (
        review_id.to_string(),
        listing_id.to_string(),
        session.user_id.to_string(),
    );
    let rating = req.rating;
    // A concurrent duplicate surfaces here as a constraint violation (409)
    db_call(&state, move |db| db.insert_review(&rid, &lid, &uid, rating, &comment)).await?;

    let lid = listing_id.to_string();
    let rows = db_call(&state, move |db| db.reviews_for_listing(&lid)).await?;
    let review = rows
        .into_iter()
        .map(mapping::review)
        .find(|r| r.id == review_id)
        .ok_or(ApiError::NotFound("review"))?;

    info!("{} reviewed listing {} ({} stars)", session.user_id, listing_id, rating);
    Ok((StatusCode::CREATED, Json(review)))
}

async fn can_review(state: &AppState, user_id: Uuid, listing_id: Uuid) -> ApiResult<bool> {
    let (lid, uid) = (listing_id.to_string(), user_id.to_string());
    db_call(state, move |db| {
        Ok(db.has_completed_booking(&lid, &uid)? && !db.has_reviewed(&lid, &uid)?)
    })
    .await
}

/// Average rounded to one decimal, `None` when there are no reviews.
pub fn summarize(reviews: Vec<ReviewResponse>) -> ReviewListResponse {
    let count = reviews.len() as u32;
    let average_rating = (count > 0).then(|| {
        let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        (f64::from(sum) / f64::from(count) * 10.0).round() / 10.0
    });
    ReviewListResponse {
        reviews,
        average_rating,
        count,
    }
}
