use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use fushub_db::models::ListingFields;
use fushub_types::api::{CreateListingRequest, SetAvailabilityRequest, UpdateListingRequest};
use fushub_types::events::{ChangeEvent, ListingChange};
use fushub_types::models::{Listing, Role};

use crate::error::{ApiError, ApiResult};
use crate::filter::{BrowseQuery, ListingFilter};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

const MAX_IMAGES: usize = 10;

/// GET /listings: available listings, newest first, narrowed by the query filter.
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ListingFilter::try_from(query)?;
    let rows = db_call(&state, |db| db.available_listings()).await?;
    let batch: Vec<Listing> = rows.into_iter().map(mapping::listing).collect();
    Ok(Json(filter.apply(batch)))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = listing_id.to_string();
    let row = db_call(&state, move |db| db.get_listing(&id))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;
    Ok(Json(mapping::listing(row)))
}

pub async fn my_listings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let rows = db_call(&state, move |db| db.listings_by_owner(&uid)).await?;
    Ok(Json(rows.into_iter().map(mapping::listing).collect::<Vec<_>>()))
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateListingRequest>,
) -> ApiResult<impl IntoResponse> {
    if session.role != Role::Owner {
        return Err(ApiError::Forbidden("only owners can publish listings"));
    }
    let fields = validate(req)?;

    let listing_id = Uuid::new_v4();
    let (id, owner) = (listing_id.to_string(), session.user_id.to_string());
    let row = db_call(&state, move |db| {
        db.insert_listing(&id, &owner, &fields)?;
        db.get_listing(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("listing"))?;

    info!("{} published listing {}", session.user_id, listing_id);
    state.dispatcher.broadcast(ChangeEvent::ListingChanged {
        listing_id,
        change: ListingChange::Created,
    });

    Ok((StatusCode::CREATED, Json(mapping::listing(row))))
}

pub async fn update_listing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<UpdateListingRequest>,
) -> ApiResult<impl IntoResponse> {
    let current = owned_listing(&state, &session, listing_id).await?;
    let fields = validate(merge(current, req))?;

    let id = listing_id.to_string();
    let row = db_call(&state, move |db| {
        db.update_listing(&id, &fields)?;
        db.get_listing(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("listing"))?;

    state.dispatcher.broadcast(ChangeEvent::ListingChanged {
        listing_id,
        change: ListingChange::Updated,
    });

    Ok(Json(mapping::listing(row)))
}

pub async fn set_availability(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<SetAvailabilityRequest>,
) -> ApiResult<impl IntoResponse> {
    owned_listing(&state, &session, listing_id).await?;

    let id = listing_id.to_string();
    let row = db_call(&state, move |db| {
        db.set_listing_availability(&id, req.available)?;
        db.get_listing(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("listing"))?;

    state.dispatcher.broadcast(ChangeEvent::ListingChanged {
        listing_id,
        change: ListingChange::Updated,
    });

    Ok(Json(mapping::listing(row)))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    owned_listing(&state, &session, listing_id).await?;

    let id = listing_id.to_string();
    db_call(&state, move |db| db.delete_listing(&id)).await?;

    info!("{} deleted listing {}", session.user_id, listing_id);
    state.dispatcher.broadcast(ChangeEvent::ListingChanged {
        listing_id,
        change: ListingChange::Deleted,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Loads a listing and checks the caller owns it.
async fn owned_listing(state: &AppState, session: &Session, listing_id: Uuid) -> ApiResult<Listing> {
    let id = listing_id.to_string();
    let row = db_call(state, move |db| db.get_listing(&id))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;
    let listing = mapping::listing(row);
    if listing.owner_id != session.user_id {
        return Err(ApiError::Forbidden("only the owner can change this listing"));
    }
    Ok(listing)
}

/// Overlay a partial update on the current values.
fn merge(current: Listing, req: UpdateListingRequest) -> CreateListingRequest {
    CreateListingRequest {
        title: req.title.unwrap_or(current.title),
        listing_type: req.listing_type.unwrap_or(current.listing_type),
        price_cents: req.price_cents.unwrap_or(current.price_cents),
        bedrooms: req.bedrooms.unwrap_or(current.bedrooms),
        bathrooms: req.bathrooms.unwrap_or(current.bathrooms),
        max_occupants: req.max_occupants.unwrap_or(current.max_occupants),
        available_spots: req.available_spots.unwrap_or(current.available_spots),
        address: req.address.unwrap_or(current.address),
        neighborhood: req.neighborhood.unwrap_or(current.neighborhood),
        city: req.city.unwrap_or(current.city),
        state: req.state.unwrap_or(current.state),
        description: req.description.unwrap_or(current.description),
        amenities: req.amenities.unwrap_or(current.amenities),
        images: req.images.unwrap_or(current.images),
    }
}

fn text(value: &str, field: &str, min: usize, max: usize) -> ApiResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::validation(format!(
            "{} must be {} to {} characters",
            field, min, max
        )));
    }
    Ok(value.to_string())
}

/// Validates a listing submission into the columns the database stores.
pub fn validate(req: CreateListingRequest) -> ApiResult<ListingFields> {
    let title = text(&req.title, "title", 5, 100)?;
    if req.price_cents <= 0 {
        return Err(ApiError::validation("price must be greater than zero"));
    }
    if req.max_occupants < 1 {
        return Err(ApiError::validation("max_occupants must be at least 1"));
    }
    if req.available_spots > req.max_occupants {
        return Err(ApiError::validation("available_spots cannot exceed max_occupants"));
    }
    let address = text(&req.address, "address", 5, 200)?;
    let neighborhood = text(&req.neighborhood, "neighborhood", 2, 100)?;
    let city = text(&req.city, "city", 2, 100)?;

    let state = req.state.trim().to_ascii_uppercase();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::validation("state must be a two-letter code"));
    }

    let description = text(&req.description, "description", 20, 1000)?;

    if req.images.is_empty() || req.images.len() > MAX_IMAGES {
        return Err(ApiError::validation("a listing needs 1 to 10 images"));
    }
    for url in &req.images {
        crate::profiles::validate_http_url(url)?;
    }

    let mut amenities = Vec::with_capacity(req.amenities.len());
    for amenity in req.amenities {
        if !amenities.contains(&amenity) {
            amenities.push(amenity);
        }
    }

    Ok(ListingFields {
        title,
        listing_type: req.listing_type,
        price_cents: req.price_cents,
        bedrooms: req.bedrooms,
        bathrooms: req.bathrooms,
        max_occupants: req.max_occupants,
        available_spots: req.available_spots,
        address,
        neighborhood,
        city,
        state,
        description,
        amenities,
        images: req.images,
    })
}
