use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use fushub_types::api::{CreateBookingRequest, MyBookingsResponse, UpdateBookingStatusRequest};
use fushub_types::models::{Booking, BookingStatus};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which side of a booking the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Tenant,
    Owner,
}

/// The owner drives the booking forward; the tenant can only back out.
pub fn may_set(party: Party, from: BookingStatus, to: BookingStatus) -> bool {
    if !from.can_transition_to(to) {
        return false;
    }
    match party {
        Party::Owner => true,
        Party::Tenant => to == BookingStatus::Cancelled,
    }
}

pub fn validate_dates(move_in: NaiveDate, move_out: Option<NaiveDate>) -> ApiResult<()> {
    if move_out.is_some_and(|out| out <= move_in) {
        return Err(ApiError::validation("move_out must be after move_in"));
    }
    Ok(())
}

/// POST /listings/{id}/bookings
pub async fn request_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_dates(req.move_in, req.move_out)?;

    let lid = listing_id.to_string();
    let listing = db_call(&state, move |db| db.get_listing(&lid))
        .await?
        .map(mapping::listing)
        .ok_or(ApiError::NotFound("listing"))?;
    if listing.owner_id == session.user_id {
        return Err(ApiError::validation("you cannot book your own listing"));
    }
    if !listing.available {
        return Err(ApiError::Conflict("listing is not available".into()));
    }

    let booking_id = Uuid::new_v4();
    let (bid, lid, uid) = (
        booking_id.to_string(),
        listing_id.to_string(),
        session.user_id.to_string(),
    );
    let move_in = req.move_in.format(DATE_FORMAT).to_string();
    let move_out = req.move_out.map(|d| d.format(DATE_FORMAT).to_string());
    let row = db_call(&state, move |db| {
        db.insert_booking(&bid, &lid, &uid, &move_in, move_out.as_deref())?;
        db.get_booking(&bid)
    })
    .await?
    .ok_or(ApiError::NotFound("booking"))?;

    info!("{} requested booking {} for listing {}", session.user_id, booking_id, listing_id);
    Ok((StatusCode::CREATED, Json(mapping::booking(row))))
}

/// PUT /bookings/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateBookingStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let bid = booking_id.to_string();
    let row = db_call(&state, move |db| db.get_booking(&bid))
        .await?
        .ok_or(ApiError::NotFound("booking"))?;

    let owner_id = mapping::uuid(&row.owner_id, "booking owner_id");
    let current = mapping::booking(row);
    let party = if owner_id == session.user_id {
        Party::Owner
    } else if current.tenant_id == session.user_id {
        Party::Tenant
    } else {
        return Err(ApiError::NotFound("booking"));
    };

    if !current.status.can_transition_to(req.status) {
        return Err(ApiError::Conflict(format!(
            "cannot move a {} booking to {}",
            current.status, req.status
        )));
    }
    if !may_set(party, current.status, req.status) {
        return Err(ApiError::Forbidden("tenants can only cancel a booking"));
    }

    let bid = booking_id.to_string();
    let (from, to) = (current.status, req.status);
    let (changed, row) = db_call(&state, move |db| {
        Ok((db.update_booking_status(&bid, from, to)?, db.get_booking(&bid)?))
    })
    .await?;
    if !changed {
        return Err(ApiError::Conflict("booking changed concurrently, reload and retry".into()));
    }
    let booking = row.map(mapping::booking).ok_or(ApiError::NotFound("booking"))?;

    info!("Booking {} {} -> {} by {}", booking_id, from, to, session.user_id);
    Ok(Json(booking))
}

/// GET /me/bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let (as_tenant, as_owner) = db_call(&state, move |db| {
        Ok((db.bookings_for_tenant(&uid)?, db.bookings_for_owner(&uid)?))
    })
    .await?;

    let map = |rows: Vec<_>| -> Vec<Booking> { rows.into_iter().map(mapping::booking).collect() };
    Ok(Json(MyBookingsResponse {
        as_tenant: map(as_tenant),
        as_owner: map(as_owner),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_drives_the_lifecycle() {
        use BookingStatus::*;
        assert!(may_set(Party::Owner, Pending, Confirmed));
        assert!(may_set(Party::Owner, Confirmed, Completed));
        assert!(may_set(Party::Owner, Pending, Cancelled));
        assert!(!may_set(Party::Owner, Pending, Completed));
        assert!(!may_set(Party::Owner, Cancelled, Confirmed));
        assert!(!may_set(Party::Owner, Completed, Cancelled));
    }

    #[test]
    fn tenant_can_only_cancel() {
        use BookingStatus::*;
        assert!(may_set(Party::Tenant, Pending, Cancelled));
        assert!(may_set(Party::Tenant, Confirmed, Cancelled));
        assert!(!may_set(Party::Tenant, Pending, Confirmed));
        assert!(!may_set(Party::Tenant, Confirmed, Completed));
    }

    #[test]
    fn move_out_must_follow_move_in() {
        let d = |s: &str| NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap();
        assert!(validate_dates(d("2026-03-01"), None).is_ok());
        assert!(validate_dates(d("2026-03-01"), Some(d("2026-08-01"))).is_ok());
        assert!(validate_dates(d("2026-03-01"), Some(d("2026-03-01"))).is_err());
        assert!(validate_dates(d("2026-03-01"), Some(d("2026-02-01"))).is_err());
    }
}
