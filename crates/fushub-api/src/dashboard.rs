use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};

use fushub_db::models::ListingStatsRow;
use fushub_types::api::{ListingPerformance, OwnerDashboard};
use fushub_types::models::{Listing, Role};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, db_call, mapping};

/// GET /me/dashboard: per-listing engagement for the calling owner.
pub async fn owner_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    if session.role != Role::Owner {
        return Err(ApiError::Forbidden("the dashboard is only available to owners"));
    }

    let uid = session.user_id.to_string();
    let (listings, stats, unread) = db_call(&state, move |db| {
        Ok((
            db.listings_by_owner(&uid)?,
            db.listing_stats_for_owner(&uid)?,
            db.total_unread(&uid)?,
        ))
    })
    .await?;

    let listings: Vec<Listing> = listings.into_iter().map(mapping::listing).collect();
    Ok(Json(assemble(listings, stats, unread)))
}

fn count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Joins listings with their stats rows. A listing without a stats row
/// reports zeros.
pub fn assemble(listings: Vec<Listing>, stats: Vec<ListingStatsRow>, unread: i64) -> OwnerDashboard {
    let mut by_listing: HashMap<String, ListingStatsRow> =
        stats.into_iter().map(|s| (s.listing_id.clone(), s)).collect();

    let active_listings = count(listings.iter().filter(|l| l.available).count() as i64);
    let listings = listings
        .into_iter()
        .map(|listing| {
            let stats = by_listing.remove(&listing.id.to_string());
            ListingPerformance {
                favorites: stats.as_ref().map_or(0, |s| count(s.favorites)),
                inquiries: stats.as_ref().map_or(0, |s| count(s.inquiries)),
                review_count: stats.as_ref().map_or(0, |s| count(s.review_count)),
                average_rating: stats
                    .and_then(|s| s.average_rating)
                    .map(|avg| (avg * 10.0).round() / 10.0),
                listing,
            }
        })
        .collect();

    OwnerDashboard {
        listings,
        active_listings,
        total_unread: count(unread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fushub_types::models::ListingType;
    use uuid::Uuid;

    fn listing(available: bool) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            title: "Room near the campus".into(),
            listing_type: ListingType::Kitnet,
            price_cents: 80_000,
            bedrooms: 1,
            bathrooms: 1,
            max_occupants: 1,
            available_spots: 1,
            address: "Rua A, 10".into(),
            neighborhood: "Centro".into(),
            city: "Campinas".into(),
            state: "SP".into(),
            description: String::new(),
            amenities: vec![],
            images: vec![],
            available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stats_are_joined_per_listing() {
        let (a, b) = (listing(true), listing(false));
        let stats = vec![ListingStatsRow {
            listing_id: a.id.to_string(),
            favorites: 3,
            inquiries: 2,
            review_count: 3,
            average_rating: Some(4.666),
        }];

        let dashboard = assemble(vec![a.clone(), b.clone()], stats, 5);
        assert_eq!(dashboard.active_listings, 1);
        assert_eq!(dashboard.total_unread, 5);

        let first = &dashboard.listings[0];
        assert_eq!(first.listing.id, a.id);
        assert_eq!(first.favorites, 3);
        assert_eq!(first.inquiries, 2);
        assert_eq!(first.average_rating, Some(4.7));

        let second = &dashboard.listings[1];
        assert_eq!(second.listing.id, b.id);
        assert_eq!(second.favorites, 0);
        assert!(second.average_rating.is_none());
    }
}
