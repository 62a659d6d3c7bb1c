use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{ListingFields, ListingRow, ListingStatsRow};
use crate::{Database, now};

pub(crate) const LISTING_COLUMNS: &str = "l.id, l.owner_id, l.title, l.listing_type, l.price_cents,
    l.bedrooms, l.bathrooms, l.max_occupants, l.available_spots, l.address, l.neighborhood,
    l.city, l.state, l.description, l.amenities, l.images, l.available, l.created_at, l.updated_at";

impl Database {
    // -- Listings --

    pub fn insert_listing(&self, id: &str, owner_id: &str, fields: &ListingFields) -> Result<()> {
        let amenities = serde_json::to_string(&fields.amenities)?;
        let images = serde_json::to_string(&fields.images)?;

        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO listings (id, owner_id, title, listing_type, price_cents, bedrooms, bathrooms,
                    max_occupants, available_spots, address, neighborhood, city, state, description,
                    amenities, images, available, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 1, ?17, ?17)",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.listing_type.as_str(),
                    fields.price_cents,
                    fields.bedrooms,
                    fields.bathrooms,
                    fields.max_occupants,
                    fields.available_spots,
                    fields.address,
                    fields.neighborhood,
                    fields.city,
                    fields.state,
                    fields.description,
                    amenities,
                    images,
                    ts,
                ],
            )?;
            Ok(())
        })
    }

    /// Overwrites every owner-editable column. Returns `false` if the listing is gone.
    pub fn update_listing(&self, id: &str, fields: &ListingFields) -> Result<bool> {
        let amenities = serde_json::to_string(&fields.amenities)?;
        let images = serde_json::to_string(&fields.images)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE listings SET title = ?2, listing_type = ?3, price_cents = ?4, bedrooms = ?5,
                    bathrooms = ?6, max_occupants = ?7, available_spots = ?8, address = ?9,
                    neighborhood = ?10, city = ?11, state = ?12, description = ?13, amenities = ?14,
                    images = ?15, updated_at = ?16
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    fields.title,
                    fields.listing_type.as_str(),
                    fields.price_cents,
                    fields.bedrooms,
                    fields.bathrooms,
                    fields.max_occupants,
                    fields.available_spots,
                    fields.address,
                    fields.neighborhood,
                    fields.city,
                    fields.state,
                    fields.description,
                    amenities,
                    images,
                    now(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_listing_availability(&self, id: &str, available: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE listings SET available = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, available, now()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Favorites, reviews and bookings cascade; conversations keep a null listing.
    pub fn delete_listing(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM listings l WHERE l.id = ?1", LISTING_COLUMNS);
            let row = conn.query_row(&sql, [id], listing_from_row).optional()?;
            Ok(row)
        })
    }

    /// The browse batch: every available listing, newest first.
    pub fn available_listings(&self) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE l.available = 1 ORDER BY l.created_at DESC, l.rowid DESC",
                [],
            )
        })
    }

    pub fn listings_by_owner(&self, owner_id: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE l.owner_id = ?1 ORDER BY l.created_at DESC, l.rowid DESC",
                [owner_id],
            )
        })
    }

    /// Per-listing counters for the owner dashboard, in one pass.
    pub fn listing_stats_for_owner(&self, owner_id: &str) -> Result<Vec<ListingStatsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.id,
                        (SELECT COUNT(*) FROM favorites f WHERE f.listing_id = l.id),
                        (SELECT COUNT(*) FROM conversations c WHERE c.listing_id = l.id),
                        (SELECT COUNT(*) FROM reviews r WHERE r.listing_id = l.id),
                        (SELECT AVG(r.rating) FROM reviews r WHERE r.listing_id = l.id)
                 FROM listings l
                 WHERE l.owner_id = ?1",
            )?;

            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok(ListingStatsRow {
                        listing_id: row.get(0)?,
                        favorites: row.get(1)?,
                        inquiries: row.get(2)?,
                        review_count: row.get(3)?,
                        average_rating: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

pub(crate) fn query_listings<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<ListingRow>> {
    let sql = format!("SELECT {} FROM listings l {}", LISTING_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, listing_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn listing_from_row(row: &Row) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        listing_type: row.get(3)?,
        price_cents: row.get(4)?,
        bedrooms: row.get(5)?,
        bathrooms: row.get(6)?,
        max_occupants: row.get(7)?,
        available_spots: row.get(8)?,
        address: row.get(9)?,
        neighborhood: row.get(10)?,
        city: row.get(11)?,
        state: row.get(12)?,
        description: row.get(13)?,
        amenities: row.get(14)?,
        images: row.get(15)?,
        available: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use fushub_types::models::{Amenity, Role};
    use uuid::Uuid;

    #[test]
    fn hidden_listings_leave_the_browse_batch() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::account(&db, Role::Owner, "Owner");
        let a = fixtures::listing(&db, &owner);
        let b = fixtures::listing(&db, &owner);

        assert!(db.set_listing_availability(&a, false).unwrap());
        let batch: Vec<String> = db.available_listings().unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(batch, vec![b.clone()]);

        // The owner still sees both
        assert_eq!(db.listings_by_owner(&owner).unwrap().len(), 2);
    }

    #[test]
    fn update_rewrites_amenities_json() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::account(&db, Role::Owner, "Owner");
        let id = fixtures::listing(&db, &owner);

        let mut fields = fixtures::fields("Campinas", 99_000, vec![Amenity::Pool, Amenity::Gym]);
        fields.title = "Renamed room".into();
        assert!(db.update_listing(&id, &fields).unwrap());

        let row = db.get_listing(&id).unwrap().unwrap();
        assert_eq!(row.title, "Renamed room");
        assert_eq!(row.price_cents, 99_000);
        assert_eq!(row.amenities, r#"["pool","gym"]"#);
        assert!(!db.update_listing(&Uuid::new_v4().to_string(), &fields).unwrap());
    }

    #[test]
    fn delete_keeps_conversations() {
        let db = Database::open_in_memory().unwrap();
        let thread = fixtures::thread(&db);
        db.toggle_favorite(&thread.tenant, &thread.listing).unwrap();

        assert!(db.delete_listing(&thread.listing).unwrap());
        assert!(db.get_listing(&thread.listing).unwrap().is_none());
        assert!(db.favorite_listing_ids(&thread.tenant).unwrap().is_empty());

        let conv = db.get_conversation(&thread.conversation).unwrap().unwrap();
        assert!(conv.listing_id.is_none());
    }
}
