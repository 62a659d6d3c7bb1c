use anyhow::Result;

use fushub_types::models::BookingStatus;

use super::OptionalExt;
use crate::models::ReviewRow;
use crate::{Database, now};

impl Database {
    // -- Reviews --

    /// Reviews for a listing with author name and avatar, newest first.
    pub fn reviews_for_listing(&self, listing_id: &str) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.listing_id, r.author_id, p.full_name, p.avatar_url, r.rating, r.comment, r.created_at
                 FROM reviews r
                 LEFT JOIN profiles p ON p.id = r.author_id
                 WHERE r.listing_id = ?1
                 ORDER BY r.created_at DESC, r.rowid DESC",
            )?;

            let rows = stmt
                .query_map([listing_id], |row| {
                    Ok(ReviewRow {
                        id: row.get(0)?,
                        listing_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_name: row.get(3)?,
                        author_avatar: row.get(4)?,
                        rating: row.get(5)?,
                        comment: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn has_completed_booking(&self, listing_id: &str, tenant_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM bookings
                     WHERE listing_id = ?1 AND tenant_id = ?2 AND status = ?3
                     LIMIT 1",
                    [listing_id, tenant_id, BookingStatus::Completed.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn has_reviewed(&self, listing_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM reviews WHERE listing_id = ?1 AND author_id = ?2",
                    [listing_id, author_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Fails with a constraint violation if the author already reviewed the listing.
    pub fn insert_review(
        &self,
        id: &str,
        listing_id: &str,
        author_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<String> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO reviews (id, listing_id, author_id, rating, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, listing_id, author_id, rating, comment, ts],
            )?;
            Ok(ts)
        })
    }
}
