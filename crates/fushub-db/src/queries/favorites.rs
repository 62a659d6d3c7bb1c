use anyhow::Result;

use fushub_types::models::FavoriteState;

use super::OptionalExt;
use super::listings::query_listings;
use crate::models::ListingRow;
use crate::{Database, now};

impl Database {
    // -- Favorites --

    /// Toggle a favorite: removes if it exists, inserts if not.
    pub fn toggle_favorite(&self, user_id: &str, listing_id: &str) -> Result<FavoriteState> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                    [user_id, listing_id],
                    |row| row.get(0),
                )
                .optional()?;

            let state = if existing.is_some() {
                tx.execute(
                    "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                    [user_id, listing_id],
                )?;
                FavoriteState::Removed
            } else {
                tx.execute(
                    "INSERT INTO favorites (user_id, listing_id, created_at) VALUES (?1, ?2, ?3)",
                    (user_id, listing_id, now()),
                )?;
                FavoriteState::Added
            };

            tx.commit()?;
            Ok(state)
        })
    }

    pub fn favorite_listing_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT listing_id FROM favorites WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    /// The user's favorited listings, most recently favorited first.
    pub fn favorite_listings(&self, user_id: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "JOIN favorites f ON f.listing_id = l.id
                 WHERE f.user_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC",
                [user_id],
            )
        })
    }
}
