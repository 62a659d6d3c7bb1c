use anyhow::Result;
use rusqlite::Row;

use fushub_types::models::BookingStatus;

use super::OptionalExt;
use crate::models::BookingRow;
use crate::{Database, now};

const BOOKING_SELECT: &str = "
    SELECT b.id, b.listing_id, b.tenant_id, l.owner_id, b.move_in, b.move_out, b.status,
           b.created_at, b.updated_at
    FROM bookings b
    JOIN listings l ON l.id = b.listing_id";

impl Database {
    // -- Bookings --

    /// New bookings always start out pending.
    pub fn insert_booking(
        &self,
        id: &str,
        listing_id: &str,
        tenant_id: &str,
        move_in: &str,
        move_out: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bookings (id, listing_id, tenant_id, move_in, move_out, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    id,
                    listing_id,
                    tenant_id,
                    move_in,
                    move_out,
                    BookingStatus::Pending.as_str(),
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_booking(&self, id: &str) -> Result<Option<BookingRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE b.id = ?1", BOOKING_SELECT);
            let row = conn.query_row(&sql, [id], booking_from_row).optional()?;
            Ok(row)
        })
    }

    /// Compare-and-set on the status column. Returns `false` if the booking
    /// was no longer in `from`, so concurrent transitions cannot both win.
    pub fn update_booking_status(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE bookings SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
                (id, from.as_str(), to.as_str(), now()),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn bookings_for_tenant(&self, tenant_id: &str) -> Result<Vec<BookingRow>> {
        self.query_bookings("WHERE b.tenant_id = ?1", tenant_id)
    }

    pub fn bookings_for_owner(&self, owner_id: &str) -> Result<Vec<BookingRow>> {
        self.query_bookings("WHERE l.owner_id = ?1", owner_id)
    }

    fn query_bookings(&self, clause: &str, user_id: &str) -> Result<Vec<BookingRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} {} ORDER BY b.created_at DESC, b.rowid DESC",
                BOOKING_SELECT, clause
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], booking_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn booking_from_row(row: &Row) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        tenant_id: row.get(2)?,
        owner_id: row.get(3)?,
        move_in: row.get(4)?,
        move_out: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
