use anyhow::Result;

use fushub_types::models::Role;

use crate::Database;

impl Database {
    // -- Platform stats --

    pub fn count_profiles_with_role(&self, role: Role) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE role = ?1",
                [role.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn count_available_listings(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM listings WHERE available = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Distinct cities among available listings, ignoring case.
    pub fn count_distinct_cities(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(DISTINCT lower(city)) FROM listings WHERE available = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
