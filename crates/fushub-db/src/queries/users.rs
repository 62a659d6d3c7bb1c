use anyhow::Result;
use rusqlite::{Connection, Row};

use fushub_types::models::Role;

use super::OptionalExt;
use crate::models::{ProfileRow, UserRow};
use crate::{Database, now};

impl Database {
    // -- Users --

    /// Creates the auth record, its profile and a first session in one transaction.
    /// Returns `false` without writing anything if the email is already registered.
    pub fn create_account(
        &self,
        user_id: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        full_name: &str,
        session_id: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let taken: Option<String> = tx
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
                .optional()?;
            if taken.is_some() {
                return Ok(false);
            }

            let ts = now();
            tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (user_id, email, password_hash, &ts),
            )?;
            tx.execute(
                "INSERT INTO profiles (id, role, full_name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                (user_id, role.as_str(), full_name, &ts),
            )?;
            tx.execute(
                "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (session_id, user_id, &ts),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Sessions --

    pub fn create_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (session_id, user_id, now()),
            )?;
            Ok(())
        })
    }

    pub fn session_is_active(&self, session_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sessions WHERE id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
                    [session_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns `false` if the session was unknown or already revoked.
    pub fn revoke_session(&self, session_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sessions SET revoked_at = ?2 WHERE id = ?1 AND revoked_at IS NULL",
                (session_id, now()),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, role, full_name, avatar_url, phone, university, created_at, updated_at
                     FROM profiles WHERE id = ?1",
                    [id],
                    profile_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_profile(
        &self,
        id: &str,
        full_name: &str,
        phone: Option<&str>,
        university: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles
                 SET full_name = ?2, phone = ?3, university = ?4, avatar_url = ?5, updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![id, full_name, phone, university, avatar_url, now()],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, email, password, created_at FROM users WHERE {} = ?1", column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn profile_from_row(row: &Row) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        role: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        phone: row.get(4)?,
        university: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
