use anyhow::Result;

use super::OptionalExt;
use crate::models::ObjectRow;
use crate::{Database, now};

impl Database {
    // -- Stored objects --

    pub fn insert_object(
        &self,
        bucket: &str,
        path: &str,
        uploader_id: &str,
        content_type: &str,
        size: i64,
        sha256: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO objects (bucket, path, uploader_id, content_type, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![bucket, path, uploader_id, content_type, size, sha256, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_object(&self, bucket: &str, path: &str) -> Result<Option<ObjectRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT bucket, path, uploader_id, content_type, size, sha256, created_at
                     FROM objects WHERE bucket = ?1 AND path = ?2",
                    [bucket, path],
                    |row| {
                        Ok(ObjectRow {
                            bucket: row.get(0)?,
                            path: row.get(1)?,
                            uploader_id: row.get(2)?,
                            content_type: row.get(3)?,
                            size: row.get(4)?,
                            sha256: row.get(5)?,
                            created_at: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_object(&self, bucket: &str, path: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM objects WHERE bucket = ?1 AND path = ?2",
                [bucket, path],
            )?;
            Ok(changed > 0)
        })
    }
}
