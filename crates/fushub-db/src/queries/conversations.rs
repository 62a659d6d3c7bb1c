use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{ConversationRow, ConversationSummaryRow, MessageRow, UnreadMessageRow};
use crate::{Database, now};

/// Conversation list for one participant (`?1`) in a single round trip:
/// counterpart profile, listing, last message and unread count per row.
const SUMMARY_SQL: &str = "
    SELECT c.id, c.listing_id, l.title, l.images,
           CASE WHEN c.tenant_id = ?1 THEN c.owner_id ELSE c.tenant_id END,
           p.full_name, p.avatar_url,
           lm.body, lm.created_at,
           c.last_activity,
           (SELECT COUNT(*) FROM messages u
             WHERE u.conversation_id = c.id AND u.read = 0 AND u.sender_id != ?1)
    FROM conversations c
    LEFT JOIN listings l ON l.id = c.listing_id
    LEFT JOIN profiles p
           ON p.id = CASE WHEN c.tenant_id = ?1 THEN c.owner_id ELSE c.tenant_id END
    LEFT JOIN messages lm ON lm.rowid = (
        SELECT m.rowid FROM messages m
        WHERE m.conversation_id = c.id
        ORDER BY m.created_at DESC, m.rowid DESC
        LIMIT 1
    )
    WHERE (c.tenant_id = ?1 OR c.owner_id = ?1)";

const UNREAD_FOR_USER: &str = "
    FROM messages m
    JOIN conversations c ON c.id = m.conversation_id
    WHERE (c.tenant_id = ?1 OR c.owner_id = ?1)
      AND m.read = 0
      AND m.sender_id != ?1";

impl Database {
    // -- Conversations --

    /// Returns the conversation for (listing, tenant), creating it if needed.
    /// The flag is `true` when this call created it. A first message, when
    /// given as `(message_id, body)`, is written in the same transaction.
    pub fn get_or_create_conversation(
        &self,
        id: &str,
        listing_id: &str,
        tenant_id: &str,
        owner_id: &str,
        first_message: Option<(&str, &str)>,
    ) -> Result<(ConversationRow, bool, Option<MessageRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let created = tx.execute(
                "INSERT OR IGNORE INTO conversations (id, listing_id, tenant_id, owner_id, created_at, last_activity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (id, listing_id, tenant_id, owner_id, now()),
            )? > 0;

            let mut conversation = tx.query_row(
                "SELECT id, listing_id, tenant_id, owner_id, created_at, last_activity
                 FROM conversations WHERE listing_id = ?1 AND tenant_id = ?2",
                [listing_id, tenant_id],
                conversation_from_row,
            )?;

            let message = match first_message {
                Some((message_id, body)) => {
                    let msg = insert_message(&tx, message_id, &conversation.id, tenant_id, body)?;
                    conversation.last_activity = msg.created_at.clone();
                    Some(msg)
                }
                None => None,
            };

            tx.commit()?;
            Ok((conversation, created, message))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, listing_id, tenant_id, owner_id, created_at, last_activity
                     FROM conversations WHERE id = ?1",
                    [id],
                    conversation_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every conversation the user takes part in, most recent activity first.
    pub fn conversation_summaries(&self, user_id: &str) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY c.last_activity DESC, c.rowid DESC", SUMMARY_SQL);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A single row of [`Database::conversation_summaries`], used to patch one entry.
    pub fn conversation_summary(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} AND c.id = ?2", SUMMARY_SQL);
            let row = conn
                .query_row(&sql, [user_id, conversation_id], summary_from_row)
                .optional()?;
            Ok(row)
        })
    }

    // -- Messages --

    /// Inserts the message and bumps the conversation's `last_activity`
    /// atomically: either both writes land or neither does.
    pub fn send_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let message = insert_message(&tx, id, conversation_id, sender_id, body)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Full history, oldest first.
    pub fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, body, created_at, read, read_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flips every unread message not sent by `reader_id` to read.
    /// Returns how many rows changed; a repeat call returns 0.
    pub fn mark_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1, read_at = ?3
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND read = 0",
                (conversation_id, reader_id, now()),
            )?;
            Ok(changed)
        })
    }

    pub fn total_unread(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) {}", UNREAD_FOR_USER);
            let total = conn.query_row(&sql, [user_id], |row| row.get(0))?;
            Ok(total)
        })
    }

    /// Total unread count plus the `limit` newest unread messages with sender and listing.
    pub fn unread_notifications(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<(i64, Vec<UnreadMessageRow>)> {
        self.with_conn(|conn| {
            let count_sql = format!("SELECT COUNT(*) {}", UNREAD_FOR_USER);
            let total: i64 = conn.query_row(&count_sql, [user_id], |row| row.get(0))?;

            let sql = format!(
                "SELECT m.id, m.conversation_id, m.sender_id, p.full_name, p.avatar_url, l.title, m.body, m.created_at
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 LEFT JOIN profiles p ON p.id = m.sender_id
                 LEFT JOIN listings l ON l.id = c.listing_id
                 WHERE (c.tenant_id = ?1 OR c.owner_id = ?1)
                   AND m.read = 0
                   AND m.sender_id != ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT {}",
                limit
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UnreadMessageRow {
                        message_id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_name: row.get(3)?,
                        sender_avatar: row.get(4)?,
                        listing_title: row.get(5)?,
                        body: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((total, rows))
        })
    }
}

fn insert_message(
    conn: &Connection,
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    body: &str,
) -> Result<MessageRow> {
    let created_at = now();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (id, conversation_id, sender_id, body, &created_at),
    )?;
    conn.execute(
        "UPDATE conversations SET last_activity = ?2 WHERE id = ?1",
        (conversation_id, &created_at),
    )?;

    Ok(MessageRow {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        body: body.to_string(),
        created_at,
        read: false,
        read_at: None,
    })
}

fn conversation_from_row(row: &Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        tenant_id: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
        last_activity: row.get(5)?,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<ConversationSummaryRow> {
    Ok(ConversationSummaryRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        listing_title: row.get(2)?,
        listing_images: row.get(3)?,
        counterpart_id: row.get(4)?,
        counterpart_name: row.get(5)?,
        counterpart_avatar: row.get(6)?,
        last_message: row.get(7)?,
        last_message_at: row.get(8)?,
        last_activity: row.get(9)?,
        unread_count: row.get(10)?,
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        read: row.get(5)?,
        read_at: row.get(6)?,
    })
}
