use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            revoked_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            role        TEXT NOT NULL CHECK (role IN ('tenant', 'owner')),
            full_name   TEXT NOT NULL,
            avatar_url  TEXT,
            phone       TEXT,
            university  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listings (
            id              TEXT PRIMARY KEY,
            owner_id        TEXT NOT NULL REFERENCES users(id),
            title           TEXT NOT NULL,
            listing_type    TEXT NOT NULL,
            price_cents     INTEGER NOT NULL,
            bedrooms        INTEGER NOT NULL,
            bathrooms       INTEGER NOT NULL,
            max_occupants   INTEGER NOT NULL,
            available_spots INTEGER NOT NULL,
            address         TEXT NOT NULL,
            neighborhood    TEXT NOT NULL,
            city            TEXT NOT NULL,
            state           TEXT NOT NULL,
            description     TEXT NOT NULL,
            amenities       TEXT NOT NULL DEFAULT '[]',
            images          TEXT NOT NULL DEFAULT '[]',
            available       INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_listings_available
            ON listings(available, created_at);

        CREATE INDEX IF NOT EXISTS idx_listings_owner
            ON listings(owner_id);

        CREATE TABLE IF NOT EXISTS favorites (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, listing_id)
        );

        -- One conversation per (listing, tenant). Conversations outlive their listing.
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            listing_id      TEXT REFERENCES listings(id) ON DELETE SET NULL,
            tenant_id       TEXT NOT NULL REFERENCES users(id),
            owner_id        TEXT NOT NULL REFERENCES users(id),
            created_at      TEXT NOT NULL,
            last_activity   TEXT NOT NULL,
            UNIQUE (listing_id, tenant_id)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_tenant
            ON conversations(tenant_id, last_activity);

        CREATE INDEX IF NOT EXISTS idx_conversations_owner
            ON conversations(owner_id, last_activity);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            body            TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            read            INTEGER NOT NULL DEFAULT 0,
            read_at         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(conversation_id, read, sender_id);

        CREATE TABLE IF NOT EXISTS reviews (
            id          TEXT PRIMARY KEY,
            listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES users(id),
            rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment     TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            UNIQUE (listing_id, author_id)
        );

        CREATE TABLE IF NOT EXISTS bookings (
            id          TEXT PRIMARY KEY,
            listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            tenant_id   TEXT NOT NULL REFERENCES users(id),
            move_in     TEXT NOT NULL,
            move_out    TEXT,
            status      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_bookings_tenant
            ON bookings(tenant_id, listing_id, status);

        CREATE TABLE IF NOT EXISTS objects (
            bucket          TEXT NOT NULL,
            path            TEXT NOT NULL,
            uploader_id     TEXT NOT NULL REFERENCES users(id),
            content_type    TEXT NOT NULL,
            size            INTEGER NOT NULL,
            sha256          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            PRIMARY KEY (bucket, path)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
