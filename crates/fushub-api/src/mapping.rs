//! Row → API model conversions.
//!
//! Rows come from our own schema, so a value that fails to parse means a
//! corrupt row. It is logged and replaced with a default instead of failing
//! the whole response.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use fushub_db::models::{
    BookingRow, ConversationRow, ConversationSummaryRow, ListingRow, MessageRow, ProfileRow,
    ReviewRow, UnreadMessageRow,
};
use fushub_types::api::{ConversationSummary, Counterpart, ReviewResponse, UnreadNotification};
use fushub_types::models::{
    Amenity, Booking, BookingStatus, Conversation, Listing, ListingType, Message, Profile, Role,
};

/// Shown when a conversation's listing has been deleted.
pub const MISSING_LISTING_TITLE: &str = "Listing no longer available";
/// Shown when a profile row is missing.
pub const UNKNOWN_USER: &str = "Unknown user";

pub fn uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn opt_uuid(value: Option<&str>, what: &str) -> Option<Uuid> {
    value.map(|v| uuid(v, what))
}

pub fn timestamp(value: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", value, e);
        DateTime::default()
    })
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!("Corrupt date '{}': {}", value, e);
        NaiveDate::default()
    })
}

fn tag<T: FromStr>(value: &str, fallback: T) -> T
where
    T::Err: std::fmt::Display,
{
    value.parse().unwrap_or_else(|e| {
        warn!("{}", e);
        fallback
    })
}

/// Image URLs stored as a JSON array.
fn images(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("Corrupt images JSON '{}': {}", json, e);
        Vec::new()
    })
}

/// Amenity tags stored as a JSON array. Unknown tags are dropped individually.
fn amenities(json: &str) -> Vec<Amenity> {
    let tags: Vec<String> = serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("Corrupt amenities JSON '{}': {}", json, e);
        Vec::new()
    });
    tags.iter()
        .filter_map(|t| match t.parse() {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("Dropping stored amenity: {}", e);
                None
            }
        })
        .collect()
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub fn profile(row: ProfileRow) -> Profile {
    Profile {
        id: uuid(&row.id, "profile id"),
        role: tag(&row.role, Role::Tenant),
        full_name: row.full_name,
        avatar_url: row.avatar_url,
        phone: row.phone,
        university: row.university,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn listing(row: ListingRow) -> Listing {
    Listing {
        id: uuid(&row.id, "listing id"),
        owner_id: uuid(&row.owner_id, "listing owner_id"),
        title: row.title,
        listing_type: tag(&row.listing_type, ListingType::Apartment),
        price_cents: row.price_cents,
        bedrooms: count(row.bedrooms),
        bathrooms: count(row.bathrooms),
        max_occupants: count(row.max_occupants),
        available_spots: count(row.available_spots),
        address: row.address,
        neighborhood: row.neighborhood,
        city: row.city,
        state: row.state,
        description: row.description,
        amenities: amenities(&row.amenities),
        images: images(&row.images),
        available: row.available,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn conversation(row: ConversationRow) -> Conversation {
    Conversation {
        id: uuid(&row.id, "conversation id"),
        listing_id: opt_uuid(row.listing_id.as_deref(), "conversation listing_id"),
        tenant_id: uuid(&row.tenant_id, "conversation tenant_id"),
        owner_id: uuid(&row.owner_id, "conversation owner_id"),
        created_at: timestamp(&row.created_at),
        last_activity: timestamp(&row.last_activity),
    }
}

pub fn summary(row: ConversationSummaryRow) -> ConversationSummary {
    let listing_image = row
        .listing_images
        .as_deref()
        .and_then(|json| images(json).into_iter().next());

    ConversationSummary {
        id: uuid(&row.id, "conversation id"),
        listing_id: opt_uuid(row.listing_id.as_deref(), "conversation listing_id"),
        listing_title: row
            .listing_title
            .unwrap_or_else(|| MISSING_LISTING_TITLE.to_string()),
        listing_image,
        counterpart: Counterpart {
            id: uuid(&row.counterpart_id, "counterpart id"),
            full_name: row.counterpart_name.unwrap_or_else(|| UNKNOWN_USER.to_string()),
            avatar_url: row.counterpart_avatar,
        },
        last_message: row.last_message,
        last_message_at: row.last_message_at.as_deref().map(timestamp),
        last_activity: timestamp(&row.last_activity),
        unread_count: count(row.unread_count),
    }
}

pub fn message(row: MessageRow) -> Message {
    Message {
        id: uuid(&row.id, "message id"),
        conversation_id: uuid(&row.conversation_id, "message conversation_id"),
        sender_id: uuid(&row.sender_id, "message sender_id"),
        body: row.body,
        created_at: timestamp(&row.created_at),
        read: row.read,
        read_at: row.read_at.as_deref().map(timestamp),
    }
}

pub fn unread(row: UnreadMessageRow) -> UnreadNotification {
    UnreadNotification {
        message_id: uuid(&row.message_id, "message id"),
        conversation_id: uuid(&row.conversation_id, "message conversation_id"),
        sender_id: uuid(&row.sender_id, "message sender_id"),
        sender_name: row.sender_name.unwrap_or_else(|| UNKNOWN_USER.to_string()),
        sender_avatar: row.sender_avatar,
        listing_title: row
            .listing_title
            .unwrap_or_else(|| MISSING_LISTING_TITLE.to_string()),
        body: row.body,
        created_at: timestamp(&row.created_at),
    }
}

pub fn review(row: ReviewRow) -> ReviewResponse {
    ReviewResponse {
        id: uuid(&row.id, "review id"),
        listing_id: uuid(&row.listing_id, "review listing_id"),
        author_id: uuid(&row.author_id, "review author_id"),
        author_name: row.author_name.unwrap_or_else(|| UNKNOWN_USER.to_string()),
        author_avatar: row.author_avatar,
        rating: u8::try_from(row.rating).unwrap_or(0),
        comment: row.comment,
        created_at: timestamp(&row.created_at),
    }
}

pub fn booking(row: BookingRow) -> Booking {
    Booking {
        id: uuid(&row.id, "booking id"),
        listing_id: uuid(&row.listing_id, "booking listing_id"),
        tenant_id: uuid(&row.tenant_id, "booking tenant_id"),
        move_in: date(&row.move_in),
        move_out: row.move_out.as_deref().map(date),
        status: tag(&row.status, BookingStatus::Pending),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}
