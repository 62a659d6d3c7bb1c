//! Database row types. These map directly to SQLite rows.
//! Distinct from fushub-types API models to keep the DB layer independent.

use fushub_types::models::{Amenity, ListingType};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub role: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub university: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ListingRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub listing_type: String,
    pub price_cents: i64,
    pub bedrooms: i64,
    pub bathrooms: i64,
    pub max_occupants: i64,
    pub available_spots: i64,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub description: String,
    /// JSON array of amenity tags
    pub amenities: String,
    /// JSON array of image URLs
    pub images: String,
    pub available: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Owner-editable listing columns, already validated.
#[derive(Debug, Clone)]
pub struct ListingFields {
    pub title: String,
    pub listing_type: ListingType,
    pub price_cents: i64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub max_occupants: u32,
    pub available_spots: u32,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub description: String,
    pub amenities: Vec<Amenity>,
    pub images: Vec<String>,
}

pub struct ListingStatsRow {
    pub listing_id: String,
    pub favorites: i64,
    pub inquiries: i64,
    pub review_count: i64,
    pub average_rating: Option<f64>,
}

pub struct ConversationRow {
    pub id: String,
    pub listing_id: Option<String>,
    pub tenant_id: String,
    pub owner_id: String,
    pub created_at: String,
    pub last_activity: String,
}

/// One conversation as seen by one participant, with everything the list view needs.
pub struct ConversationSummaryRow {
    pub id: String,
    pub listing_id: Option<String>,
    pub listing_title: Option<String>,
    pub listing_images: Option<String>,
    pub counterpart_id: String,
    pub counterpart_name: Option<String>,
    pub counterpart_avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub last_activity: String,
    pub unread_count: i64,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
    pub read: bool,
    pub read_at: Option<String>,
}

pub struct UnreadMessageRow {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub listing_title: Option<String>,
    pub body: String,
    pub created_at: String,
}

pub struct ReviewRow {
    pub id: String,
    pub listing_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
}

pub struct BookingRow {
    pub id: String,
    pub listing_id: String,
    pub tenant_id: String,
    /// Owner of the booked listing, joined in for permission checks
    pub owner_id: String,
    pub move_in: String,
    pub move_out: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ObjectRow {
    pub bucket: String,
    pub path: String,
    pub uploader_id: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}
