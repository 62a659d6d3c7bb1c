use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Amenity, Booking, BookingStatus, Bucket, FavoriteState, Listing, ListingType, Message, Profile,
    Role,
};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the realtime upgrade.
/// `sid` names the session row that must still be active for the token to count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    #[validate(email(message = "invalid email address"), length(max = 254))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub profile: Profile,
}

// -- Profiles --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    #[validate(url(message = "avatar URL is not a valid URL"))]
    pub avatar_url: Option<String>,
}

// -- Listings --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
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
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    pub images: Vec<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub listing_type: Option<ListingType>,
    pub price_cents: Option<i64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub max_occupants: Option<u32>,
    pub available_spots: Option<u32>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub description: Option<String>,
    pub amenities: Option<Vec<Amenity>>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

// -- Favorites --

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleFavoriteResponse {
    pub listing_id: Uuid,
    pub state: FavoriteState,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartConversationRequest {
    pub listing_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterpart {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// One row of the conversation list, as seen by one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub listing_id: Option<Uuid>,
    pub listing_title: String,
    pub listing_image: Option<String>,
    pub counterpart: Counterpart,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub unread_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total_unread: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub summary: ConversationSummary,
    pub messages: Vec<Message>,
    /// How many messages this open flipped to read.
    pub marked_read: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub conversation_id: Uuid,
    pub marked_read: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadNotification {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub listing_title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub total: u32,
    pub recent: Vec<UnreadNotification>,
}

// -- Reviews --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewResponse>,
    pub average_rating: Option<f64>,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewEligibility {
    pub can_review: bool,
}

// -- Bookings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingRequest {
    pub move_in: NaiveDate,
    #[serde(default)]
    pub move_out: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyBookingsResponse {
    pub as_tenant: Vec<Booking>,
    pub as_owner: Vec<Booking>,
}

// -- Storage --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub bucket: Bucket,
    pub path: String,
    pub public_url: String,
    pub size: u64,
    pub sha256: String,
}

// -- Stats & dashboard --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub students: u64,
    pub properties: u64,
    pub cities: u64,
    pub students_label: String,
    pub properties_label: String,
    pub cities_label: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListingPerformance {
    pub listing: Listing,
    pub favorites: u32,
    pub inquiries: u32,
    pub review_count: u32,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerDashboard {
    pub listings: Vec<ListingPerformance>,
    pub active_listings: u32,
    pub total_unread: u32,
}
