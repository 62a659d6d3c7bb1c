use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error for a tag string that does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownTag {}

/// Declares a unit enum stored as a snake_case tag in SQLite and JSON.
macro_rules! tag_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $tag)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(UnknownTag { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

tag_enum!(
    /// Which side of the marketplace a profile is on.
    Role, "role" {
        Tenant => "tenant",
        Owner => "owner",
    }
);

tag_enum!(
    ListingType, "listing type" {
        House => "house",
        Apartment => "apartment",
        Kitnet => "kitnet",
        Commercial => "commercial",
    }
);

tag_enum!(
    Amenity, "amenity" {
        Wifi => "wifi",
        Furnished => "furnished",
        AirConditioning => "air_conditioning",
        PetsAllowed => "pets_allowed",
        Pool => "pool",
        Security => "security",
        Gym => "gym",
        Parking => "parking",
        Elevator => "elevator",
        Grill => "grill",
        Kitchen => "kitchen",
        Laundry => "laundry",
    }
);

tag_enum!(
    /// Named search shortcuts. Each one stands for a set of amenities.
    QuickFilter, "quick filter" {
        PetFriendly => "pet_friendly",
        Furnished => "furnished",
        InternetIncluded => "internet_included",
        Parking => "parking",
    }
);

impl QuickFilter {
    pub fn amenities(&self) -> &'static [Amenity] {
        match self {
            QuickFilter::PetFriendly => &[Amenity::PetsAllowed],
            QuickFilter::Furnished => &[Amenity::Furnished],
            QuickFilter::InternetIncluded => &[Amenity::Wifi],
            QuickFilter::Parking => &[Amenity::Parking],
        }
    }
}

tag_enum!(
    BookingStatus, "booking status" {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

impl BookingStatus {
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

tag_enum!(
    /// Storage namespaces for uploaded objects.
    Bucket, "bucket" {
        ListingImages => "listing-images",
        Avatars => "avatars",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub university: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A property offered by an owner. Prices are monthly, in cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
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
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn has_amenity(&self, amenity: Amenity) -> bool {
        self.amenities.contains(&amenity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// `None` once the listing has been deleted.
    pub listing_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.tenant_id == user_id || self.owner_id == user_id
    }

    /// The other participant, or `None` if `user_id` is not in this conversation.
    pub fn counterpart_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.tenant_id {
            Some(self.owner_id)
        } else if user_id == self.owner_id {
            Some(self.tenant_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteState {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub author_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub tenant_id: Uuid,
    pub move_in: NaiveDate,
    pub move_out: Option<NaiveDate>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
