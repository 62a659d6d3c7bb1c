use std::str::FromStr;

use serde::Deserialize;

use fushub_types::models::{Amenity, Listing, ListingType, QuickFilter};

use crate::error::{ApiError, ApiResult};

/// Browse query string. List-valued parameters are comma separated.
/// Prices are in cents, like `Listing::price_cents`.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub location: Option<String>,
    pub types: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub amenities: Option<String>,
    pub quick: Option<String>,
}

/// A conjunction of predicates over listings. The default filter matches everything.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingFilter {
    /// Lower-cased location needle
    pub location: Option<String>,
    pub types: Vec<ListingType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub amenities: Vec<Amenity>,
    pub quick: Vec<QuickFilter>,
}

impl TryFrom<BrowseQuery> for ListingFilter {
    type Error = ApiError;

    fn try_from(q: BrowseQuery) -> ApiResult<Self> {
        if let (Some(min), Some(max)) = (q.min_price, q.max_price) {
            if min > max {
                return Err(ApiError::validation("min_price is greater than max_price"));
            }
        }

        Ok(Self {
            location: q
                .location
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
            types: parse_list(q.types.as_deref())?,
            min_price: q.min_price,
            max_price: q.max_price,
            amenities: parse_list(q.amenities.as_deref())?,
            quick: parse_list(q.quick.as_deref())?,
        })
    }
}

fn parse_list<T>(raw: Option<&str>) -> ApiResult<Vec<T>>
where
    T: FromStr + PartialEq,
    ApiError: From<T::Err>,
{
    let mut out = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let value = part.parse::<T>()?;
        if !out.contains(&value) {
            out.push(value);
        }
    }
    Ok(out)
}

impl ListingFilter {
    /// Explicit amenities plus those implied by quick filters.
    pub fn required_amenities(&self) -> Vec<Amenity> {
        let mut all = self.amenities.clone();
        for amenity in self.quick.iter().flat_map(|q| q.amenities()) {
            if !all.contains(amenity) {
                all.push(*amenity);
            }
        }
        all
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(needle) = &self.location {
            let hit = [
                &listing.address,
                &listing.neighborhood,
                &listing.city,
                &listing.state,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(needle.as_str()));
            if !hit {
                return false;
            }
        }

        if !self.types.is_empty() && !self.types.contains(&listing.listing_type) {
            return false;
        }

        if self.min_price.is_some_and(|min| listing.price_cents < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price_cents > max) {
            return false;
        }

        self.required_amenities()
            .into_iter()
            .all(|a| listing.has_amenity(a))
    }

    /// Keeps the batch order.
    pub fn apply(&self, batch: Vec<Listing>) -> Vec<Listing> {
        batch.into_iter().filter(|l| self.matches(l)).collect()
    }
}
