use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DisplayPrice, Property, PropertyType, SavedListing, SavedProperty};

/// A listing as clients see it. The only place a stored price is turned
/// back into dollars.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: DisplayPrice,
    pub property_type: PropertyType,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub square_footage: Option<i32>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_to_campus: Option<f64>,
    pub university: String,
    pub image_urls: Vec<String>,
    pub amenities: Vec<String>,
    pub utilities: Vec<String>,
    pub rating: Option<f64>,
    pub review_count: i32,
    pub available: bool,
    pub available_date: Option<DateTime<Utc>>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Property> for PropertyResponse {
    fn from(p: Property) -> Self {
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
            price: p.price.display(),
            property_type: p.property_type,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            square_footage: p.square_footage,
            address: p.address,
            city: p.city,
            state: p.state,
            zip_code: p.zip_code,
            latitude: p.latitude,
            longitude: p.longitude,
            distance_to_campus: p.distance_to_campus,
            university: p.university,
            image_urls: p.image_urls,
            amenities: p.amenities,
            utilities: p.utilities,
            rating: p.rating,
            review_count: p.review_count,
            available: p.available,
            available_date: p.available_date,
            contact_email: p.contact_email,
            contact_phone: p.contact_phone,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedListingResponse {
    #[serde(flatten)]
    pub saved: SavedProperty,
    pub property: PropertyResponse,
}

impl From<SavedListing> for SavedListingResponse {
    fn from(listing: SavedListing) -> Self {
        Self {
            saved: listing.saved,
            property: listing.property.into(),
        }
    }
}
