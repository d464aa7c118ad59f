use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

pub mod money;

pub use money::{Cents, DisplayPrice, DollarAmount};

/// Kind of housing a listing offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    Studio,
    SharedHouse,
    Dorm,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        PropertyType::Apartment,
        PropertyType::Studio,
        PropertyType::SharedHouse,
        PropertyType::Dorm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::Studio => "studio",
            PropertyType::SharedHouse => "shared_house",
            PropertyType::Dorm => "dorm",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown property type: {0}")]
pub struct UnknownPropertyType(pub String);

impl FromStr for PropertyType {
    type Err = UnknownPropertyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownPropertyType(s.to_string()))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rental listing as stored. `price` is in cents; see [`money`] for how it
/// reaches clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Cents,
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
    /// Miles
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

fn default_true() -> bool {
    true
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Field messages from a failed validation, sorted so the text is stable
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages
}

/// Listing as submitted by a client or a seed file. Price is in dollars.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: DollarAmount,
    pub property_type: PropertyType,
    #[serde(default)]
    #[validate(range(min = 0, message = "bedrooms must not be negative"))]
    pub bedrooms: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "bathrooms must not be negative"))]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0, message = "squareFootage must not be negative"))]
    pub square_footage: Option<i32>,
    #[validate(custom(function = "not_blank", message = "address is required"))]
    pub address: String,
    #[validate(custom(function = "not_blank", message = "city is required"))]
    pub city: String,
    #[validate(custom(function = "not_blank", message = "state is required"))]
    pub state: String,
    #[validate(custom(function = "not_blank", message = "zipCode is required"))]
    pub zip_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "distanceToCampus must not be negative"))]
    pub distance_to_campus: Option<f64>,
    #[validate(custom(function = "not_blank", message = "university is required"))]
    pub university: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub utilities: Vec<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0, message = "reviewCount must not be negative"))]
    pub review_count: i32,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub available_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

/// Partial listing update. Absent fields keep their stored value; present
/// ones obey the same rules as [`NewProperty`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<DollarAmount>,
    pub property_type: Option<PropertyType>,
    #[validate(range(min = 0, message = "bedrooms must not be negative"))]
    pub bedrooms: Option<i32>,
    #[validate(range(min = 0.0, message = "bathrooms must not be negative"))]
    pub bathrooms: Option<f64>,
    #[validate(range(min = 0, message = "squareFootage must not be negative"))]
    pub square_footage: Option<i32>,
    #[validate(custom(function = "not_blank", message = "address is required"))]
    pub address: Option<String>,
    #[validate(custom(function = "not_blank", message = "city is required"))]
    pub city: Option<String>,
    #[validate(custom(function = "not_blank", message = "state is required"))]
    pub state: Option<String>,
    #[validate(custom(function = "not_blank", message = "zipCode is required"))]
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(range(min = 0.0, message = "distanceToCampus must not be negative"))]
    pub distance_to_campus: Option<f64>,
    #[validate(custom(function = "not_blank", message = "university is required"))]
    pub university: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub utilities: Option<Vec<String>>,
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: Option<f64>,
    #[validate(range(min = 0, message = "reviewCount must not be negative"))]
    pub review_count: Option<i32>,
    pub available: Option<bool>,
    pub available_date: Option<DateTime<Utc>>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl PropertyPatch {
    pub fn apply(self, property: &mut Property) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut property.title, self.title);
        set_opt(&mut property.description, self.description);
        set(&mut property.price, self.price.map(DollarAmount::cents));
        set(&mut property.property_type, self.property_type);
        set_opt(&mut property.bedrooms, self.bedrooms);
        set_opt(&mut property.bathrooms, self.bathrooms);
        set_opt(&mut property.square_footage, self.square_footage);
        set(&mut property.address, self.address);
        set(&mut property.city, self.city);
        set(&mut property.state, self.state);
        set(&mut property.zip_code, self.zip_code);
        set_opt(&mut property.latitude, self.latitude);
        set_opt(&mut property.longitude, self.longitude);
        set_opt(&mut property.distance_to_campus, self.distance_to_campus);
        set(&mut property.university, self.university);
        set(&mut property.image_urls, self.image_urls);
        set(&mut property.amenities, self.amenities);
        set(&mut property.utilities, self.utilities);
        set_opt(&mut property.rating, self.rating);
        set(&mut property.review_count, self.review_count);
        set(&mut property.available, self.available);
        set_opt(&mut property.available_date, self.available_date);
        set_opt(&mut property.contact_email, self.contact_email);
        set_opt(&mut property.contact_phone, self.contact_phone);
        property.updated_at = Utc::now();
    }
}

/// A user's favorite
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedProperty {
    pub id: i64,
    pub user_id: String,
    pub property_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A saved row together with the listing it points at
#[derive(Debug, Clone)]
pub struct SavedListing {
    pub saved: SavedProperty,
    pub property: Property,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistory {
    pub id: i64,
    pub user_id: String,
    pub search_query: Option<String>,
    /// Opaque to the server; whatever filter state the client chose to record.
    pub filters: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSearchHistory {
    pub user_id: String,
    pub search_query: Option<String>,
    pub filters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity claims handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_round_trips_through_wire_names() {
        for kind in PropertyType::ALL {
            assert_eq!(kind.as_str().parse::<PropertyType>(), Ok(kind));
        }
        assert_eq!(
            serde_json::to_string(&PropertyType::SharedHouse).unwrap(),
            "\"shared_house\""
        );
        assert!("castle".parse::<PropertyType>().is_err());
    }

    #[test]
    fn new_property_defaults_and_dollar_price() {
        let listing: NewProperty = serde_json::from_value(serde_json::json!({
            "title": "Studio on College Ave",
            "price": 850,
            "propertyType": "studio",
            "address": "12 College Ave",
            "city": "Ithaca",
            "state": "NY",
            "zipCode": "14850",
            "university": "Cornell University"
        }))
        .unwrap();

        assert_eq!(listing.price.cents().get(), 85_000);
        assert!(listing.available);
        assert_eq!(listing.review_count, 0);
        assert!(listing.amenities.is_empty());
        assert!(listing.validate().is_ok());
    }

    #[test]
    fn new_property_rejects_blank_title() {
        let listing: NewProperty = serde_json::from_value(serde_json::json!({
            "title": "  ",
            "price": "850",
            "propertyType": "dorm",
            "address": "1 Campus Rd",
            "city": "Ithaca",
            "state": "NY",
            "zipCode": "14850",
            "university": "Cornell University"
        }))
        .unwrap();

        let errors = listing.validate().unwrap_err();
        assert_eq!(validation_messages(&errors), vec!["title is required"]);
    }

    #[test]
    fn patch_obeys_the_same_rules_as_create() {
        let patch: PropertyPatch = serde_json::from_value(serde_json::json!({
            "bedrooms": -3,
            "reviewCount": -7
        }))
        .unwrap();

        let errors = patch.validate().unwrap_err();
        assert_eq!(
            validation_messages(&errors),
            vec!["bedrooms must not be negative", "reviewCount must not be negative"]
        );

        let patch: PropertyPatch = serde_json::from_value(serde_json::json!({
            "bedrooms": 0,
            "city": "Ithaca"
        }))
        .unwrap();
        assert!(patch.validate().is_ok());

        let patch: PropertyPatch =
            serde_json::from_value(serde_json::json!({ "city": " " })).unwrap();
        assert!(patch.validate().is_err());
    }
}
