use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{
    NewProperty, NewSearchHistory, Property, PropertyPatch, SavedListing, SavedProperty,
    SearchHistory, User, UserClaims,
};
use crate::search::page::store_order;
use crate::search::predicate::matches_all;
use crate::search::{PageRequest, Predicate};
use crate::storage::traits::ListingStore;

#[derive(Default)]
struct Tables {
    properties: Vec<Property>,
    users: HashMap<String, User>,
    saved: Vec<SavedProperty>,
    history: Vec<SearchHistory>,
    last_property_id: i64,
    last_saved_id: i64,
    last_history_id: i64,
}

/// Process-local store. Evaluates the compiled predicates directly, so it
/// answers searches exactly like the Postgres store does.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn search_properties(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Property>> {
        let tables = self.tables.read().await;

        let mut matched: Vec<Property> = tables
            .properties
            .iter()
            .filter(|property| matches_all(predicates, property))
            .cloned()
            .collect();
        matched.sort_by(store_order);

        debug!(
            "Matched {} of {} listings in memory",
            matched.len(),
            tables.properties.len()
        );

        Ok(page.window(matched))
    }

    async fn get_property(&self, id: i64) -> Result<Option<Property>> {
        let tables = self.tables.read().await;
        Ok(tables.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn create_property(&self, listing: NewProperty) -> Result<Property> {
        let mut tables = self.tables.write().await;
        tables.last_property_id += 1;

        let now = Utc::now();
        let property = Property {
            id: tables.last_property_id,
            title: listing.title,
            description: listing.description,
            price: listing.price.cents(),
            property_type: listing.property_type,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            square_footage: listing.square_footage,
            address: listing.address,
            city: listing.city,
            state: listing.state,
            zip_code: listing.zip_code,
            latitude: listing.latitude,
            longitude: listing.longitude,
            distance_to_campus: listing.distance_to_campus,
            university: listing.university,
            image_urls: listing.image_urls,
            amenities: listing.amenities,
            utilities: listing.utilities,
            rating: listing.rating,
            review_count: listing.review_count,
            available: listing.available,
            available_date: listing.available_date,
            contact_email: listing.contact_email,
            contact_phone: listing.contact_phone,
            created_at: now,
            updated_at: now,
        };

        tables.properties.push(property.clone());
        Ok(property)
    }

    async fn update_property(&self, id: i64, patch: PropertyPatch) -> Result<Option<Property>> {
        let mut tables = self.tables.write().await;
        let Some(property) = tables.properties.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        patch.apply(property);
        Ok(Some(property.clone()))
    }

    async fn delete_property(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.properties.len();
        tables.properties.retain(|p| p.id != id);
        let removed = tables.properties.len() != before;

        if removed {
            tables.saved.retain(|s| s.property_id != id);
        }
        Ok(removed)
    }

    async fn count_properties(&self) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables.properties.len() as i64)
    }

    async fn upsert_user(&self, claims: &UserClaims) -> Result<User> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let user = tables
            .users
            .entry(claims.sub.clone())
            .and_modify(|user| {
                user.email = claims.email.clone();
                user.first_name = claims.first_name.clone();
                user.last_name = claims.last_name.clone();
                user.profile_image_url = claims.profile_image_url.clone();
                user.updated_at = now;
            })
            .or_insert_with(|| User {
                id: claims.sub.clone(),
                email: claims.email.clone(),
                first_name: claims.first_name.clone(),
                last_name: claims.last_name.clone(),
                profile_image_url: claims.profile_image_url.clone(),
                created_at: now,
                updated_at: now,
            });

        Ok(user.clone())
    }

    async fn saved_properties(&self, user_id: &str) -> Result<Vec<SavedListing>> {
        let tables = self.tables.read().await;

        let mut listings: Vec<SavedListing> = tables
            .saved
            .iter()
            .filter(|saved| saved.user_id == user_id)
            .filter_map(|saved| {
                let property = tables.properties.iter().find(|p| p.id == saved.property_id)?;
                Some(SavedListing {
                    saved: saved.clone(),
                    property: property.clone(),
                })
            })
            .collect();

        listings.sort_by(|a, b| {
            b.saved
                .created_at
                .cmp(&a.saved.created_at)
                .then(b.saved.id.cmp(&a.saved.id))
        });
        Ok(listings)
    }

    async fn is_property_saved(&self, user_id: &str, property_id: i64) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .saved
            .iter()
            .any(|s| s.user_id == user_id && s.property_id == property_id))
    }

    async fn save_property(
        &self,
        user_id: &str,
        property_id: i64,
    ) -> Result<Option<SavedProperty>> {
        // check and insert under one write lock, like the unique constraint does
        let mut tables = self.tables.write().await;
        if tables
            .saved
            .iter()
            .any(|s| s.user_id == user_id && s.property_id == property_id)
        {
            return Ok(None);
        }
        if !tables.properties.iter().any(|p| p.id == property_id) {
            anyhow::bail!("Property {property_id} does not exist");
        }

        tables.last_saved_id += 1;
        let saved = SavedProperty {
            id: tables.last_saved_id,
            user_id: user_id.to_string(),
            property_id,
            created_at: Utc::now(),
        };
        tables.saved.push(saved.clone());
        Ok(Some(saved))
    }

    async fn unsave_property(&self, user_id: &str, property_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.saved.len();
        tables
            .saved
            .retain(|s| !(s.user_id == user_id && s.property_id == property_id));
        Ok(tables.saved.len() != before)
    }

    async fn add_search_history(&self, entry: NewSearchHistory) -> Result<SearchHistory> {
        let mut tables = self.tables.write().await;
        tables.last_history_id += 1;

        let record = SearchHistory {
            id: tables.last_history_id,
            user_id: entry.user_id,
            search_query: entry.search_query,
            filters: entry.filters,
            created_at: Utc::now(),
        };
        tables.history.push(record.clone());
        Ok(record)
    }

    async fn search_history(&self, user_id: &str, limit: i64) -> Result<Vec<SearchHistory>> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        let mut records: Vec<SearchHistory> = tables
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cents, DollarAmount, PropertyType};
    use crate::search::compile;
    use crate::search::filters::PropertyFilters;

    fn new_listing(
        title: &str,
        dollars: i64,
        kind: PropertyType,
        amenities: &[&str],
    ) -> NewProperty {
        NewProperty {
            title: title.to_string(),
            description: None,
            price: DollarAmount::from(Cents::new(dollars * 100).unwrap()),
            property_type: kind,
            bedrooms: Some(1),
            bathrooms: Some(1.0),
            square_footage: None,
            address: "1 Campus Rd".to_string(),
            city: "Ithaca".to_string(),
            state: "NY".to_string(),
            zip_code: "14850".to_string(),
            latitude: None,
            longitude: None,
            distance_to_campus: Some(1.0),
            university: "Cornell University".to_string(),
            image_urls: vec![],
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            utilities: vec![],
            rating: None,
            review_count: 0,
            available: true,
            available_date: None,
            contact_email: None,
            contact_phone: None,
        }
    }

    async fn sample_store() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = [
            ("Dorm single", 650, PropertyType::Dorm, vec!["WiFi Included"]),
            ("Big apartment", 1800, PropertyType::Apartment, vec!["WiFi Included", "Parking"]),
            ("Studio loft", 1100, PropertyType::Studio, vec!["Parking"]),
            ("Shared house room", 700, PropertyType::SharedHouse, vec![]),
            ("Studio basement", 900, PropertyType::Studio, vec!["WiFi Included", "Parking"]),
        ];
        for (title, dollars, kind, amenities) in rows {
            store
                .create_property(new_listing(title, dollars, kind, &amenities))
                .await
                .unwrap();
        }

        let mut hidden = new_listing("Already leased", 500, PropertyType::Apartment, &[]);
        hidden.available = false;
        store.create_property(hidden).await.unwrap();

        store
    }

    async fn search(
        store: &MemoryStore,
        filters: PropertyFilters,
        page: PageRequest,
    ) -> Vec<Property> {
        store
            .search_properties(&compile(&filters), page)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unfiltered_search_returns_available_by_price() {
        let store = sample_store().await;
        let results = search(&store, PropertyFilters::default(), PageRequest::default()).await;

        let prices: Vec<i64> = results.iter().map(|p| p.price.get()).collect();
        assert_eq!(prices, vec![65_000, 70_000, 90_000, 110_000, 180_000]);
        assert!(results.iter().all(|p| p.available));
    }

    #[tokio::test]
    async fn min_price_compares_in_cents() {
        let store = sample_store().await;
        let filters = PropertyFilters {
            min_price: Some(Cents::from_dollars("1000").unwrap()),
            ..Default::default()
        };

        let results = search(&store, filters, PageRequest::default()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|p| p.price.get() >= 100_000));
    }

    #[tokio::test]
    async fn property_types_are_a_membership_test() {
        let store = sample_store().await;
        let filters = PropertyFilters {
            property_types: vec![PropertyType::Studio, PropertyType::Dorm],
            ..Default::default()
        };

        let results = search(&store, filters, PageRequest::default()).await;
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|p| matches!(p.property_type, PropertyType::Studio | PropertyType::Dorm)));
    }

    #[tokio::test]
    async fn amenities_require_all_of_them() {
        let store = sample_store().await;
        let filters = PropertyFilters {
            amenities: vec!["WiFi Included".to_string(), "Parking".to_string()],
            ..Default::default()
        };

        let titles: Vec<String> = search(&store, filters, PageRequest::default())
            .await
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Studio basement", "Big apartment"]);
    }

    #[tokio::test]
    async fn consecutive_pages_are_disjoint_and_cover_a_larger_page() {
        let store = MemoryStore::new();
        for i in 0..50 {
            // several listings share a price so ordering relies on the id tiebreak
            let dollars = 500 + (i % 7) * 100;
            let title = format!("Listing {i}");
            let listing = new_listing(&title, dollars, PropertyType::Apartment, &[]);
            store.create_property(listing).await.unwrap();
        }

        let first = search(&store, PropertyFilters::default(), PageRequest::new(20, 0)).await;
        let second = search(&store, PropertyFilters::default(), PageRequest::new(20, 20)).await;
        let both = search(&store, PropertyFilters::default(), PageRequest::new(40, 0)).await;

        let first_ids: Vec<i64> = first.iter().map(|p| p.id).collect();
        assert!(second.iter().all(|p| !first_ids.contains(&p.id)));

        let mut union: Vec<Property> = first.into_iter().chain(second).collect();
        union.sort_by(store_order);
        let union_ids: Vec<i64> = union.iter().map(|p| p.id).collect();
        let both_ids: Vec<i64> = both.iter().map(|p| p.id).collect();
        assert_eq!(union_ids, both_ids);
    }

    #[tokio::test]
    async fn saving_is_idempotent_and_unsave_reports_removal() {
        let store = sample_store().await;

        let first = store.save_property("user-1", 2).await.unwrap();
        assert!(first.is_some());
        assert!(store.save_property("user-1", 2).await.unwrap().is_none());
        assert!(store.is_property_saved("user-1", 2).await.unwrap());
        assert!(!store.is_property_saved("user-2", 2).await.unwrap());

        assert!(store.unsave_property("user-1", 2).await.unwrap());
        assert!(!store.unsave_property("user-1", 2).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_property_drops_its_saves() {
        let store = sample_store().await;
        store.save_property("user-1", 3).await.unwrap();

        assert!(store.delete_property(3).await.unwrap());
        assert!(store.saved_properties("user-1").await.unwrap().is_empty());
        assert!(!store.delete_property(3).await.unwrap());
    }

    #[tokio::test]
    async fn search_history_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for query in ["studio", "dorm", "parking"] {
            store
                .add_search_history(NewSearchHistory {
                    user_id: "user-1".to_string(),
                    search_query: Some(query.to_string()),
                    filters: None,
                })
                .await
                .unwrap();
        }

        let history = store.search_history("user-1", 2).await.unwrap();
        let queries: Vec<_> = history.iter().filter_map(|h| h.search_query.clone()).collect();
        assert_eq!(queries, vec!["parking", "dorm"]);
        assert!(store.search_history("user-2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_user_refreshes_claims() {
        let store = MemoryStore::new();
        let mut claims = UserClaims {
            sub: "abc".to_string(),
            email: Some("old@example.edu".to_string()),
            first_name: None,
            last_name: None,
            profile_image_url: None,
        };
        let first = store.upsert_user(&claims).await.unwrap();

        claims.email = Some("new@example.edu".to_string());
        let user = store.upsert_user(&claims).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("new@example.edu"));
        assert_eq!(user.created_at, first.created_at);
        assert_eq!(store.tables.read().await.users.len(), 1);
    }
}
