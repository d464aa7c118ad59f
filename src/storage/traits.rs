use crate::models::{
    NewProperty, NewSearchHistory, Property, PropertyPatch, SavedListing, SavedProperty,
    SearchHistory, User, UserClaims,
};
use crate::search::{PageRequest, Predicate};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence for listings, favorites and search history.
/// Implemented by the Postgres store and the in-memory store.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Rows matching every predicate, ordered by price then id, windowed by `page`
    async fn search_properties(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Property>>;

    async fn get_property(&self, id: i64) -> Result<Option<Property>>;

    async fn create_property(&self, listing: NewProperty) -> Result<Property>;

    async fn update_property(&self, id: i64, patch: PropertyPatch) -> Result<Option<Property>>;

    /// Returns whether a row was removed. Saved rows pointing at it go too.
    async fn delete_property(&self, id: i64) -> Result<bool>;

    async fn count_properties(&self) -> Result<i64>;

    async fn upsert_user(&self, claims: &UserClaims) -> Result<User>;

    /// Newest first
    async fn saved_properties(&self, user_id: &str) -> Result<Vec<SavedListing>>;

    async fn is_property_saved(&self, user_id: &str, property_id: i64) -> Result<bool>;

    /// `None` when the pair is already saved
    async fn save_property(&self, user_id: &str, property_id: i64)
        -> Result<Option<SavedProperty>>;

    /// Returns whether a row was removed
    async fn unsave_property(&self, user_id: &str, property_id: i64) -> Result<bool>;

    async fn add_search_history(&self, entry: NewSearchHistory) -> Result<SearchHistory>;

    /// Newest first
    async fn search_history(&self, user_id: &str, limit: i64) -> Result<Vec<SearchHistory>>;

    fn backend_name(&self) -> &'static str;
}
