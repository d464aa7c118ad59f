use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use crate::models::{
    Cents, NewProperty, NewSearchHistory, Property, PropertyPatch, PropertyType, SavedListing,
    SavedProperty, SearchHistory, User, UserClaims,
};
use crate::search::predicate::push_where;
use crate::search::{PageRequest, Predicate};
use crate::storage::traits::ListingStore;

const PROPERTY_COLUMNS: &str = "p.id, p.title, p.description, p.price, p.property_type, \
    p.bedrooms, p.bathrooms, p.square_footage, p.address, p.city, p.state, p.zip_code, \
    p.latitude, p.longitude, p.distance_to_campus, p.university, p.image_urls, p.amenities, \
    p.utilities, p.rating, p.review_count, p.available, p.available_date, p.contact_email, \
    p.contact_phone, p.created_at, p.updated_at";

fn decode_err(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

impl<'r> FromRow<'r, PgRow> for Property {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let price: i64 = row.try_get("price")?;
        let property_type: String = row.try_get("property_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: Cents::new(price).map_err(|e| decode_err("price", e))?,
            property_type: property_type
                .parse::<PropertyType>()
                .map_err(|e| decode_err("property_type", e))?,
            bedrooms: row.try_get("bedrooms")?,
            bathrooms: row.try_get("bathrooms")?,
            square_footage: row.try_get("square_footage")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip_code: row.try_get("zip_code")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            distance_to_campus: row.try_get("distance_to_campus")?,
            university: row.try_get("university")?,
            image_urls: row.try_get("image_urls")?,
            amenities: row.try_get("amenities")?,
            utilities: row.try_get("utilities")?,
            rating: row.try_get("rating")?,
            review_count: row.try_get("review_count")?,
            available: row.try_get("available")?,
            available_date: row.try_get("available_date")?,
            contact_email: row.try_get("contact_email")?,
            contact_phone: row.try_get("contact_phone")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Postgres-backed store. All statements run individually on the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("could not connect to db")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;

        info!(max_connections, "initialized db connection");
        Ok(Self::new(pool))
    }
}

/// `SELECT ... FROM properties p WHERE <predicates> ORDER BY price, id LIMIT .. OFFSET ..`
pub fn search_query(
    predicates: &[Predicate],
    page: PageRequest,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {PROPERTY_COLUMNS} FROM properties p"));
    push_where(&mut query, predicates);
    query
        .push(" ORDER BY p.price ASC, p.id ASC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);
    query
}

#[async_trait]
impl ListingStore for PgStore {
    #[tracing::instrument(skip(self), err)]
    async fn search_properties(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Property>> {
        let mut query = search_query(predicates, page);
        debug!(sql = query.sql(), "compiled property search");

        let rows = query
            .build_query_as::<Property>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), err)]
    async fn get_property(&self, id: i64) -> Result<Option<Property>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE p.id = $1");
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    #[tracing::instrument(skip(self), err)]
    async fn create_property(&self, listing: NewProperty) -> Result<Property> {
        let sql = format!(
            r#"
WITH p AS (
    INSERT INTO properties (
        title, description, price, property_type, bedrooms, bathrooms, square_footage,
        address, city, state, zip_code, latitude, longitude, distance_to_campus, university,
        image_urls, amenities, utilities, rating, review_count, available, available_date,
        contact_email, contact_phone
    ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
        $19, $20, $21, $22, $23, $24
    )
    RETURNING *
)
SELECT {PROPERTY_COLUMNS} FROM p
            "#
        );

        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(listing.title)
            .bind(listing.description)
            .bind(listing.price.cents().get())
            .bind(listing.property_type.as_str())
            .bind(listing.bedrooms)
            .bind(listing.bathrooms)
            .bind(listing.square_footage)
            .bind(listing.address)
            .bind(listing.city)
            .bind(listing.state)
            .bind(listing.zip_code)
            .bind(listing.latitude)
            .bind(listing.longitude)
            .bind(listing.distance_to_campus)
            .bind(listing.university)
            .bind(listing.image_urls)
            .bind(listing.amenities)
            .bind(listing.utilities)
            .bind(listing.rating)
            .bind(listing.review_count)
            .bind(listing.available)
            .bind(listing.available_date)
            .bind(listing.contact_email)
            .bind(listing.contact_phone)
            .fetch_one(&self.pool)
            .await?;
        Ok(property)
    }

    #[tracing::instrument(skip(self), err)]
    async fn update_property(&self, id: i64, patch: PropertyPatch) -> Result<Option<Property>> {
        let sql = format!(
            r#"
WITH p AS (
    UPDATE properties SET
        title = COALESCE($2, title),
        description = COALESCE($3, description),
        price = COALESCE($4, price),
        property_type = COALESCE($5, property_type),
        bedrooms = COALESCE($6, bedrooms),
        bathrooms = COALESCE($7, bathrooms),
        square_footage = COALESCE($8, square_footage),
        address = COALESCE($9, address),
        city = COALESCE($10, city),
        state = COALESCE($11, state),
        zip_code = COALESCE($12, zip_code),
        latitude = COALESCE($13, latitude),
        longitude = COALESCE($14, longitude),
        distance_to_campus = COALESCE($15, distance_to_campus),
        university = COALESCE($16, university),
        image_urls = COALESCE($17, image_urls),
        amenities = COALESCE($18, amenities),
        utilities = COALESCE($19, utilities),
        rating = COALESCE($20, rating),
        review_count = COALESCE($21, review_count),
        available = COALESCE($22, available),
        available_date = COALESCE($23, available_date),
        contact_email = COALESCE($24, contact_email),
        contact_phone = COALESCE($25, contact_phone),
        updated_at = NOW()
    WHERE id = $1
    RETURNING *
)
SELECT {PROPERTY_COLUMNS} FROM p
            "#
        );

        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.description)
            .bind(patch.price.map(|p| p.cents().get()))
            .bind(patch.property_type.map(|k| k.as_str()))
            .bind(patch.bedrooms)
            .bind(patch.bathrooms)
            .bind(patch.square_footage)
            .bind(patch.address)
            .bind(patch.city)
            .bind(patch.state)
            .bind(patch.zip_code)
            .bind(patch.latitude)
            .bind(patch.longitude)
            .bind(patch.distance_to_campus)
            .bind(patch.university)
            .bind(patch.image_urls)
            .bind(patch.amenities)
            .bind(patch.utilities)
            .bind(patch.rating)
            .bind(patch.review_count)
            .bind(patch.available)
            .bind(patch.available_date)
            .bind(patch.contact_email)
            .bind(patch.contact_phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    #[tracing::instrument(skip(self), err)]
    async fn delete_property(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), err)]
    async fn count_properties(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), err)]
    async fn upsert_user(&self, claims: &UserClaims) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (id, email, first_name, last_name, profile_image_url)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (id) DO UPDATE SET
    email = EXCLUDED.email,
    first_name = EXCLUDED.first_name,
    last_name = EXCLUDED.last_name,
    profile_image_url = EXCLUDED.profile_image_url,
    updated_at = NOW()
RETURNING id, email, first_name, last_name, profile_image_url, created_at, updated_at
            "#,
        )
        .bind(&claims.sub)
        .bind(&claims.email)
        .bind(&claims.first_name)
        .bind(&claims.last_name)
        .bind(&claims.profile_image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self), err)]
    async fn saved_properties(&self, user_id: &str) -> Result<Vec<SavedListing>> {
        let sql = format!(
            r#"
SELECT s.id AS saved_id, s.user_id AS saved_user_id, s.property_id AS saved_property_id,
       s.created_at AS saved_created_at, {PROPERTY_COLUMNS}
FROM saved_properties s
INNER JOIN properties p ON p.id = s.property_id
WHERE s.user_id = $1
ORDER BY s.created_at DESC, s.id DESC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let listings = rows
            .iter()
            .map(|row| -> Result<SavedListing, sqlx::Error> {
                Ok(SavedListing {
                    saved: SavedProperty {
                        id: row.try_get("saved_id")?,
                        user_id: row.try_get("saved_user_id")?,
                        property_id: row.try_get("saved_property_id")?,
                        created_at: row.try_get("saved_created_at")?,
                    },
                    property: Property::from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    #[tracing::instrument(skip(self), err)]
    async fn is_property_saved(&self, user_id: &str, property_id: i64) -> Result<bool> {
        let saved: bool = sqlx::query_scalar(
            "SELECT EXISTS \
             (SELECT 1 FROM saved_properties WHERE user_id = $1 AND property_id = $2)",
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), err)]
    async fn save_property(
        &self,
        user_id: &str,
        property_id: i64,
    ) -> Result<Option<SavedProperty>> {
        // the unique constraint decides; no row back means it was already there
        let saved = sqlx::query_as::<_, SavedProperty>(
            r#"
INSERT INTO saved_properties (user_id, property_id)
VALUES ($1, $2)
ON CONFLICT (user_id, property_id) DO NOTHING
RETURNING id, user_id, property_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), err)]
    async fn unsave_property(&self, user_id: &str, property_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM saved_properties WHERE user_id = $1 AND property_id = $2")
                .bind(user_id)
                .bind(property_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), err)]
    async fn add_search_history(&self, entry: NewSearchHistory) -> Result<SearchHistory> {
        let record = sqlx::query_as::<_, SearchHistory>(
            r#"
INSERT INTO search_history (user_id, search_query, filters)
VALUES ($1, $2, $3)
RETURNING id, user_id, search_query, filters, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.search_query)
        .bind(entry.filters)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self), err)]
    async fn search_history(&self, user_id: &str, limit: i64) -> Result<Vec<SearchHistory>> {
        let records = sqlx::query_as::<_, SearchHistory>(
            r#"
SELECT id, user_id, search_query, filters, created_at
FROM search_history
WHERE user_id = $1
ORDER BY created_at DESC, id DESC
LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
