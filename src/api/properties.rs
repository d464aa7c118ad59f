use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use validator::Validate;

use crate::api::auth::ListingAdmin;
use crate::api::error::{parse_id, ApiError};
use crate::api::views::PropertyResponse;
use crate::api::AppState;
use crate::models::{NewProperty, PropertyPatch};
use crate::search::{compile, SearchRequest};

/// `GET /api/properties` with the search filters as query parameters
pub async fn list_properties(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<PropertyResponse>>, ApiError> {
    let request = SearchRequest::from_query(query.as_deref(), state.page_limits)?;
    let predicates = compile(&request.filters);
    debug!(?predicates, page = ?request.page, "searching properties");

    let mut page = state
        .store
        .search_properties(&predicates, request.page)
        .await?;
    if let Some(sort) = request.sort {
        sort.sort(&mut page);
    }

    Ok(Json(page.into_iter().map(PropertyResponse::from).collect()))
}

pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let id = parse_id(&id, "id")?;
    let property = state
        .store
        .get_property(id)
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    Ok(Json(property.into()))
}

pub async fn create_property(
    admin: ListingAdmin,
    State(state): State<AppState>,
    payload: Result<Json<NewProperty>, JsonRejection>,
) -> Result<(StatusCode, Json<PropertyResponse>), ApiError> {
    let Json(listing) = payload?;
    listing.validate()?;

    let property = state.store.create_property(listing).await?;
    info!(property_id = property.id, user_id = admin.id(), "listing created");

    Ok((StatusCode::CREATED, Json(property.into())))
}

pub async fn update_property(
    admin: ListingAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PropertyPatch>, JsonRejection>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let id = parse_id(&id, "id")?;
    let Json(patch) = payload?;
    patch.validate()?;

    let property = state
        .store
        .update_property(id, patch)
        .await?
        .ok_or(ApiError::NotFound("Property"))?;
    info!(property_id = id, user_id = admin.id(), "listing updated");

    Ok(Json(property.into()))
}

pub async fn delete_property(
    admin: ListingAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "id")?;
    if !state.store.delete_property(id).await? {
        return Err(ApiError::NotFound("Property"));
    }
    info!(property_id = id, user_id = admin.id(), "listing deleted");

    Ok(Json(json!({ "message": "Property deleted successfully" })))
}
