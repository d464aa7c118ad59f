use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::auth::AuthUser;
use crate::api::error::{parse_id, ApiError};
use crate::api::views::SavedListingResponse;
use crate::api::AppState;
use crate::models::SavedProperty;

/// Clients send the id as a number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PropertyIdInput {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub property_id: PropertyIdInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStatus {
    pub is_saved: bool,
}

pub async fn list_saved(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SavedListingResponse>>, ApiError> {
    let saved = state.store.saved_properties(user.id()).await?;
    Ok(Json(saved.into_iter().map(SavedListingResponse::from).collect()))
}

/// 201 with the new row, 400 when the pair is already saved.
pub async fn save_property(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedProperty>), ApiError> {
    let Json(request) = payload?;
    let property_id = match request.property_id {
        PropertyIdInput::Number(id) => id,
        PropertyIdInput::Text(raw) => parse_id(&raw, "propertyId")?,
    };

    if state.store.get_property(property_id).await?.is_none() {
        return Err(ApiError::NotFound("Property"));
    }

    // fast path only; the insert below is what actually rules out duplicates
    if state.store.is_property_saved(user.id(), property_id).await? {
        return Err(ApiError::AlreadySaved);
    }

    let saved = state
        .store
        .save_property(user.id(), property_id)
        .await?
        .ok_or(ApiError::AlreadySaved)?;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn unsave_property(
    user: AuthUser,
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let property_id = parse_id(&property_id, "propertyId")?;

    if !state.store.unsave_property(user.id(), property_id).await? {
        return Err(ApiError::NotFound("Saved property"));
    }

    Ok(Json(json!({ "message": "Property unsaved successfully" })))
}

pub async fn saved_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<SavedStatus>, ApiError> {
    let property_id = parse_id(&property_id, "propertyId")?;
    let is_saved = state.store.is_property_saved(user.id(), property_id).await?;

    Ok(Json(SavedStatus { is_saved }))
}
