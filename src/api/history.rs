use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::models::{NewSearchHistory, SearchHistory};

const DEFAULT_HISTORY_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub filters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
}

pub async fn add_history(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SearchHistory>), ApiError> {
    let Json(request) = payload?;

    let record = state
        .store
        .add_search_history(NewSearchHistory {
            user_id: user.id().to_string(),
            search_query: request.search_query,
            filters: request.filters,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_history(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SearchHistory>>, ApiError> {
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_HISTORY_LIMIT,
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|limit| *limit >= 1)
            .ok_or_else(|| {
                ApiError::Validation("Invalid limit: expected a positive whole number".to_string())
            })?,
    };
    let limit = limit.min(state.page_limits.max_limit);

    let records = state.store.search_history(user.id(), limit).await?;
    Ok(Json(records))
}
