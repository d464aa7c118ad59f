use axum::{extract::State, Json};

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::models::User;

/// `GET /api/auth/user`: the stored profile, refreshed from the current claims
pub async fn current_user(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let stored = state.store.upsert_user(&user.0).await?;
    Ok(Json(stored))
}
