//! Identity comes from the auth proxy in front of this service, which
//! forwards the provider's claims as JSON in [`CLAIMS_HEADER`] and proves
//! itself with the shared secret in [`PROXY_SECRET_HEADER`]. Handlers that
//! need a user take [`AuthUser`], or [`ListingAdmin`] for listing writes;
//! nothing reads identity from anywhere else.

use std::collections::HashSet;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::config::Config;
use crate::models::UserClaims;

pub const CLAIMS_HEADER: &str = "x-user-claims";
pub const PROXY_SECRET_HEADER: &str = "x-proxy-secret";

/// Who may vouch for claims, and who may edit listings
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy {
    proxy_secret: Option<String>,
    listing_admins: HashSet<String>,
}

impl IdentityPolicy {
    pub fn new(
        proxy_secret: Option<String>,
        listing_admins: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            proxy_secret,
            listing_admins: listing_admins.into_iter().collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.proxy_secret.clone(), config.listing_admins.iter().cloned())
    }

    pub fn requires_proxy_secret(&self) -> bool {
        self.proxy_secret.is_some()
    }

    /// Without a configured secret every caller is trusted.
    fn from_proxy(&self, headers: &HeaderMap) -> bool {
        match &self.proxy_secret {
            None => true,
            Some(secret) => headers
                .get(PROXY_SECRET_HEADER)
                .is_some_and(|sent| sent.as_bytes() == secret.as_bytes()),
        }
    }

    pub fn is_listing_admin(&self, user_id: &str) -> bool {
        self.listing_admins.contains(user_id)
    }
}

fn parse_claims(raw: &axum::http::HeaderValue) -> Result<UserClaims, String> {
    let raw = raw.to_str().map_err(|e| e.to_string())?;
    let claims: UserClaims = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if claims.sub.trim().is_empty() {
        return Err("claims carry no subject".to_string());
    }
    Ok(claims)
}

/// Move forwarded claims into request extensions. Requests without usable
/// claims, or whose claims did not come through the proxy, continue
/// anonymously.
pub async fn attach_claims(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let claims = req.headers().get(CLAIMS_HEADER).map(parse_claims);
    let claims = match claims {
        Some(Ok(_)) if !state.identity.from_proxy(req.headers()) => {
            Some(Err("claims were not sent by the identity proxy".to_string()))
        }
        other => other,
    };

    match claims {
        Some(Ok(claims)) => {
            req.extensions_mut().insert(claims);
        }
        Some(Err(reason)) => warn!(%reason, "ignoring identity claims"),
        None => {}
    }

    next.run(req).await
}

/// The signed-in user. Rejects with 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserClaims);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// A signed-in user allowed to create, edit and delete listings.
/// Anonymous requests get 401, everyone else 403.
#[derive(Debug, Clone)]
pub struct ListingAdmin(pub AuthUser);

impl ListingAdmin {
    pub fn id(&self) -> &str {
        self.0.id()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ListingAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !state.identity.is_listing_admin(user.id()) {
            warn!(user_id = user.id(), "listing write refused");
            return Err(ApiError::Forbidden);
        }
        Ok(ListingAdmin(user))
    }
}
