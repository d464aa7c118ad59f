use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{delete, get},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::search::PageLimits;
use crate::storage::ListingStore;

use self::auth::IdentityPolicy;

pub mod auth;
pub mod error;
pub mod history;
pub mod properties;
pub mod saved;
pub mod users;
pub mod views;


/// Shared by every handler: the store's pool is the only cross-request state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
    pub page_limits: PageLimits,
    pub identity: Arc<IdentityPolicy>,
}

/// Browser access for the configured origins. Identity headers are added by
/// the proxy, so browsers only ever send `content-type`.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/user", get(users::current_user))
        .route(
            "/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route(
            "/properties/:id",
            get(properties::get_property)
                .patch(properties::update_property)
                .delete(properties::delete_property),
        )
        .route(
            "/saved-properties",
            get(saved::list_saved).post(saved::save_property),
        )
        .route(
            "/saved-properties/:property_id",
            delete(saved::unsave_property),
        )
        .route(
            "/saved-properties/:property_id/status",
            get(saved::saved_status),
        )
        .route(
            "/search-history",
            get(history::list_history).post(history::add_history),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(|| async { "healthy" }))
        .layer(middleware::from_fn_with_state(state.clone(), auth::attach_claims))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &Config, store: Arc<dyn ListingStore>) -> anyhow::Result<()> {
    let backend = store.backend_name();
    let identity = IdentityPolicy::from_config(config);
    if !identity.requires_proxy_secret() {
        warn!("PROXY_SECRET not set, identity claims are accepted from any caller");
    }

    let mut app = router(AppState {
        store,
        page_limits: config.page_limits,
        identity: Arc::new(identity),
    });
    if !config.cors_origins.is_empty() {
        app = app.layer(cors_layer(&config.cors_origins)?);
    }

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address} with {backend} store");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("error running server")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
