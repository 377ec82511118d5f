//! Wishlist API Library
//!
//! Storefront wishlist service: lines and stock checks, addresses,
//! vouchers and gift cards, shipping estimates, and order placement.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod money;
pub mod services;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::FromRef, http::HeaderValue, Router};
use axum_extra::extract::cookie::Key;
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::taxes::TaxCalculator;
use crate::services::wishlist::WishlistService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: events::EventSender,
    pub cookie_key: Key,
    pub wishlist_service: WishlistService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: events::EventSender,
        taxes: Arc<dyn TaxCalculator>,
    ) -> Result<Self, ServiceError> {
        let cookie_key = Key::try_from(config.cookie_secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("invalid cookie secret: {}", e)))?;
        let config = Arc::new(config);
        let wishlist_service =
            WishlistService::new(db.clone(), taxes, event_sender.clone(), config.clone());

        Ok(Self {
            db,
            config,
            event_sender,
            cookie_key,
            wishlist_service,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);
    }
    if config.is_development() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        return CorsLayer::permissive();
    }
    ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
    CorsLayer::new()
}

/// The full HTTP surface: health probes plus the wishlist storefront
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::wishlist::wishlist_routes(state.clone()))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        .layer(cors_layer(&state.config))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
