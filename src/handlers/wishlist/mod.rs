//! Storefront wishlist endpoints

pub mod request;
pub mod steps;
pub mod validators;
pub mod views;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware_helpers::merge_anonymous_wishlist;
use crate::AppState;

/// Routes under `/wishlist/`. An anonymous wishlist is merged into the
/// account on the first request that carries both the cookie and a token.
pub fn wishlist_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/wishlist/", get(views::index))
        .route("/wishlist/add/{variant_id}", post(views::add_to_wishlist))
        .route("/wishlist/start/", get(views::start))
        .route("/wishlist/update/{variant_id}/", post(views::update_line))
        .route("/wishlist/clear/", post(views::clear))
        .route("/wishlist/shipping-options/", post(views::shipping_options))
        .route(
            "/wishlist/shipping-address/",
            get(steps::shipping_address_page).post(steps::shipping_address_submit),
        )
        .route(
            "/wishlist/shipping-method/",
            get(steps::shipping_method_page).post(steps::shipping_method_submit),
        )
        .route(
            "/wishlist/summary/",
            get(steps::summary_page).post(steps::summary_submit),
        )
        .route("/wishlist/complete/", post(steps::complete))
        .route("/wishlist/dropdown/", get(views::dropdown))
        .route("/wishlist/counter/", get(views::counter))
        .route("/wishlist/remove_voucher/", post(views::remove_voucher))
        .route("/wishlist/login/", get(views::login))
        .route_layer(from_fn_with_state(state, merge_anonymous_wishlist))
}
