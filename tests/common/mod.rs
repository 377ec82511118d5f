#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use wishlist_api::{
    app_router,
    auth::issue_token,
    config::AppConfig,
    db,
    entities::{
        address, gift_card, payment, product_variant, shipping_method, shipping_zone, user,
        voucher, DiscountValueType, ShippingMethodType, VoucherType,
    },
    events::{self, EventSender},
    services::{taxes::FlatRateTaxCalculator, wishlist::WishlistService},
    AppState,
};

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const COOKIE_SECRET: &str =
    "test_cookie_signing_key_used_only_by_the_integration_tests_0123456789abcdef";

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_tax_rate(Decimal::ZERO).await
    }

    /// Construct a new test application with fresh database state.
    pub async fn with_tax_rate(rate: Decimal) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            COOKIE_SECRET.to_string(),
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.default_tax_rate = rate;
        cfg.default_country = "US".to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let taxes = Arc::new(FlatRateTaxCalculator::new(rate, cfg.default_currency.clone()));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx), taxes)
            .expect("failed to build app state");

        Self {
            router: app_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    pub fn service(&self) -> &WishlistService {
        &self.state.wishlist_service
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        issue_token(JWT_SECRET, user.id, Some(user.email.clone()), Duration::hours(1))
            .expect("token should be issued")
    }

    pub async fn create_user(&self, email: &str) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            default_shipping_address_id: Set(None),
            default_billing_address_id: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to create user")
    }

    pub async fn create_variant(
        &self,
        price: Decimal,
        quantity: i32,
        shipping_required: bool,
    ) -> product_variant::Model {
        let id = Uuid::new_v4();
        product_variant::ActiveModel {
            id: Set(id),
            product_id: Set(Uuid::new_v4()),
            product_name: Set("Desk Lamp".to_string()),
            category_id: Set(None),
            name: Set("Brass".to_string()),
            sku: Set(format!("LAMP-{}", &id.simple().to_string()[..8])),
            price: Set(price),
            currency: Set("USD".to_string()),
            quantity: Set(quantity),
            quantity_allocated: Set(0),
            track_inventory: Set(true),
            is_shipping_required: Set(shipping_required),
            weight: Set(Some(Decimal::ONE)),
        }
        .insert(self.db())
        .await
        .expect("failed to create variant")
    }

    pub async fn create_address(&self, user_id: Option<Uuid>, city: &str) -> address::Model {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            first_name: Set("Ada".to_string()),
            last_name: Set("Lovelace".to_string()),
            company_name: Set(String::new()),
            street_address_1: Set("1 Analytical Way".to_string()),
            street_address_2: Set(String::new()),
            city: Set(city.to_string()),
            city_area: Set(String::new()),
            postal_code: Set("10001".to_string()),
            country: Set("US".to_string()),
            country_area: Set("NY".to_string()),
            phone: Set(String::new()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to create address")
    }

    /// A zone covering `countries` with one price-based method
    pub async fn create_shipping(
        &self,
        countries: &[&str],
        price: Decimal,
    ) -> shipping_method::Model {
        let zone = shipping_zone::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Domestic".to_string()),
            countries: Set(json!(countries)),
        }
        .insert(self.db())
        .await
        .expect("failed to create shipping zone");

        self.create_method(zone.id, "Courier", price).await
    }

    pub async fn create_method(
        &self,
        zone_id: Uuid,
        name: &str,
        price: Decimal,
    ) -> shipping_method::Model {
        shipping_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipping_zone_id: Set(zone_id),
            name: Set(name.to_string()),
            method_type: Set(ShippingMethodType::PriceBased),
            price: Set(price),
            minimum_order_price: Set(None),
            maximum_order_price: Set(None),
            minimum_order_weight: Set(None),
            maximum_order_weight: Set(None),
        }
        .insert(self.db())
        .await
        .expect("failed to create shipping method")
    }

    pub async fn create_voucher(
        &self,
        code: &str,
        voucher_type: VoucherType,
        value_type: DiscountValueType,
        value: Decimal,
    ) -> voucher::Model {
        voucher::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(Some(format!("{} promotion", code))),
            voucher_type: Set(voucher_type),
            discount_value_type: Set(value_type),
            discount_value: Set(value),
            min_spent: Set(None),
            min_checkout_items_quantity: Set(None),
            countries: Set(json!([])),
            product_ids: Set(json!([])),
            category_ids: Set(json!([])),
            collection_ids: Set(json!([])),
            usage_limit: Set(None),
            used: Set(0),
            start_date: Set(Utc::now() - Duration::days(1)),
            end_date: Set(None),
            apply_once_per_order: Set(false),
            apply_once_per_customer: Set(false),
        }
        .insert(self.db())
        .await
        .expect("failed to create voucher")
    }

    pub async fn create_gift_card(&self, code: &str, balance: Decimal) -> gift_card::Model {
        gift_card::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            initial_balance: Set(balance),
            current_balance: Set(balance),
            currency: Set("USD".to_string()),
            is_active: Set(true),
            start_date: Set(Utc::now() - Duration::days(1)),
            end_date: Set(None),
            last_used_on: Set(None),
        }
        .insert(self.db())
        .await
        .expect("failed to create gift card")
    }

    pub async fn create_payment(&self, wishlist_token: Uuid, total: Decimal) -> payment::Model {
        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            wishlist_token: Set(Some(wishlist_token)),
            order_id: Set(None),
            gateway: Set("dummy".to_string()),
            total: Set(total),
            currency: Set("USD".to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to create payment")
    }
}

/// Builds a request; `form` is sent urlencoded
pub fn request(method: Method, uri: &str, form: Option<&str>) -> http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if form.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    }
    builder
}

pub fn body(form: Option<&str>) -> Body {
    form.map(|f| Body::from(f.to_string())).unwrap_or_else(Body::empty)
}

/// `Cookie` header value echoing every cookie the response set
pub fn cookies_from(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn assert_redirect(response: &Response, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response).as_deref(), Some(to));
}
