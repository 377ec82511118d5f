//! Wishlist (shopping cart) domain service.
//!
//! A wishlist is loaded once per request into a [`LoadedWishlist`], which
//! carries the lines together with their variants plus the addresses,
//! shipping method and gift cards the pricing code needs. Every mutating
//! operation works on a `&mut LoadedWishlist` and refreshes it before
//! returning, so callers always see what is stored.
//!
//! Operations are generic over [`ConnectionTrait`] and run either on the
//! pool or inside a caller's transaction.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Unchanged,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{
    address, gift_card, product_variant, shipping_method, user, wishlist, wishlist_line,
};
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::taxes::TaxCalculator;

pub mod addresses;
pub mod context;
pub mod forms;
pub mod gift_cards;
pub mod lifecycle;
pub mod lines;
pub mod order;
pub mod pricing;
pub mod shipping;
pub mod vouchers;

pub use addresses::{address_data, same_address, AddressData};
pub use context::WishlistContext;
pub use lifecycle::token_is_valid;
pub use order::OrderData;

/// Name of the signed cookie holding an anonymous wishlist token
pub const COOKIE_NAME: &str = "wishlist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressKind {
    Shipping,
    Billing,
}

/// A wishlist line together with the variant it points at
#[derive(Debug, Clone, PartialEq)]
pub struct LineWithVariant {
    pub line: wishlist_line::Model,
    pub variant: product_variant::Model,
}

impl LineWithVariant {
    pub fn is_shipping_required(&self) -> bool {
        self.variant.is_shipping_required
    }
}

#[derive(Debug, Clone)]
pub struct LoadedWishlist {
    pub wishlist: wishlist::Model,
    pub lines: Vec<LineWithVariant>,
    pub user: Option<user::Model>,
    pub shipping_address: Option<address::Model>,
    pub billing_address: Option<address::Model>,
    pub shipping_method: Option<shipping_method::Model>,
    pub gift_cards: Vec<gift_card::Model>,
    /// `false` for the empty placeholder handed out when no wishlist exists yet
    pub persisted: bool,
}

impl LoadedWishlist {
    /// Wraps a wishlist that has not been written to the database
    pub fn unsaved(wishlist: wishlist::Model, user: Option<user::Model>) -> Self {
        Self {
            wishlist,
            lines: Vec::new(),
            user,
            shipping_address: None,
            billing_address: None,
            shipping_method: None,
            gift_cards: Vec::new(),
            persisted: false,
        }
    }

    pub fn token(&self) -> Uuid {
        self.wishlist.token
    }

    pub fn currency(&self) -> &str {
        &self.wishlist.currency
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units, as stored on the wishlist
    pub fn quantity(&self) -> i32 {
        self.wishlist.quantity
    }

    pub fn is_shipping_required(&self) -> bool {
        self.lines.iter().any(LineWithVariant::is_shipping_required)
    }

    pub fn total_weight(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.variant.weight.unwrap_or(Decimal::ZERO) * Decimal::from(l.line.quantity))
            .sum()
    }

    pub fn get_line(&self, variant_id: Uuid) -> Option<&LineWithVariant> {
        self.lines.iter().find(|l| l.variant.id == variant_id)
    }

    /// The owner's e-mail, falling back to the one typed in by an anonymous customer
    pub fn customer_email(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| u.email.clone())
            .or_else(|| self.wishlist.email.clone())
    }

    /// Country used for taxes and shipping: the shipping address's
    pub fn country(&self) -> Option<&str> {
        self.shipping_address.as_ref().map(|a| a.country.as_str())
    }
}

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
    taxes: Arc<dyn TaxCalculator>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl WishlistService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        taxes: Arc<dyn TaxCalculator>,
        event_sender: EventSender,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            taxes,
            event_sender,
            config,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn taxes(&self) -> &dyn TaxCalculator {
        self.taxes.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Loads every relation of a wishlist row
    pub async fn load<C: ConnectionTrait>(
        &self,
        conn: &C,
        wishlist: wishlist::Model,
    ) -> Result<LoadedWishlist, ServiceError> {
        let mut loaded = LoadedWishlist::unsaved(wishlist, None);
        loaded.persisted = true;
        self.fill_relations(conn, &mut loaded).await?;
        Ok(loaded)
    }

    /// Re-reads the wishlist row and its relations
    pub async fn reload<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        if !wl.persisted {
            return Ok(());
        }
        wl.wishlist = wishlist::Entity::find_by_id(wl.token())
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Wishlist {} not found", wl.token())))?;
        self.fill_relations(conn, wl).await
    }

    /// Like [`reload`](Self::reload) but holds a row lock on the wishlist
    /// until the surrounding transaction ends
    pub async fn reload_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        wl.wishlist = wishlist::Entity::find_by_id(wl.token())
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Wishlist {} not found", wl.token())))?;
        wl.persisted = true;
        self.fill_relations(conn, wl).await
    }

    async fn fill_relations<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        let model = &wl.wishlist;

        wl.lines = wishlist_line::Entity::find()
            .filter(wishlist_line::Column::WishlistToken.eq(model.token))
            .order_by_asc(wishlist_line::Column::Id)
            .find_also_related(product_variant::Entity)
            .all(conn)
            .await?
            .into_iter()
            .filter_map(|(line, variant)| variant.map(|variant| LineWithVariant { line, variant }))
            .collect();

        wl.user = match model.user_id {
            Some(id) => user::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        wl.shipping_address = match model.shipping_address_id {
            Some(id) => address::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        wl.billing_address = match model.billing_address_id {
            Some(id) => address::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        wl.shipping_method = match model.shipping_method_id {
            Some(id) => shipping_method::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        wl.gift_cards = model.find_related(gift_card::Entity).all(conn).await?;
        Ok(())
    }

    /// Writes the in-memory wishlist row back and bumps `last_change`.
    /// Unsaved wishlists are only touched in memory.
    pub(crate) async fn save<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        if !wl.persisted {
            wl.wishlist.last_change = Utc::now();
            return Ok(());
        }

        let model = &wl.wishlist;

        let active = wishlist::ActiveModel {
            token: Unchanged(model.token),
            user_id: Set(model.user_id),
            email: Set(model.email.clone()),
            shipping_address_id: Set(model.shipping_address_id),
            billing_address_id: Set(model.billing_address_id),
            shipping_method_id: Set(model.shipping_method_id),
            voucher_code: Set(model.voucher_code.clone()),
            discount_amount: Set(model.discount_amount),
            discount_name: Set(model.discount_name.clone()),
            note: Set(model.note.clone()),
            quantity: Set(model.quantity),
            currency: Set(model.currency.clone()),
            created_at: Unchanged(model.created_at),
            last_change: Set(Utc::now()),
        };
        wl.wishlist = active.update(conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn variant(weight: Option<Decimal>, shipping: bool) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Lamp".into(),
            category_id: None,
            name: String::new(),
            sku: "LAMP".into(),
            price: dec!(20),
            currency: "USD".into(),
            quantity: 10,
            quantity_allocated: 0,
            track_inventory: true,
            is_shipping_required: shipping,
            weight,
        }
    }

    fn with_lines(lines: Vec<(product_variant::Model, i32)>) -> LoadedWishlist {
        let model = wishlist::Model::new_unsaved(None, "USD");
        let token = model.token;
        let mut wl = LoadedWishlist::unsaved(model, None);
        wl.lines = lines
            .into_iter()
            .map(|(variant, quantity)| LineWithVariant {
                line: wishlist_line::Model {
                    id: Uuid::new_v4(),
                    wishlist_token: token,
                    variant_id: variant.id,
                    quantity,
                },
                variant,
            })
            .collect();
        wl
    }

    #[test]
    fn weight_sums_over_quantities() {
        let wl = with_lines(vec![
            (variant(Some(dec!(1.5)), true), 2),
            (variant(None, true), 4),
            (variant(Some(dec!(2)), false), 1),
        ]);
        assert_eq!(wl.total_weight(), dec!(5));
    }

    #[test]
    fn shipping_is_required_when_any_line_needs_it() {
        let digital = with_lines(vec![(variant(None, false), 1)]);
        assert!(!digital.is_shipping_required());

        let mixed = with_lines(vec![(variant(None, false), 1), (variant(None, true), 1)]);
        assert!(mixed.is_shipping_required());
    }

    #[test]
    fn customer_email_prefers_owner() {
        let mut wl = with_lines(vec![]);
        wl.wishlist.email = Some("guest@example.com".into());
        assert_eq!(wl.customer_email().as_deref(), Some("guest@example.com"));

        wl.user = Some(user::Model {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            default_shipping_address_id: None,
            default_billing_address_id: None,
            created_at: Utc::now(),
        });
        assert_eq!(wl.customer_email().as_deref(), Some("owner@example.com"));
    }
}
