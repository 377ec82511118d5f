//! Turning a wishlist into an order.
//!
//! [`WishlistService::place_order`] runs the whole conversion inside one
//! transaction: voucher and gift card rows are read `FOR UPDATE`, stock is
//! allocated and the wishlist is deleted. Creating the order is idempotent
//! on the wishlist token.

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    address, order, order_line, payment, product_variant, shipping_method, voucher, wishlist,
    wishlist_gift_card, wishlist_line,
};
use crate::errors::{ServiceError, WishlistErrorCode};
use crate::events::Event;
use crate::money::TaxedMoney;

use super::addresses::{copy_address, store_user_address};
use super::gift_cards::{add_gift_card_to_order, validate_gift_cards};
use super::vouchers::{add_voucher_usage_by_customer, increase_voucher_usage};
use super::{AddressKind, LineWithVariant, LoadedWishlist, WishlistService};

pub const VOUCHER_EXPIRED: &str = "Voucher expired in meantime. Order placement aborted.";

/// Snapshot of a wishlist line as it will be stored on the order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineData {
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_name: String,
    pub product_sku: String,
    pub is_shipping_required: bool,
    pub quantity: i32,
    pub track_inventory: bool,
    pub unit_price: TaxedMoney,
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone)]
pub struct ShippingData {
    pub address: address::Model,
    pub method: shipping_method::Model,
    pub price: TaxedMoney,
    pub weight: Decimal,
}

#[derive(Debug, Clone)]
pub struct OrderData {
    pub lines: Vec<OrderLineData>,
    pub total: TaxedMoney,
    pub shipping: Option<ShippingData>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub billing_address: Option<address::Model>,
    pub customer_note: String,
    pub language_code: String,
    pub tracking_client_id: String,
    pub voucher: Option<voucher::Model>,
    pub discount_amount: Decimal,
    pub discount_name: Option<String>,
    /// Amount gift cards may still cover
    pub total_price_left: Decimal,
}

impl WishlistService {
    /// Checks stock and snapshots the line's names and prices
    pub fn create_line_for_order(
        &self,
        wl: &LoadedWishlist,
        line: &LineWithVariant,
    ) -> Result<OrderLineData, ServiceError> {
        let variant = &line.variant;
        let quantity = line.line.quantity;
        variant.check_quantity(quantity)?;

        let unit_price = self.calculate_line_total(wl, line)?.per_unit(quantity);
        Ok(OrderLineData {
            variant_id: variant.id,
            product_name: variant.product_name.clone(),
            variant_name: variant.name.clone(),
            product_sku: variant.sku.clone(),
            is_shipping_required: variant.is_shipping_required,
            quantity,
            track_inventory: variant.track_inventory,
            tax_rate: unit_price.tax_rate(),
            unit_price,
        })
    }

    /// The address to store on the order. Book entries are stored in the
    /// user's book and then copied so later edits do not alter the order.
    async fn address_for_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        address: &address::Model,
        kind: AddressKind,
    ) -> Result<address::Model, ServiceError> {
        let Some(user) = wl.user.as_ref() else {
            return Ok(address.clone());
        };
        store_user_address(conn, user, address, kind).await?;
        if address.belongs_to_user(user.id) {
            copy_address(conn, address).await
        } else {
            Ok(address.clone())
        }
    }

    async fn process_shipping_data<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
    ) -> Result<Option<ShippingData>, ServiceError> {
        if !wl.is_shipping_required() {
            return Ok(None);
        }
        let shipping_address = wl.shipping_address.as_ref().ok_or_else(|| {
            ServiceError::invalid(
                WishlistErrorCode::ShippingAddressNotSet,
                "Shipping address is not set",
            )
        })?;
        let method = wl.shipping_method.clone().ok_or_else(|| {
            ServiceError::invalid(
                WishlistErrorCode::ShippingMethodNotSet,
                "Shipping method is not set",
            )
        })?;

        let address = self
            .address_for_order(conn, wl, shipping_address, AddressKind::Shipping)
            .await?;
        Ok(Some(ShippingData {
            address,
            method,
            price: self.calculate_shipping(wl)?,
            weight: wl.total_weight(),
        }))
    }

    /// Locks the voucher, counts the use and records the customer when required
    async fn process_voucher_data<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
    ) -> Result<Option<voucher::Model>, ServiceError> {
        let voucher = self.get_voucher_for_wishlist(conn, wl, true).await?;
        let Some(voucher) = voucher else {
            if wl.wishlist.voucher_code.is_some() {
                return Err(ServiceError::NotApplicable(VOUCHER_EXPIRED.into()));
            }
            return Ok(None);
        };

        increase_voucher_usage(conn, &voucher).await?;
        if voucher.apply_once_per_customer {
            if let Some(email) = wl.customer_email() {
                add_voucher_usage_by_customer(conn, &voucher, &email).await?;
            }
        }
        Ok(Some(voucher))
    }

    /// Collects and checks everything the order needs. Voucher usage is
    /// recorded here, so this must run in the transaction that creates the order.
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn prepare_order_data<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        tracking_code: &str,
    ) -> Result<OrderData, ServiceError> {
        let gift_cards_balance = self.gift_cards_balance(wl);
        let total = self
            .calculate_total(wl)?
            .sub_discount(gift_cards_balance)
            .clamp_zero();

        let shipping = self.process_shipping_data(conn, wl).await?;

        let billing_address = match wl.billing_address.as_ref() {
            Some(address) => Some(
                self.address_for_order(conn, wl, address, AddressKind::Billing)
                    .await?,
            ),
            None => None,
        };

        let lines = wl
            .lines
            .iter()
            .map(|line| self.create_line_for_order(wl, line))
            .collect::<Result<Vec<_>, _>>()?;

        validate_gift_cards(wl)?;

        let voucher = self.process_voucher_data(conn, wl).await?;

        let shipping_price = match shipping.as_ref() {
            Some(data) => data.price.clone(),
            None => self.calculate_shipping(wl)?,
        };
        let total_price_left = (self.calculate_subtotal(wl)? + shipping_price)
            .sub_discount(wl.wishlist.discount_amount)
            .gross;

        self.taxes.preprocess_order_creation(wl)?;

        Ok(OrderData {
            lines,
            total,
            shipping,
            user_id: wl.user.as_ref().map(|u| u.id),
            user_email: wl.customer_email(),
            billing_address,
            customer_note: wl.wishlist.note.clone(),
            language_code: self.config.language_code.clone(),
            tracking_client_id: tracking_code.to_string(),
            voucher,
            discount_amount: wl.wishlist.discount_amount,
            discount_name: wl.wishlist.discount_name.clone(),
            total_price_left,
        })
    }

    /// Order already written for the wishlist token, if any
    pub async fn placed_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        wishlist_token: Uuid,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::WishlistToken.eq(wishlist_token))
            .one(conn)
            .await?)
    }

    /// Writes the order in the caller's transaction. Returns the order and
    /// whether it was created now; an order already placed from this
    /// wishlist is returned untouched.
    #[instrument(skip(self, conn, wl, data), fields(wishlist_token = %wl.token()))]
    pub async fn create_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        data: OrderData,
    ) -> Result<(order::Model, bool), ServiceError> {
        if let Some(existing) = self.placed_order(conn, wl.token()).await? {
            info!(order_id = %existing.id, "Order already placed for wishlist");
            return Ok((existing, false));
        }

        let zero = Decimal::ZERO;
        let (shipping_address_id, shipping_method_id, shipping_method_name, shipping_price, weight) =
            match data.shipping.as_ref() {
                Some(s) => (
                    Some(s.address.id),
                    Some(s.method.id),
                    Some(s.method.to_string()),
                    s.price.clone(),
                    s.weight,
                ),
                None => (None, None, None, TaxedMoney::untaxed(zero, &data.total.currency), zero),
            };

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            token: Set(Uuid::new_v4()),
            wishlist_token: Set(wl.token()),
            user_id: Set(data.user_id),
            user_email: Set(data.user_email.clone()),
            shipping_address_id: Set(shipping_address_id),
            billing_address_id: Set(data.billing_address.as_ref().map(|a| a.id)),
            shipping_method_id: Set(shipping_method_id),
            shipping_method_name: Set(shipping_method_name),
            shipping_price_net: Set(shipping_price.net),
            shipping_price_gross: Set(shipping_price.gross),
            weight: Set(weight),
            total_net: Set(data.total.net),
            total_gross: Set(data.total.gross),
            currency: Set(data.total.currency.clone()),
            voucher_id: Set(data.voucher.as_ref().map(|v| v.id)),
            discount_amount: Set(data.discount_amount),
            discount_name: Set(data.discount_name.clone()),
            customer_note: Set(data.customer_note.clone()),
            language_code: Set(data.language_code.clone()),
            tracking_client_id: Set(data.tracking_client_id.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        for line in &data.lines {
            order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                variant_id: Set(Some(line.variant_id)),
                product_name: Set(line.product_name.clone()),
                variant_name: Set(line.variant_name.clone()),
                product_sku: Set(line.product_sku.clone()),
                is_shipping_required: Set(line.is_shipping_required),
                quantity: Set(line.quantity),
                unit_price_net: Set(line.unit_price.net),
                unit_price_gross: Set(line.unit_price.gross),
                tax_rate: Set(line.tax_rate),
                currency: Set(line.unit_price.currency.clone()),
            }
            .insert(conn)
            .await?;

            if line.track_inventory {
                product_variant::Entity::update_many()
                    .col_expr(
                        product_variant::Column::QuantityAllocated,
                        Expr::col(product_variant::Column::QuantityAllocated).add(line.quantity),
                    )
                    .filter(product_variant::Column::Id.eq(line.variant_id))
                    .exec(conn)
                    .await?;
            }
        }

        let mut total_price_left = data.total_price_left;
        for card in &wl.gift_cards {
            total_price_left = add_gift_card_to_order(conn, order.id, card.id, total_price_left).await?;
        }

        payment::Entity::update_many()
            .col_expr(payment::Column::OrderId, Expr::value(order.id))
            .filter(payment::Column::WishlistToken.eq(wl.token()))
            .exec(conn)
            .await?;

        info!(order_id = %order.id, lines = data.lines.len(), "Order created");
        Ok((order, true))
    }

    async fn delete_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        token: Uuid,
    ) -> Result<(), ServiceError> {
        wishlist_line::Entity::delete_many()
            .filter(wishlist_line::Column::WishlistToken.eq(token))
            .exec(conn)
            .await?;
        wishlist_gift_card::Entity::delete_many()
            .filter(wishlist_gift_card::Column::WishlistToken.eq(token))
            .exec(conn)
            .await?;
        wishlist::Entity::delete_by_id(token).exec(conn).await?;
        Ok(())
    }

    /// Prepares and creates the order, then deletes the wishlist, all in one
    /// transaction. Events are sent only after commit.
    #[instrument(skip(self, wl), fields(wishlist_token = %wl.token()))]
    pub async fn place_order(
        &self,
        wl: &LoadedWishlist,
        tracking_code: &str,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let mut current = wl.clone();
        if let Err(err) = self.reload_for_update(&txn, &mut current).await {
            // the row is gone once an order took its place
            return match self.placed_order(&txn, wl.token()).await? {
                Some(existing) => {
                    txn.commit().await?;
                    Ok(existing)
                }
                None => Err(err),
            };
        }
        if let Some(existing) = self.placed_order(&txn, current.token()).await? {
            self.delete_wishlist(&txn, current.token()).await?;
            txn.commit().await?;
            return Ok(existing);
        }

        let data = self.prepare_order_data(&txn, &current, tracking_code).await?;
        let (order, created) = self.create_order(&txn, &current, data).await?;
        self.delete_wishlist(&txn, current.token()).await?;
        txn.commit().await?;

        if created {
            counter!("wishlist.orders_created", 1);
            self.event_sender
                .send_or_log(Event::OrderCreated(order.id))
                .await;
            self.event_sender
                .send_or_log(Event::OrderConfirmationRequested {
                    order_id: order.id,
                    email: order.user_email.clone(),
                })
                .await;
        }
        Ok(order)
    }

    /// Completion checks, each reported with its error code
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn clean_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        if wl.is_shipping_required() {
            if wl.shipping_method.is_none() {
                return Err(ServiceError::invalid(
                    WishlistErrorCode::ShippingMethodNotSet,
                    "Shipping method is not set",
                ));
            }
            if wl.shipping_address.is_none() {
                return Err(ServiceError::invalid(
                    WishlistErrorCode::ShippingAddressNotSet,
                    "Shipping address is not set",
                ));
            }
            if !self.is_valid_shipping_method(conn, wl).await? {
                return Err(ServiceError::invalid(
                    WishlistErrorCode::InvalidShippingMethod,
                    "Shipping method is not valid for your shipping address",
                ));
            }
        }

        if wl.billing_address.is_none() {
            return Err(ServiceError::invalid(
                WishlistErrorCode::BillingAddressNotSet,
                "Billing address is not set",
            ));
        }

        if !self.is_fully_paid(conn, wl).await? {
            return Err(ServiceError::invalid(
                WishlistErrorCode::WishlistNotFullyPaid,
                "Provided payment methods can not cover the wishlist's total amount",
            ));
        }
        Ok(())
    }

    /// Runs the completion checks and places the order
    #[instrument(skip(self, wl), fields(wishlist_token = %wl.token()))]
    pub async fn complete_wishlist(
        &self,
        wl: &mut LoadedWishlist,
        tracking_code: &str,
    ) -> Result<order::Model, ServiceError> {
        if wl.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot complete an empty wishlist".into(),
            ));
        }
        self.clean_wishlist(self.db.as_ref(), wl).await?;

        match self.place_order(wl, tracking_code).await {
            Err(ServiceError::NotApplicable(reason)) => {
                warn!(%reason, "Voucher rejected at completion");
                Err(ServiceError::invalid(
                    WishlistErrorCode::VoucherNotApplicable,
                    reason,
                ))
            }
            other => other,
        }
    }
}
