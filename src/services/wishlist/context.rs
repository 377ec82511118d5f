use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::payment;
use crate::errors::ServiceError;
use crate::money::{TaxedMoney, TaxedMoneyRange};

use super::{LoadedWishlist, WishlistService};

#[derive(Debug, Clone, Serialize)]
pub struct ContextLine {
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: TaxedMoney,
    pub total: TaxedMoney,
}

/// Everything a wishlist page shows about prices and lines
#[derive(Debug, Clone, Serialize)]
pub struct WishlistContext {
    pub token: Uuid,
    pub quantity: i32,
    pub num_lines: usize,
    pub currency: String,
    pub lines: Vec<ContextLine>,
    pub subtotal: TaxedMoney,
    pub shipping_price: TaxedMoney,
    /// Total minus the gift card balance, never below zero
    pub total: TaxedMoney,
    pub total_with_shipping: TaxedMoneyRange,
    pub shipping_required: bool,
    pub taxes_handled: bool,
    pub display_gross_prices: bool,
    pub voucher_code: Option<String>,
    pub discount_amount: Decimal,
    pub discount_name: Option<String>,
    pub gift_cards_balance: Decimal,
    pub email: Option<String>,
    pub note: String,
}

impl WishlistService {
    pub fn get_wishlist_context(
        &self,
        wl: &LoadedWishlist,
        shipping_range: Option<TaxedMoneyRange>,
    ) -> Result<WishlistContext, ServiceError> {
        let subtotal = self.calculate_subtotal(wl)?;
        let shipping_price = self.calculate_shipping(wl)?;
        let gift_cards_balance = self.gift_cards_balance(wl);
        let total = self
            .calculate_total(wl)?
            .sub_discount(gift_cards_balance)
            .clamp_zero();

        let total_with_shipping = match shipping_range {
            Some(range) if wl.is_shipping_required() => range + subtotal.clone(),
            _ => TaxedMoneyRange::single(subtotal.clone()),
        };

        let lines = wl
            .lines
            .iter()
            .map(|line| {
                Ok(ContextLine {
                    variant_id: line.variant.id,
                    product_name: line.variant.product_name.clone(),
                    variant_name: line.variant.name.clone(),
                    sku: line.variant.sku.clone(),
                    quantity: line.line.quantity,
                    unit_price: self.calculate_unit_price(wl, line)?,
                    total: self.calculate_line_total(wl, line)?,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(WishlistContext {
            token: wl.token(),
            quantity: wl.quantity(),
            num_lines: wl.num_lines(),
            currency: wl.currency().to_string(),
            lines,
            subtotal,
            shipping_price,
            total,
            total_with_shipping,
            shipping_required: wl.is_shipping_required(),
            taxes_handled: self.taxes.taxes_enabled(),
            display_gross_prices: self.config.display_gross_prices,
            voucher_code: wl.wishlist.voucher_code.clone(),
            discount_amount: wl.wishlist.discount_amount,
            discount_name: wl.wishlist.discount_name.clone(),
            gift_cards_balance,
            email: wl.customer_email(),
            note: wl.wishlist.note.clone(),
        })
    }

    /// Whether active payments cover what gift cards leave to pay
    pub async fn is_fully_paid<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
    ) -> Result<bool, ServiceError> {
        let paid: Decimal = payment::Entity::find()
            .filter(payment::Column::WishlistToken.eq(wl.token()))
            .filter(payment::Column::IsActive.eq(true))
            .all(conn)
            .await?
            .iter()
            .map(|p| p.total)
            .sum();

        let due = (self.calculate_total(wl)?.gross - self.gift_cards_balance(wl)).max(Decimal::ZERO);
        Ok(paid >= due)
    }
}
