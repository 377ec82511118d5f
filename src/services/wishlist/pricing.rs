use rust_decimal::Decimal;

use crate::errors::ServiceError;
use crate::money::{zero_taxed_money, TaxedMoney};

use super::{LineWithVariant, LoadedWishlist, WishlistService};

impl WishlistService {
    /// Taxed unit price, derived from the line total so that rounding
    /// happens once per line
    pub fn calculate_unit_price(
        &self,
        wl: &LoadedWishlist,
        line: &LineWithVariant,
    ) -> Result<TaxedMoney, ServiceError> {
        Ok(self
            .calculate_line_total(wl, line)?
            .per_unit(line.line.quantity))
    }

    /// Taxes the net line amount (unit price times quantity) as a whole
    pub fn calculate_line_total(
        &self,
        wl: &LoadedWishlist,
        line: &LineWithVariant,
    ) -> Result<TaxedMoney, ServiceError> {
        let net = line.variant.price * Decimal::from(line.line.quantity);
        self.taxes
            .apply_taxes_to_product(&line.variant, net, wl.country())
            .map(|total| total.quantize())
    }

    pub fn calculate_subtotal(&self, wl: &LoadedWishlist) -> Result<TaxedMoney, ServiceError> {
        wl.lines
            .iter()
            .try_fold(
                zero_taxed_money(wl.currency()),
                |acc, line| -> Result<TaxedMoney, ServiceError> {
                    Ok(acc + self.calculate_line_total(wl, line)?)
                },
            )
    }

    /// Price of the selected method; zero when nothing ships or no method is set
    pub fn calculate_shipping(&self, wl: &LoadedWishlist) -> Result<TaxedMoney, ServiceError> {
        match wl.shipping_method.as_ref() {
            Some(method) if wl.is_shipping_required() => self
                .taxes
                .apply_taxes_to_shipping(method.price, wl.currency(), wl.country())
                .map(|price| price.quantize()),
            _ => Ok(zero_taxed_money(wl.currency())),
        }
    }

    /// Subtotal plus shipping minus the voucher discount, never below zero
    pub fn calculate_total(&self, wl: &LoadedWishlist) -> Result<TaxedMoney, ServiceError> {
        let total = self.calculate_subtotal(wl)? + self.calculate_shipping(wl)?;
        Ok(total.sub_discount(wl.wishlist.discount_amount).clamp_zero())
    }

    pub fn gift_cards_balance(&self, wl: &LoadedWishlist) -> Decimal {
        wl.gift_cards.iter().map(|card| card.current_balance).sum()
    }
}
