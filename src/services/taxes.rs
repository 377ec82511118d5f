use rust_decimal::Decimal;
use tracing::debug;

use crate::entities::product_variant;
use crate::errors::ServiceError;
use crate::money::{quantize_price, MoneyRange, TaxedMoney, TaxedMoneyRange};
use crate::services::wishlist::LoadedWishlist;

/// Pricing engine seam: turns net prices into taxed amounts.
///
/// Implementations may call out to an external provider, which is why
/// every operation is fallible with `ServiceError::TaxError`.
pub trait TaxCalculator: Send + Sync {
    fn taxes_enabled(&self) -> bool;

    /// Tax rate applied to the variant, as a fraction
    fn tax_rate_for(&self, variant: &product_variant::Model) -> Decimal;

    fn apply_taxes_to_product(
        &self,
        variant: &product_variant::Model,
        net: Decimal,
        country: Option<&str>,
    ) -> Result<TaxedMoney, ServiceError>;

    fn apply_taxes_to_shipping(
        &self,
        price: Decimal,
        currency: &str,
        country: Option<&str>,
    ) -> Result<TaxedMoney, ServiceError>;

    fn apply_taxes_to_shipping_price_range(
        &self,
        range: &MoneyRange,
        country: Option<&str>,
    ) -> Result<TaxedMoneyRange, ServiceError> {
        Ok(TaxedMoneyRange {
            start: self.apply_taxes_to_shipping(range.start, &range.currency, country)?,
            stop: self.apply_taxes_to_shipping(range.stop, &range.currency, country)?,
        })
    }

    /// Last chance to reject an order before it is written
    fn preprocess_order_creation(&self, _wishlist: &LoadedWishlist) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Applies one rate to every product and shipping price
#[derive(Debug, Clone)]
pub struct FlatRateTaxCalculator {
    rate: Decimal,
    currency: String,
}

impl FlatRateTaxCalculator {
    pub fn new(rate: Decimal, currency: impl Into<String>) -> Self {
        Self {
            rate,
            currency: currency.into(),
        }
    }

    fn apply(&self, net: Decimal, currency: &str) -> Result<TaxedMoney, ServiceError> {
        if !currency.eq_ignore_ascii_case(&self.currency) {
            return Err(ServiceError::TaxError(format!(
                "cannot tax {} amounts, configured for {}",
                currency, self.currency
            )));
        }
        let gross = quantize_price(net * (Decimal::ONE + self.rate));
        Ok(TaxedMoney::new(net, gross, currency))
    }
}

impl TaxCalculator for FlatRateTaxCalculator {
    fn taxes_enabled(&self) -> bool {
        !self.rate.is_zero()
    }

    fn tax_rate_for(&self, _variant: &product_variant::Model) -> Decimal {
        self.rate
    }

    fn apply_taxes_to_product(
        &self,
        variant: &product_variant::Model,
        net: Decimal,
        country: Option<&str>,
    ) -> Result<TaxedMoney, ServiceError> {
        debug!(variant_id = %variant.id, ?country, "applying flat rate");
        self.apply(net, &variant.currency)
    }

    fn apply_taxes_to_shipping(
        &self,
        price: Decimal,
        currency: &str,
        _country: Option<&str>,
    ) -> Result<TaxedMoney, ServiceError> {
        self.apply(price, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn variant(currency: &str) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Mug".into(),
            category_id: None,
            name: String::new(),
            sku: "MUG".into(),
            price: dec!(10),
            currency: currency.into(),
            quantity: 10,
            quantity_allocated: 0,
            track_inventory: true,
            is_shipping_required: true,
            weight: None,
        }
    }

    #[test]
    fn flat_rate_adds_tax_to_gross() {
        let taxes = FlatRateTaxCalculator::new(dec!(0.23), "USD");
        let taxed = taxes
            .apply_taxes_to_product(&variant("USD"), dec!(10), None)
            .unwrap();
        assert_eq!(taxed.net, dec!(10));
        assert_eq!(taxed.gross, dec!(12.30));
        assert!(taxes.taxes_enabled());
    }

    #[test]
    fn zero_rate_disables_taxes() {
        let taxes = FlatRateTaxCalculator::new(Decimal::ZERO, "USD");
        assert!(!taxes.taxes_enabled());
        let taxed = taxes.apply_taxes_to_shipping(dec!(5), "USD", None).unwrap();
        assert_eq!(taxed.gross, dec!(5));
    }

    #[test]
    fn currency_mismatch_is_a_tax_error() {
        let taxes = FlatRateTaxCalculator::new(dec!(0.1), "USD");
        let err = taxes
            .apply_taxes_to_product(&variant("EUR"), dec!(10), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::TaxError(_)));
    }

    #[test]
    fn shipping_range_is_taxed_at_both_ends() {
        let taxes = FlatRateTaxCalculator::new(dec!(0.1), "USD");
        let range = MoneyRange {
            start: dec!(10),
            stop: dec!(20),
            currency: "USD".into(),
        };
        let taxed = taxes.apply_taxes_to_shipping_price_range(&range, Some("US")).unwrap();
        assert_eq!(taxed.start.gross, dec!(11.00));
        assert_eq!(taxed.stop.gross, dec!(22.00));
    }
}
