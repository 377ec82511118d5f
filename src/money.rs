//! Taxed amounts and price ranges.
//!
//! Amounts are plain `Decimal`s in a single currency; mixing currencies is a
//! caller error and is rejected where it can happen (tax calculation).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Rounds to the currency's minor unit (2 decimal places, half away from zero).
pub fn quantize_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders an amount the way storefront JSON shows it, e.g. `"10.00 USD"`.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    format!("{:.2} {}", quantize_price(amount), currency)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxedMoney {
    pub net: Decimal,
    pub gross: Decimal,
    pub currency: String,
}

impl TaxedMoney {
    pub fn new(net: Decimal, gross: Decimal, currency: impl Into<String>) -> Self {
        Self {
            net,
            gross,
            currency: currency.into(),
        }
    }

    /// Same amount for net and gross
    pub fn untaxed(amount: Decimal, currency: impl Into<String>) -> Self {
        Self::new(amount, amount, currency)
    }

    pub fn tax(&self) -> Decimal {
        self.gross - self.net
    }

    pub fn is_zero(&self) -> bool {
        self.net.is_zero() && self.gross.is_zero()
    }

    /// Multiplies both amounts by a quantity
    pub fn times(&self, quantity: i32) -> Self {
        let factor = Decimal::from(quantity);
        Self::new(self.net * factor, self.gross * factor, self.currency.clone())
    }

    /// Divides both amounts by a quantity and quantizes the result
    pub fn per_unit(&self, quantity: i32) -> Self {
        if quantity == 0 {
            return zero_taxed_money(&self.currency);
        }
        let divisor = Decimal::from(quantity);
        Self::new(
            quantize_price(self.net / divisor),
            quantize_price(self.gross / divisor),
            self.currency.clone(),
        )
    }

    /// Subtracts a plain discount from both net and gross
    pub fn sub_discount(&self, discount: Decimal) -> Self {
        Self::new(self.net - discount, self.gross - discount, self.currency.clone())
    }

    /// Clamps both amounts at zero
    pub fn clamp_zero(self) -> Self {
        Self::new(
            self.net.max(Decimal::ZERO),
            self.gross.max(Decimal::ZERO),
            self.currency,
        )
    }

    pub fn quantize(&self) -> Self {
        Self::new(
            quantize_price(self.net),
            quantize_price(self.gross),
            self.currency.clone(),
        )
    }

    /// Tax rate as a fraction of net; zero when net is zero
    pub fn tax_rate(&self) -> Decimal {
        if self.net.is_zero() {
            Decimal::ZERO
        } else {
            self.tax() / self.net
        }
    }
}

impl Add for TaxedMoney {
    type Output = TaxedMoney;

    fn add(self, rhs: TaxedMoney) -> TaxedMoney {
        TaxedMoney::new(self.net + rhs.net, self.gross + rhs.gross, self.currency)
    }
}

impl Sub for TaxedMoney {
    type Output = TaxedMoney;

    fn sub(self, rhs: TaxedMoney) -> TaxedMoney {
        TaxedMoney::new(self.net - rhs.net, self.gross - rhs.gross, self.currency)
    }
}

pub fn zero_taxed_money(currency: &str) -> TaxedMoney {
    TaxedMoney::untaxed(Decimal::ZERO, currency)
}

/// Picks the amount shown to customers
pub fn get_display_price(price: &TaxedMoney, display_gross: bool) -> Decimal {
    if display_gross {
        price.gross
    } else {
        price.net
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyRange {
    pub start: Decimal,
    pub stop: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxedMoneyRange {
    pub start: TaxedMoney,
    pub stop: TaxedMoney,
}

impl TaxedMoneyRange {
    pub fn single(price: TaxedMoney) -> Self {
        Self {
            start: price.clone(),
            stop: price,
        }
    }
}

impl Add<TaxedMoney> for TaxedMoneyRange {
    type Output = TaxedMoneyRange;

    fn add(self, rhs: TaxedMoney) -> TaxedMoneyRange {
        TaxedMoneyRange {
            start: self.start + rhs.clone(),
            stop: self.stop + rhs,
        }
    }
}
