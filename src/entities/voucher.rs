use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(nullable)]
    pub name: Option<String>,
    pub voucher_type: VoucherType,
    pub discount_value_type: DiscountValueType,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub min_spent: Option<Decimal>,
    #[sea_orm(nullable)]
    pub min_checkout_items_quantity: Option<i32>,
    /// Country codes the voucher is limited to; empty means everywhere
    #[sea_orm(column_type = "Json")]
    pub countries: Json,
    #[sea_orm(column_type = "Json")]
    pub product_ids: Json,
    #[sea_orm(column_type = "Json")]
    pub category_ids: Json,
    #[sea_orm(column_type = "Json")]
    pub collection_ids: Json,
    #[sea_orm(nullable)]
    pub usage_limit: Option<i32>,
    pub used: i32,
    pub start_date: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub end_date: Option<DateTime<Utc>>,
    pub apply_once_per_order: bool,
    pub apply_once_per_customer: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::voucher_customer::Entity")]
    Customers,
}

impl Related<super::voucher_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    #[sea_orm(string_value = "entire_order")]
    EntireOrder,
    #[sea_orm(string_value = "shipping")]
    Shipping,
    #[sea_orm(string_value = "specific_product")]
    SpecificProduct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountValueType {
    #[sea_orm(string_value = "fixed")]
    Fixed,
    #[sea_orm(string_value = "percentage")]
    Percentage,
}

fn json_list<T: serde::de::DeserializeOwned>(value: &Json) -> Vec<T> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

impl Model {
    /// Started, not ended and under its usage limit
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now
            && self.end_date.map_or(true, |end| end >= now)
            && self.usage_limit.map_or(true, |limit| self.used < limit)
    }

    pub fn country_codes(&self) -> Vec<String> {
        json_list(&self.countries)
    }

    pub fn product_id_list(&self) -> Vec<Uuid> {
        json_list(&self.product_ids)
    }

    pub fn category_id_list(&self) -> Vec<Uuid> {
        json_list(&self.category_ids)
    }

    pub fn collection_id_list(&self) -> Vec<Uuid> {
        json_list(&self.collection_ids)
    }

    /// Discount this voucher grants on `price`, never more than `price` itself
    pub fn get_discount_amount_for(&self, price: Decimal) -> Decimal {
        let discount = match self.discount_value_type {
            DiscountValueType::Fixed => self.discount_value,
            DiscountValueType::Percentage => (price * self.discount_value / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        };
        discount.min(price).max(Decimal::ZERO)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{}", name),
            _ => write!(f, "{}", self.code),
        }
    }
}
