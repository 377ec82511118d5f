use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_methods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub shipping_zone_id: Uuid,
    pub name: String,
    pub method_type: ShippingMethodType,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub minimum_order_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub maximum_order_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub minimum_order_weight: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub maximum_order_weight: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipping_zone::Entity",
        from = "Column::ShippingZoneId",
        to = "super::shipping_zone::Column::Id"
    )]
    ShippingZone,
}

impl Related<super::shipping_zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingZone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Whether the method's limits apply to the order value or its weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethodType {
    #[sea_orm(string_value = "price")]
    PriceBased,
    #[sea_orm(string_value = "weight")]
    WeightBased,
}

impl Model {
    /// True when `value` falls inside this method's limits (maximum optional)
    pub fn accepts(&self, subtotal: Decimal, weight: Decimal) -> bool {
        let (value, min, max) = match self.method_type {
            ShippingMethodType::PriceBased => (
                subtotal,
                self.minimum_order_price,
                self.maximum_order_price,
            ),
            ShippingMethodType::WeightBased => (
                weight,
                self.minimum_order_weight,
                self.maximum_order_weight,
            ),
        };
        min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
