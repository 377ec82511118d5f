use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order materialized from a wishlist
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Public token used in customer-facing URLs
    #[sea_orm(unique)]
    pub token: Uuid,
    #[sea_orm(unique)]
    pub wishlist_token: Uuid,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub user_email: Option<String>,
    #[sea_orm(nullable)]
    pub shipping_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub billing_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub shipping_method_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub shipping_method_name: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub shipping_price_net: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub shipping_price_gross: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub weight: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_net: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_gross: Decimal,
    pub currency: String,
    #[sea_orm(nullable)]
    pub voucher_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(nullable)]
    pub discount_name: Option<String>,
    pub customer_note: String,
    pub language_code: String,
    pub tracking_client_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line::Entity")]
    Lines,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
