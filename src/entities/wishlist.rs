use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer's cart, keyed by the token stored in the `wishlist` cookie
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wishlists")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: Uuid,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub email: Option<String>,
    #[sea_orm(nullable)]
    pub shipping_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub billing_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub shipping_method_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub voucher_code: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(nullable)]
    pub discount_name: Option<String>,
    pub note: String,
    pub quantity: i32,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub last_change: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::wishlist_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::wishlist_gift_card::Entity")]
    GiftCards,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::wishlist_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::gift_card::Entity> for Entity {
    fn to() -> RelationDef {
        super::wishlist_gift_card::Relation::GiftCard.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::wishlist_gift_card::Relation::Wishlist.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Builds an unsaved wishlist for the given owner
    pub fn new_unsaved(user_id: Option<Uuid>, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4(),
            user_id,
            email: None,
            shipping_address_id: None,
            billing_address_id: None,
            shipping_method_id: None,
            voucher_code: None,
            discount_amount: Decimal::ZERO,
            discount_name: None,
            note: String::new(),
            quantity: 0,
            currency: currency.to_string(),
            created_at: now,
            last_change: now,
        }
    }
}
