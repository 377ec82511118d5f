use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gift_cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub initial_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub current_balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub end_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub last_used_on: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wishlist_gift_card::Entity")]
    WishlistGiftCards,
}

impl Related<super::wishlist_gift_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WishlistGiftCards.def()
    }
}

impl Related<super::wishlist::Entity> for Entity {
    fn to() -> RelationDef {
        super::wishlist_gift_card::Relation::Wishlist.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::wishlist_gift_card::Relation::GiftCard.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Flagged active, already started and not yet ended
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && self.end_date.map_or(true, |end| end >= now)
    }
}
