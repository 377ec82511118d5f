use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gift card attached to a wishlist
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wishlist_gift_cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub wishlist_token: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub gift_card_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wishlist::Entity",
        from = "Column::WishlistToken",
        to = "super::wishlist::Column::Token",
        on_delete = "Cascade"
    )]
    Wishlist,
    #[sea_orm(
        belongs_to = "super::gift_card::Entity",
        from = "Column::GiftCardId",
        to = "super::gift_card::Column::Id"
    )]
    GiftCard,
}

impl Related<super::wishlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wishlist.def()
    }
}

impl Related<super::gift_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GiftCard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
