use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sellable product variant with its stock counters
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    #[sea_orm(nullable)]
    pub category_id: Option<Uuid>,
    pub name: String,
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub quantity_allocated: i32,
    pub track_inventory: bool,
    pub is_shipping_required: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub weight: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wishlist_line::Entity")]
    WishlistLines,
}

impl Related<super::wishlist_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WishlistLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Units that can still be sold, never negative
    pub fn quantity_available(&self) -> i32 {
        (self.quantity - self.quantity_allocated).max(0)
    }

    /// Fails with `InsufficientStock` when `quantity` exceeds what is available.
    /// Variants that do not track inventory always pass.
    pub fn check_quantity(&self, quantity: i32) -> Result<(), crate::errors::ServiceError> {
        if self.track_inventory && quantity > self.quantity_available() {
            return Err(crate::errors::ServiceError::InsufficientStock {
                variant_id: self.id,
                quantity_available: self.quantity_available(),
            });
        }
        Ok(())
    }

    /// Product and variant name, or just the product name when the variant has none
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.product_name.clone()
        } else {
            format!("{} ({})", self.product_name, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn variant(quantity: i32, allocated: i32, track: bool) -> Model {
        Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "T-shirt".into(),
            category_id: None,
            name: "M".into(),
            sku: "TS-M".into(),
            price: dec!(10),
            currency: "USD".into(),
            quantity,
            quantity_allocated: allocated,
            track_inventory: track,
            is_shipping_required: true,
            weight: None,
        }
    }

    #[test]
    fn available_quantity_never_negative() {
        assert_eq!(variant(5, 2, true).quantity_available(), 3);
        assert_eq!(variant(2, 5, true).quantity_available(), 0);
    }

    #[test]
    fn check_quantity_respects_tracking() {
        assert!(variant(3, 0, true).check_quantity(3).is_ok());
        assert!(variant(3, 0, true).check_quantity(4).is_err());
        assert!(variant(0, 0, false).check_quantity(100).is_ok());
    }
}
