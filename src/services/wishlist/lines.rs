use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{product_variant, wishlist_line};
use crate::errors::ServiceError;
use crate::events::Event;

use super::{LoadedWishlist, WishlistService};

pub const STOCK_WARNING: &str =
    "Sorry. We don't have that many items in stock. Quantity was set to maximum available for now.";

/// Computes the line quantity after adding (or replacing with) `quantity`.
/// Returns the new and the previous quantity.
pub fn check_variant_in_stock(
    wl: &LoadedWishlist,
    variant: &product_variant::Model,
    quantity: i32,
    replace: bool,
    check_quantity: bool,
) -> Result<(i32, i32), ServiceError> {
    let line_quantity = wl
        .get_line(variant.id)
        .map(|l| l.line.quantity)
        .unwrap_or(0);
    let new_quantity = if replace {
        quantity
    } else {
        quantity + line_quantity
    };

    if new_quantity < 0 {
        return Err(ServiceError::ValidationError(format!(
            "{} is not a valid quantity (results in {})",
            quantity, new_quantity
        )));
    }
    if new_quantity > 0 && check_quantity {
        variant.check_quantity(new_quantity)?;
    }
    Ok((new_quantity, line_quantity))
}

/// Whether any line asks for more than its variant has in stock
pub fn contains_unavailable_variants(wl: &LoadedWishlist) -> bool {
    wl.lines
        .iter()
        .any(|l| l.variant.check_quantity(l.line.quantity).is_err())
}

impl WishlistService {
    /// Sets the wishlist's running quantity to the sum of its lines
    pub async fn update_wishlist_quantity<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        self.reload(conn, wl).await?;
        wl.wishlist.quantity = wl.lines.iter().map(|l| l.line.quantity).sum();
        self.save(conn, wl).await
    }

    async fn set_line_quantity<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let line = wl.get_line(variant_id).map(|l| l.line.clone());
        match line {
            Some(line) if quantity == 0 => {
                wishlist_line::Entity::delete_by_id(line.id).exec(conn).await?;
            }
            Some(line) => {
                let mut active: wishlist_line::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.update(conn).await?;
            }
            None if quantity > 0 => {
                wishlist_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    wishlist_token: Set(wl.token()),
                    variant_id: Set(variant_id),
                    quantity: Set(quantity),
                }
                .insert(conn)
                .await?;
            }
            None => {}
        }
        Ok(())
    }

    /// Adds `quantity` units of the variant, or sets the line to `quantity`
    /// when `replace` is on. A resulting quantity of 0 removes the line.
    #[instrument(skip(self, conn, wl, variant), fields(wishlist_token = %wl.token(), variant_id = %variant.id))]
    pub async fn add_variant_to_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        variant: &product_variant::Model,
        quantity: i32,
        replace: bool,
        check_quantity: bool,
    ) -> Result<(), ServiceError> {
        if !wl.persisted {
            return Err(ServiceError::InvalidOperation(
                "Cannot add lines to an unsaved wishlist".into(),
            ));
        }

        let (new_quantity, old_quantity) =
            check_variant_in_stock(wl, variant, quantity, replace, check_quantity)?;
        self.set_line_quantity(conn, wl, variant.id, new_quantity)
            .await?;
        self.update_wishlist_quantity(conn, wl).await?;

        info!(old_quantity, new_quantity, "Wishlist line updated");
        self.event_sender
            .send_or_log(Event::WishlistLineUpdated {
                wishlist_token: wl.token(),
                variant_id: variant.id,
                quantity: new_quantity,
            })
            .await;
        Ok(())
    }

    /// Clamps every line to the stock available; lines with no stock left are removed
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn remove_unavailable_variants<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        let unavailable: Vec<(Uuid, i32)> = wl
            .lines
            .iter()
            .filter(|l| l.variant.check_quantity(l.line.quantity).is_err())
            .map(|l| (l.variant.id, l.variant.quantity_available()))
            .collect();

        for (variant_id, available) in unavailable {
            warn!(%variant_id, available, "Clamping wishlist line to available stock");
            self.set_line_quantity(conn, wl, variant_id, available)
                .await?;
        }
        self.update_wishlist_quantity(conn, wl).await
    }

    /// Fixes lines that exceed stock and returns the warning to show, if any
    pub async fn check_product_availability_and_warn<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<Option<&'static str>, ServiceError> {
        if !contains_unavailable_variants(wl) {
            return Ok(None);
        }
        self.remove_unavailable_variants(conn, wl).await?;
        Ok(Some(STOCK_WARNING))
    }

    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn clear_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        wishlist_line::Entity::delete_many()
            .filter(wishlist_line::Column::WishlistToken.eq(wl.token()))
            .exec(conn)
            .await?;
        self.update_wishlist_quantity(conn, wl).await?;

        info!("Wishlist cleared");
        self.event_sender
            .send_or_log(Event::WishlistCleared(wl.token()))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::wishlist;
    use crate::services::wishlist::LineWithVariant;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn variant(quantity: i32, track_inventory: bool) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Candle".into(),
            category_id: None,
            name: String::new(),
            sku: "CNDL".into(),
            price: dec!(5),
            currency: "USD".into(),
            quantity,
            quantity_allocated: 0,
            track_inventory,
            is_shipping_required: true,
            weight: None,
        }
    }

    fn wishlist_with(variant: &product_variant::Model, quantity: i32) -> LoadedWishlist {
        let model = wishlist::Model::new_unsaved(None, "USD");
        let token = model.token;
        let mut wl = LoadedWishlist::unsaved(model, None);
        wl.lines.push(LineWithVariant {
            line: wishlist_line::Model {
                id: Uuid::new_v4(),
                wishlist_token: token,
                variant_id: variant.id,
                quantity,
            },
            variant: variant.clone(),
        });
        wl
    }

    #[test]
    fn adding_accumulates_existing_quantity() {
        let v = variant(10, true);
        let wl = wishlist_with(&v, 3);
        assert_eq!(check_variant_in_stock(&wl, &v, 2, false, true).unwrap(), (5, 3));
        assert_eq!(check_variant_in_stock(&wl, &v, 2, true, true).unwrap(), (2, 3));
    }

    #[test]
    fn negative_result_is_rejected() {
        let v = variant(10, true);
        let wl = wishlist_with(&v, 3);
        assert_matches!(
            check_variant_in_stock(&wl, &v, -4, false, true),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(check_variant_in_stock(&wl, &v, -3, false, true).unwrap(), (0, 3));
    }

    #[test]
    fn stock_is_checked_only_when_asked() {
        let v = variant(4, true);
        let wl = wishlist_with(&v, 3);
        assert_matches!(
            check_variant_in_stock(&wl, &v, 2, false, true),
            Err(ServiceError::InsufficientStock { quantity_available: 4, .. })
        );
        assert_eq!(check_variant_in_stock(&wl, &v, 2, false, false).unwrap(), (5, 3));
    }

    #[test]
    fn untracked_variants_are_always_available() {
        let v = variant(0, false);
        assert!(!contains_unavailable_variants(&wishlist_with(&v, 7)));

        let tracked = variant(2, true);
        assert!(contains_unavailable_variants(&wishlist_with(&tracked, 3)));
    }
}
