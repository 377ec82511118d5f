use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{gift_card, order_gift_card, wishlist_gift_card};
use crate::errors::ServiceError;
use crate::events::Event;

use super::{LoadedWishlist, WishlistService};

pub const GIFT_CARD_EXPIRED: &str = "Gift card has expired. Order placement cancelled.";

pub async fn find_active_gift_card<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<Option<gift_card::Model>, ServiceError> {
    let found = gift_card::Entity::find()
        .filter(gift_card::Column::Code.eq(code))
        .one(conn)
        .await?;
    Ok(found.filter(|card| card.is_active_at(Utc::now())))
}

/// Every gift card attached to the wishlist must still be active
pub fn validate_gift_cards(wl: &LoadedWishlist) -> Result<(), ServiceError> {
    let now = Utc::now();
    if wl.gift_cards.iter().all(|card| card.is_active_at(now)) {
        Ok(())
    } else {
        Err(ServiceError::NotApplicable(GIFT_CARD_EXPIRED.into()))
    }
}

/// Spends the card's balance on the order and returns what is left to pay.
/// The card row is locked for the rest of the transaction.
#[instrument(skip(conn))]
pub async fn add_gift_card_to_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    gift_card_id: Uuid,
    total_price_left: Decimal,
) -> Result<Decimal, ServiceError> {
    if total_price_left <= Decimal::ZERO {
        return Ok(total_price_left);
    }

    let card = gift_card::Entity::find_by_id(gift_card_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", gift_card_id)))?;

    order_gift_card::ActiveModel {
        order_id: Set(order_id),
        gift_card_id: Set(card.id),
    }
    .insert(conn)
    .await?;

    let (balance, left) = if total_price_left < card.current_balance {
        (card.current_balance - total_price_left, Decimal::ZERO)
    } else {
        (Decimal::ZERO, total_price_left - card.current_balance)
    };

    let mut active: gift_card::ActiveModel = card.into();
    active.current_balance = Set(balance);
    active.last_used_on = Set(Some(Utc::now()));
    active.update(conn).await?;

    Ok(left)
}

impl WishlistService {
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn add_gift_card_code_to_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        promo_code: &str,
    ) -> Result<(), ServiceError> {
        let card = find_active_gift_card(conn, promo_code)
            .await?
            .ok_or(ServiceError::InvalidPromoCode)?;

        if wl.gift_cards.iter().any(|attached| attached.id == card.id) {
            return Ok(());
        }
        if !wl.persisted {
            return Err(ServiceError::InvalidOperation(
                "Cannot attach gift cards to an unsaved wishlist".into(),
            ));
        }

        wishlist_gift_card::ActiveModel {
            wishlist_token: Set(wl.token()),
            gift_card_id: Set(card.id),
        }
        .insert(conn)
        .await?;
        self.save(conn, wl).await?;
        self.reload(conn, wl).await?;

        info!(gift_card_id = %card.id, "Gift card attached");
        self.event_sender
            .send_or_log(Event::GiftCardApplied {
                wishlist_token: wl.token(),
                gift_card_id: card.id,
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn remove_gift_card_code_from_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        promo_code: &str,
    ) -> Result<(), ServiceError> {
        let ids: Vec<Uuid> = wl
            .gift_cards
            .iter()
            .filter(|card| card.code == promo_code)
            .map(|card| card.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        wishlist_gift_card::Entity::delete_many()
            .filter(wishlist_gift_card::Column::WishlistToken.eq(wl.token()))
            .filter(wishlist_gift_card::Column::GiftCardId.is_in(ids))
            .exec(conn)
            .await?;
        self.save(conn, wl).await?;
        self.reload(conn, wl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::wishlist;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn card(end_in_days: Option<i64>) -> gift_card::Model {
        let now = Utc::now();
        gift_card::Model {
            id: Uuid::new_v4(),
            code: "GIFT".into(),
            initial_balance: dec!(50),
            current_balance: dec!(50),
            currency: "USD".into(),
            is_active: true,
            start_date: now - Duration::days(10),
            end_date: end_in_days.map(|days| now + Duration::days(days)),
            last_used_on: None,
        }
    }

    #[test]
    fn expired_cards_fail_validation() {
        let mut wl = LoadedWishlist::unsaved(wishlist::Model::new_unsaved(None, "USD"), None);
        wl.gift_cards = vec![card(None), card(Some(3))];
        assert!(validate_gift_cards(&wl).is_ok());

        wl.gift_cards.push(card(Some(-1)));
        match validate_gift_cards(&wl) {
            Err(ServiceError::NotApplicable(msg)) => assert_eq!(msg, GIFT_CARD_EXPIRED),
            other => panic!("unexpected {:?}", other),
        }
    }
}
