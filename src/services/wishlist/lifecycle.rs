use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{user, wishlist};
use crate::errors::ServiceError;
use crate::events::Event;

use super::{LoadedWishlist, WishlistService};

/// Whether a cookie value can be a wishlist token
pub fn token_is_valid(token: Option<&str>) -> bool {
    parse_token(token).is_some()
}

pub fn parse_token(token: Option<&str>) -> Option<Uuid> {
    token.and_then(|t| Uuid::parse_str(t.trim()).ok())
}

impl WishlistService {
    async fn create_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        token: Uuid,
        user: Option<&user::Model>,
    ) -> Result<LoadedWishlist, ServiceError> {
        let now = Utc::now();
        let row = wishlist::ActiveModel {
            token: Set(token),
            user_id: Set(user.map(|u| u.id)),
            email: Set(user.map(|u| u.email.clone())),
            shipping_address_id: Set(user.and_then(|u| u.default_shipping_address_id)),
            billing_address_id: Set(user.and_then(|u| u.default_billing_address_id)),
            shipping_method_id: Set(None),
            voucher_code: Set(None),
            discount_amount: Set(rust_decimal::Decimal::ZERO),
            discount_name: Set(None),
            note: Set(String::new()),
            quantity: Set(0),
            currency: Set(self.config.default_currency.clone()),
            created_at: Set(now),
            last_change: Set(now),
        };
        let model = row.insert(conn).await?;
        info!(wishlist_token = %model.token, user_id = ?model.user_id, "Wishlist created");
        self.event_sender
            .send_or_log(Event::WishlistCreated(model.token))
            .await;
        self.load(conn, model).await
    }

    /// Returns the ownerless wishlist behind `token`, creating it when missing
    #[instrument(skip(self, conn))]
    pub async fn get_or_create_anonymous_wishlist_from_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        token: Uuid,
    ) -> Result<LoadedWishlist, ServiceError> {
        if let Some(wl) = self.get_anonymous_wishlist_from_token(conn, token).await? {
            return Ok(wl);
        }

        // The token may belong to a wishlist that has since been assigned to a user
        let taken = wishlist::Entity::find_by_id(token).one(conn).await?.is_some();
        let token = if taken { Uuid::new_v4() } else { token };
        self.create_wishlist(conn, token, None).await
    }

    #[instrument(skip(self, conn))]
    pub async fn get_anonymous_wishlist_from_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        token: Uuid,
    ) -> Result<Option<LoadedWishlist>, ServiceError> {
        let found = wishlist::Entity::find_by_id(token)
            .filter(wishlist::Column::UserId.is_null())
            .one(conn)
            .await?;
        match found {
            Some(model) => Ok(Some(self.load(conn, model).await?)),
            None => Ok(None),
        }
    }

    /// The most recently changed wishlist of the user. Extra wishlists are deleted.
    #[instrument(skip(self, conn))]
    pub async fn find_open_wishlist_for_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<Option<wishlist::Model>, ServiceError> {
        let mut wishlists = wishlist::Entity::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .order_by_desc(wishlist::Column::LastChange)
            .all(conn)
            .await?
            .into_iter();

        let open = wishlists.next();
        let extra: Vec<Uuid> = wishlists.map(|w| w.token).collect();
        if !extra.is_empty() {
            warn!(%user_id, count = extra.len(), "Found multiple wishlists for user");
            wishlist::Entity::delete_many()
                .filter(wishlist::Column::Token.is_in(extra))
                .exec(conn)
                .await?;
        }
        Ok(open)
    }

    /// The user's open wishlist. A new one is seeded with the user's default addresses.
    #[instrument(skip(self, conn, user), fields(user_id = %user.id))]
    pub async fn get_user_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &user::Model,
        auto_create: bool,
    ) -> Result<Option<LoadedWishlist>, ServiceError> {
        if let Some(model) = self.find_open_wishlist_for_user(conn, user.id).await? {
            return Ok(Some(self.load(conn, model).await?));
        }
        if !auto_create {
            return Ok(None);
        }
        Ok(Some(self.create_wishlist(conn, Uuid::new_v4(), Some(user)).await?))
    }

    /// Wishlist for a request that needs one to exist (adding a product)
    #[instrument(skip(self, conn, user))]
    pub async fn get_or_create_wishlist_for_request<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: Option<&user::Model>,
        cookie_token: Option<Uuid>,
    ) -> Result<LoadedWishlist, ServiceError> {
        match user {
            Some(user) => self
                .get_user_wishlist(conn, user, true)
                .await?
                .ok_or_else(|| ServiceError::InternalError("wishlist was not created".into())),
            None => {
                let token = cookie_token.unwrap_or_else(Uuid::new_v4);
                self.get_or_create_anonymous_wishlist_from_token(conn, token)
                    .await
            }
        }
    }

    /// Wishlist for a request, or an unsaved empty one when there is none
    #[instrument(skip(self, conn, user))]
    pub async fn get_wishlist_for_request<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: Option<&user::Model>,
        cookie_token: Option<Uuid>,
    ) -> Result<LoadedWishlist, ServiceError> {
        let found = match (user, cookie_token) {
            (Some(user), _) => self.get_user_wishlist(conn, user, false).await?,
            (None, Some(token)) => self.get_anonymous_wishlist_from_token(conn, token).await?,
            (None, None) => None,
        };
        Ok(found.unwrap_or_else(|| {
            LoadedWishlist::unsaved(
                wishlist::Model::new_unsaved(user.map(|u| u.id), &self.config.default_currency),
                user.cloned(),
            )
        }))
    }

    /// Hands the wishlist over to `user`, replacing the user's open wishlist
    #[instrument(skip(self, conn, wl, user), fields(wishlist_token = %wl.token(), user_id = %user.id))]
    pub async fn change_wishlist_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        user: &user::Model,
    ) -> Result<(), ServiceError> {
        if let Some(open) = self.find_open_wishlist_for_user(conn, user.id).await? {
            if open.token != wl.token() {
                wishlist::Entity::delete_by_id(open.token).exec(conn).await?;
            }
        }

        wl.wishlist.user_id = Some(user.id);
        wl.wishlist.shipping_address_id = user.default_shipping_address_id;
        wl.wishlist.billing_address_id = user.default_billing_address_id;
        self.save(conn, wl).await?;
        self.reload(conn, wl).await?;

        info!("Wishlist assigned to user");
        self.event_sender
            .send_or_log(Event::WishlistAssigned {
                wishlist_token: wl.token(),
                user_id: user.id,
            })
            .await;
        Ok(())
    }

    /// Moves the anonymous wishlist from the cookie to the signed-in user.
    /// Returns `true` when a wishlist was merged and the cookie should be cleared.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn find_and_assign_anonymous_wishlist(
        &self,
        user: &user::Model,
        cookie_token: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let Some(token) = cookie_token else {
            return Ok(false);
        };

        let txn = self.db.begin().await?;
        let Some(mut wl) = self.get_anonymous_wishlist_from_token(&txn, token).await? else {
            txn.rollback().await?;
            return Ok(false);
        };
        self.change_wishlist_user(&txn, &mut wl, user).await?;
        txn.commit().await?;

        counter!("wishlist.merged_on_login", 1);
        info!(wishlist_token = %token, "Anonymous wishlist merged on login");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_validation() {
        assert!(token_is_valid(Some("6f1f9b4e-2c4a-4d8e-9d3b-3e0b8f0b6a11")));
        assert!(!token_is_valid(Some("not-a-token")));
        assert!(!token_is_valid(Some("")));
        assert!(!token_is_valid(None));
    }
}
