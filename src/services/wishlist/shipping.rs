use std::collections::BTreeSet;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::{shipping_method, shipping_zone};
use crate::errors::ServiceError;
use crate::money::{MoneyRange, TaxedMoney, TaxedMoneyRange};

use super::{LoadedWishlist, WishlistService};

impl WishlistService {
    /// Methods that can ship this wishlist to `country` (the shipping address's
    /// country when not given). `None` when nothing ships or no country is known.
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn applicable_shipping_methods<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        subtotal: Decimal,
        country: Option<&str>,
    ) -> Result<Option<Vec<shipping_method::Model>>, ServiceError> {
        if !wl.is_shipping_required() {
            return Ok(None);
        }
        let Some(country) = country.or_else(|| wl.country()) else {
            return Ok(None);
        };

        let zone_ids: Vec<Uuid> = shipping_zone::Entity::find()
            .all(conn)
            .await?
            .into_iter()
            .filter(|zone| zone.covers(country))
            .map(|zone| zone.id)
            .collect();
        if zone_ids.is_empty() {
            debug!(country, "No shipping zone covers country");
            return Ok(Some(Vec::new()));
        }

        let weight = wl.total_weight();
        let methods = shipping_method::Entity::find()
            .filter(shipping_method::Column::ShippingZoneId.is_in(zone_ids))
            .order_by_asc(shipping_method::Column::Price)
            .order_by_asc(shipping_method::Column::Name)
            .all(conn)
            .await?
            .into_iter()
            .filter(|method| method.accepts(subtotal, weight))
            .collect();
        Ok(Some(methods))
    }

    /// Applicable methods measured against the taxed subtotal
    pub async fn get_valid_shipping_methods_for_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        country: Option<&str>,
    ) -> Result<Option<Vec<shipping_method::Model>>, ServiceError> {
        let subtotal = self.calculate_subtotal(wl)?.gross;
        self.applicable_shipping_methods(conn, wl, subtotal, country)
            .await
    }

    /// Valid methods paired with their taxed price
    pub async fn priced_shipping_methods<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
    ) -> Result<Vec<(shipping_method::Model, TaxedMoney)>, ServiceError> {
        let methods = self
            .get_valid_shipping_methods_for_wishlist(conn, wl, None)
            .await?
            .unwrap_or_default();
        methods
            .into_iter()
            .map(|method| {
                let price = self
                    .taxes
                    .apply_taxes_to_shipping(method.price, wl.currency(), wl.country())?
                    .quantize();
                Ok((method, price))
            })
            .collect()
    }

    /// Checks the selected method against the valid ones and clears it when it
    /// is not among them
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn is_valid_shipping_method<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<bool, ServiceError> {
        let valid = self
            .get_valid_shipping_methods_for_wishlist(conn, wl, None)
            .await?;
        let is_valid = match (valid, wl.wishlist.shipping_method_id) {
            (Some(methods), Some(selected)) => methods.iter().any(|m| m.id == selected),
            _ => false,
        };
        if !is_valid {
            self.clear_shipping_method(conn, wl).await?;
        }
        Ok(is_valid)
    }

    pub async fn clear_shipping_method<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        if wl.wishlist.shipping_method_id.is_none() {
            return Ok(());
        }
        wl.wishlist.shipping_method_id = None;
        wl.shipping_method = None;
        self.save(conn, wl).await
    }

    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn set_shipping_method<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        method_id: Uuid,
    ) -> Result<(), ServiceError> {
        wl.wishlist.shipping_method_id = Some(method_id);
        self.save(conn, wl).await?;
        self.reload(conn, wl).await
    }

    /// Min-max taxed price of the methods valid for `country`
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn get_shipping_price_estimate<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        country: &str,
    ) -> Result<Option<TaxedMoneyRange>, ServiceError> {
        let Some(methods) = self
            .get_valid_shipping_methods_for_wishlist(conn, wl, Some(country))
            .await?
        else {
            return Ok(None);
        };

        let prices = methods.iter().map(|m| m.price);
        let (Some(start), Some(stop)) = (prices.clone().min(), prices.max()) else {
            return Ok(None);
        };

        let range = MoneyRange {
            start,
            stop,
            currency: wl.currency().to_string(),
        };
        Ok(Some(
            self.taxes
                .apply_taxes_to_shipping_price_range(&range, Some(country))?,
        ))
    }

    /// Every country some shipping zone covers, sorted
    pub async fn available_countries<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<String>, ServiceError> {
        let countries: BTreeSet<String> = shipping_zone::Entity::find()
            .all(conn)
            .await?
            .iter()
            .flat_map(|zone| zone.country_codes())
            .collect();
        Ok(countries.into_iter().collect())
    }
}
