use std::collections::HashSet;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QuerySelect, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{gift_card, product_collection, voucher, voucher_customer, VoucherType};
use crate::errors::{ServiceError, WishlistErrorCode};
use crate::events::Event;
use crate::money::format_money;

use super::forms::{FormErrors, Validated, WishlistVoucherForm};
use super::{LoadedWishlist, WishlistService};

pub const ONCE_PER_CUSTOMER: &str = "This offer is valid only once per customer.";

/// Discount of a products voucher over the given unit prices: the cheapest
/// unit only when the voucher applies once per order, every unit otherwise
pub fn get_products_voucher_discount(voucher: &voucher::Model, prices: &[Decimal]) -> Decimal {
    if voucher.apply_once_per_order {
        return prices
            .iter()
            .min()
            .map(|price| voucher.get_discount_amount_for(*price))
            .unwrap_or(Decimal::ZERO);
    }
    prices
        .iter()
        .map(|price| voucher.get_discount_amount_for(*price))
        .sum()
}

/// Looks a voucher up by code and keeps it only while active
pub async fn find_active_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    with_lock: bool,
) -> Result<Option<voucher::Model>, ServiceError> {
    let mut query = voucher::Entity::find().filter(voucher::Column::Code.eq(code));
    if with_lock {
        query = query.lock_exclusive();
    }
    let found = query.one(conn).await?;
    Ok(found.filter(|v| v.is_active_at(Utc::now())))
}

async fn voucher_code_exists<C: ConnectionTrait>(conn: &C, code: &str) -> Result<bool, ServiceError> {
    let count = voucher::Entity::find()
        .filter(voucher::Column::Code.eq(code))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn gift_card_code_exists<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<bool, ServiceError> {
    let count = gift_card::Entity::find()
        .filter(gift_card::Column::Code.eq(code))
        .count(conn)
        .await?;
    Ok(count > 0)
}

pub async fn increase_voucher_usage<C: ConnectionTrait>(
    conn: &C,
    voucher: &voucher::Model,
) -> Result<(), ServiceError> {
    voucher::Entity::update_many()
        .col_expr(
            voucher::Column::Used,
            Expr::col(voucher::Column::Used).add(1),
        )
        .filter(voucher::Column::Id.eq(voucher.id))
        .exec(conn)
        .await?;
    counter!("wishlist.voucher_usage", 1);
    Ok(())
}

pub async fn decrease_voucher_usage<C: ConnectionTrait>(
    conn: &C,
    voucher: &voucher::Model,
) -> Result<(), ServiceError> {
    voucher::Entity::update_many()
        .col_expr(
            voucher::Column::Used,
            Expr::col(voucher::Column::Used).sub(1),
        )
        .filter(voucher::Column::Id.eq(voucher.id))
        .filter(voucher::Column::Used.gt(0))
        .exec(conn)
        .await?;
    Ok(())
}

/// Records that `email` used the voucher; a second use is not applicable
pub async fn add_voucher_usage_by_customer<C: ConnectionTrait>(
    conn: &C,
    voucher: &voucher::Model,
    email: &str,
) -> Result<(), ServiceError> {
    let used = voucher_customer::Entity::find()
        .filter(voucher_customer::Column::VoucherId.eq(voucher.id))
        .filter(voucher_customer::Column::CustomerEmail.eq(email))
        .count(conn)
        .await?;
    if used > 0 {
        return Err(ServiceError::NotApplicable(ONCE_PER_CUSTOMER.into()));
    }

    voucher_customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        voucher_id: Set(voucher.id),
        customer_email: Set(email.to_string()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

pub async fn remove_voucher_usage_by_customer<C: ConnectionTrait>(
    conn: &C,
    voucher: &voucher::Model,
    email: &str,
) -> Result<(), ServiceError> {
    voucher_customer::Entity::delete_many()
        .filter(voucher_customer::Column::VoucherId.eq(voucher.id))
        .filter(voucher_customer::Column::CustomerEmail.eq(email))
        .exec(conn)
        .await?;
    Ok(())
}

impl WishlistService {
    /// Minimum spent, minimum quantity and once-per-customer rules
    pub async fn validate_voucher_for_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        voucher: &voucher::Model,
        wl: &LoadedWishlist,
    ) -> Result<(), ServiceError> {
        if let Some(min_spent) = voucher.min_spent {
            let subtotal = self.calculate_subtotal(wl)?.gross;
            if subtotal < min_spent {
                return Err(ServiceError::NotApplicable(format!(
                    "This offer is only valid for orders over {}.",
                    format_money(min_spent, wl.currency())
                )));
            }
        }

        if let Some(min_quantity) = voucher.min_checkout_items_quantity {
            if wl.quantity() < min_quantity {
                return Err(ServiceError::NotApplicable(format!(
                    "This offer is only valid for orders with a minimum of {} quantity.",
                    min_quantity
                )));
            }
        }

        if voucher.apply_once_per_customer {
            if let Some(email) = wl.customer_email() {
                let used = voucher_customer::Entity::find()
                    .filter(voucher_customer::Column::VoucherId.eq(voucher.id))
                    .filter(voucher_customer::Column::CustomerEmail.eq(email))
                    .count(conn)
                    .await?;
                if used > 0 {
                    return Err(ServiceError::NotApplicable(ONCE_PER_CUSTOMER.into()));
                }
            }
        }
        Ok(())
    }

    /// Unit prices of the lines a specific-product voucher applies to, one
    /// entry per unit. Every line counts when the voucher names no products,
    /// categories or collections.
    pub async fn get_prices_of_discounted_specific_product<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        voucher: &voucher::Model,
    ) -> Result<Vec<Decimal>, ServiceError> {
        let products: HashSet<Uuid> = voucher.product_id_list().into_iter().collect();
        let categories: HashSet<Uuid> = voucher.category_id_list().into_iter().collect();
        let collections: HashSet<Uuid> = voucher.collection_id_list().into_iter().collect();
        let unrestricted = products.is_empty() && categories.is_empty() && collections.is_empty();

        let products_in_collections: HashSet<Uuid> = if collections.is_empty() {
            HashSet::new()
        } else {
            let product_ids: Vec<Uuid> = wl.lines.iter().map(|l| l.variant.product_id).collect();
            product_collection::Entity::find()
                .filter(product_collection::Column::ProductId.is_in(product_ids))
                .all(conn)
                .await?
                .into_iter()
                .filter(|pc| collections.contains(&pc.collection_id))
                .map(|pc| pc.product_id)
                .collect()
        };

        let mut prices = Vec::new();
        for line in &wl.lines {
            let variant = &line.variant;
            let matches = unrestricted
                || products.contains(&variant.product_id)
                || variant
                    .category_id
                    .is_some_and(|category| categories.contains(&category))
                || products_in_collections.contains(&variant.product_id);
            if !matches {
                continue;
            }

            let unit_price = self
                .calculate_line_total(wl, line)?
                .per_unit(line.line.quantity)
                .gross;
            prices.extend(std::iter::repeat(unit_price).take(line.line.quantity.max(0) as usize));
        }
        Ok(prices)
    }

    /// Discount the voucher gives on this wishlist, or `NotApplicable`
    #[instrument(skip(self, conn, voucher, wl), fields(code = %voucher.code, wishlist_token = %wl.token()))]
    pub async fn get_voucher_discount_for_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        voucher: &voucher::Model,
        wl: &LoadedWishlist,
    ) -> Result<Decimal, ServiceError> {
        self.validate_voucher_for_wishlist(conn, voucher, wl).await?;

        match voucher.voucher_type {
            VoucherType::EntireOrder => {
                let subtotal = self.calculate_subtotal(wl)?.gross;
                Ok(voucher.get_discount_amount_for(subtotal))
            }
            VoucherType::Shipping => {
                if !wl.is_shipping_required() {
                    return Err(ServiceError::NotApplicable(
                        "Your order does not require shipping.".into(),
                    ));
                }
                if wl.shipping_method.is_none() {
                    return Err(ServiceError::NotApplicable(
                        "Please select a shipping method first.".into(),
                    ));
                }
                let countries = voucher.country_codes();
                if !countries.is_empty()
                    && !wl
                        .country()
                        .is_some_and(|country| countries.iter().any(|c| c == country))
                {
                    return Err(ServiceError::NotApplicable(
                        "This offer is not valid in your country.".into(),
                    ));
                }
                let shipping_price = self.calculate_shipping(wl)?.gross;
                Ok(voucher.get_discount_amount_for(shipping_price))
            }
            VoucherType::SpecificProduct => {
                let prices = self
                    .get_prices_of_discounted_specific_product(conn, wl, voucher)
                    .await?;
                if prices.is_empty() {
                    return Err(ServiceError::NotApplicable(
                        "This offer is only valid for selected items.".into(),
                    ));
                }
                Ok(get_products_voucher_discount(voucher, &prices))
            }
        }
    }

    /// The active voucher matching the wishlist's code, optionally row-locked
    pub async fn get_voucher_for_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &LoadedWishlist,
        with_lock: bool,
    ) -> Result<Option<voucher::Model>, ServiceError> {
        match wl.wishlist.voucher_code.as_deref() {
            Some(code) => find_active_voucher(conn, code, with_lock).await,
            None => Ok(None),
        }
    }

    /// Refreshes the stored discount, dropping a voucher that no longer applies
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn recalculate_wishlist_discount<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        let Some(voucher) = self.get_voucher_for_wishlist(conn, wl, false).await? else {
            return self.remove_voucher_from_wishlist(conn, wl).await;
        };

        match self.get_voucher_discount_for_wishlist(conn, &voucher, wl).await {
            Ok(discount) => {
                let subtotal = self.calculate_subtotal(wl)?.gross;
                wl.wishlist.discount_amount = if voucher.voucher_type == VoucherType::Shipping {
                    discount
                } else {
                    discount.min(subtotal)
                };
                wl.wishlist.discount_name = Some(voucher.to_string());
                self.save(conn, wl).await
            }
            Err(ServiceError::NotApplicable(reason)) => {
                warn!(code = %voucher.code, %reason, "Voucher no longer applies");
                self.remove_voucher_from_wishlist(conn, wl).await
            }
            Err(e) => Err(e),
        }
    }

    /// Attaches a voucher or, failing that, a gift card
    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn add_promo_code_to_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        promo_code: &str,
    ) -> Result<(), ServiceError> {
        if voucher_code_exists(conn, promo_code).await? {
            self.add_voucher_code_to_wishlist(conn, wl, promo_code)
                .await
        } else if gift_card_code_exists(conn, promo_code).await? {
            self.add_gift_card_code_to_wishlist(conn, wl, promo_code)
                .await
        } else {
            Err(ServiceError::InvalidPromoCode)
        }
    }

    pub async fn add_voucher_code_to_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        voucher_code: &str,
    ) -> Result<(), ServiceError> {
        let voucher = find_active_voucher(conn, voucher_code, false)
            .await?
            .ok_or(ServiceError::InvalidPromoCode)?;

        match self.add_voucher_to_wishlist(conn, wl, &voucher).await {
            Err(ServiceError::NotApplicable(_)) => Err(ServiceError::invalid(
                WishlistErrorCode::VoucherNotApplicable,
                "Voucher is not applicable to that wishlist.",
            )),
            other => other,
        }
    }

    #[instrument(skip(self, conn, wl, voucher), fields(wishlist_token = %wl.token(), code = %voucher.code))]
    pub async fn add_voucher_to_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        voucher: &voucher::Model,
    ) -> Result<(), ServiceError> {
        let discount = self
            .get_voucher_discount_for_wishlist(conn, voucher, wl)
            .await?;

        wl.wishlist.voucher_code = Some(voucher.code.clone());
        wl.wishlist.discount_name = Some(voucher.to_string());
        wl.wishlist.discount_amount = discount;
        self.save(conn, wl).await?;

        info!(%discount, "Voucher applied");
        self.event_sender
            .send_or_log(Event::VoucherApplied {
                wishlist_token: wl.token(),
                code: voucher.code.clone(),
                discount,
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self, conn, wl), fields(wishlist_token = %wl.token()))]
    pub async fn remove_promo_code_from_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        promo_code: &str,
    ) -> Result<(), ServiceError> {
        if voucher_code_exists(conn, promo_code).await? {
            self.remove_voucher_code_from_wishlist(conn, wl, promo_code)
                .await
        } else if gift_card_code_exists(conn, promo_code).await? {
            self.remove_gift_card_code_from_wishlist(conn, wl, promo_code)
                .await
        } else {
            Ok(())
        }
    }

    pub async fn remove_voucher_code_from_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        voucher_code: &str,
    ) -> Result<(), ServiceError> {
        if wl.wishlist.voucher_code.as_deref() == Some(voucher_code) {
            self.remove_voucher_from_wishlist(conn, wl).await?;
        }
        Ok(())
    }

    pub async fn remove_voucher_from_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
    ) -> Result<(), ServiceError> {
        let had_voucher = wl.wishlist.voucher_code.is_some();
        wl.wishlist.voucher_code = None;
        wl.wishlist.discount_name = None;
        wl.wishlist.discount_amount = Decimal::ZERO;
        self.save(conn, wl).await?;

        if had_voucher {
            self.event_sender
                .send_or_log(Event::VoucherRemoved(wl.token()))
                .await;
        }
        Ok(())
    }

    /// Applies the discount code box: an active voucher, or else an active gift card
    pub async fn apply_voucher_form<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        form: &WishlistVoucherForm,
    ) -> Result<Validated<()>, ServiceError> {
        let code = match form.code() {
            Ok(code) => code,
            Err(errors) => return Ok(Err(errors)),
        };

        if let Some(voucher) = find_active_voucher(conn, &code, false).await? {
            return match self.add_voucher_to_wishlist(conn, wl, &voucher).await {
                Ok(()) => Ok(Ok(())),
                Err(ServiceError::NotApplicable(reason)) => {
                    Ok(Err(FormErrors::single("voucher", reason)))
                }
                Err(e) => Err(e),
            };
        }

        match self.add_gift_card_code_to_wishlist(conn, wl, &code).await {
            Ok(()) => Ok(Ok(())),
            Err(ServiceError::InvalidPromoCode) => Ok(Err(FormErrors::single(
                "voucher",
                WishlistVoucherForm::INVALID_CODE,
            ))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DiscountValueType;
    use rust_decimal_macros::dec;
    use sea_orm::prelude::Json;

    fn voucher(value_type: DiscountValueType, value: Decimal, once_per_order: bool) -> voucher::Model {
        voucher::Model {
            id: Uuid::new_v4(),
            code: "SAVE".into(),
            name: None,
            voucher_type: VoucherType::SpecificProduct,
            discount_value_type: value_type,
            discount_value: value,
            min_spent: None,
            min_checkout_items_quantity: None,
            countries: Json::Array(vec![]),
            product_ids: Json::Array(vec![]),
            category_ids: Json::Array(vec![]),
            collection_ids: Json::Array(vec![]),
            usage_limit: None,
            used: 0,
            start_date: Utc::now(),
            end_date: None,
            apply_once_per_order: once_per_order,
            apply_once_per_customer: false,
        }
    }

    #[test]
    fn once_per_order_discounts_cheapest_unit() {
        let v = voucher(DiscountValueType::Fixed, dec!(5), true);
        let prices = [dec!(10), dec!(3), dec!(10)];
        assert_eq!(get_products_voucher_discount(&v, &prices), dec!(3));
    }

    #[test]
    fn discount_applies_to_every_unit() {
        let v = voucher(DiscountValueType::Percentage, dec!(10), false);
        let prices = [dec!(10), dec!(10), dec!(25)];
        assert_eq!(get_products_voucher_discount(&v, &prices), dec!(4.50));
    }

    #[test]
    fn no_prices_means_no_discount() {
        let v = voucher(DiscountValueType::Fixed, dec!(5), true);
        assert_eq!(get_products_voucher_discount(&v, &[]), Decimal::ZERO);
    }
}
