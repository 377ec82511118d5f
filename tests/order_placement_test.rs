mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;
use wishlist_api::{
    entities::{
        gift_card, order_gift_card, order_line, payment, product_variant, voucher,
        voucher_customer, wishlist, DiscountValueType, VoucherType,
    },
    errors::{ServiceError, WishlistErrorCode},
    services::wishlist::{
        forms::{AddressForm, AnonymousUserEmailForm},
        order::VOUCHER_EXPIRED,
        LoadedWishlist,
    },
};

fn address_form() -> AddressForm {
    AddressForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        street_address_1: "1 Analytical Way".into(),
        city: "New York".into(),
        postal_code: "10001".into(),
        country: "US".into(),
        ..AddressForm::default()
    }
}

fn email_form() -> AnonymousUserEmailForm {
    AnonymousUserEmailForm {
        email: "ada@example.com".into(),
    }
}

/// An anonymous wishlist with two $10 lamps, a $5 courier and both addresses
async fn ready_wishlist(app: &TestApp) -> (LoadedWishlist, product_variant::Model) {
    let db = app.db();
    let service = app.service();
    let variant = app.create_variant(dec!(10), 10, true).await;
    let method = app.create_shipping(&["US"], dec!(5)).await;

    let mut wl = service
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    service
        .add_variant_to_wishlist(db, &mut wl, &variant, 2, false, true)
        .await
        .unwrap();

    let forms = service
        .update_shipping_address_in_anonymous_wishlist(
            db,
            &mut wl,
            Some((email_form(), address_form())),
            "US",
        )
        .await
        .unwrap();
    assert!(forms.updated);

    service
        .set_shipping_method(db, &mut wl, method.id)
        .await
        .unwrap();

    let forms = service
        .update_billing_address_in_anonymous_wishlist(
            db,
            &mut wl,
            Some((email_form(), address_form())),
            "US",
        )
        .await
        .unwrap();
    assert!(forms.updated);

    (wl, variant)
}

#[tokio::test]
async fn placing_an_order_allocates_stock_and_deletes_the_wishlist() {
    let app = TestApp::new().await;
    let (wl, variant) = ready_wishlist(&app).await;
    let db = app.db();

    let order = app
        .service()
        .place_order(&wl, "web-client")
        .await
        .expect("order placed");

    assert_eq!(order.wishlist_token, wl.token());
    assert_eq!(order.total_gross, dec!(25));
    assert_eq!(order.shipping_price_gross, dec!(5));
    assert_eq!(order.user_email.as_deref(), Some("ada@example.com"));
    assert_eq!(order.tracking_client_id, "web-client");
    assert!(order.shipping_address_id.is_some());
    assert!(order.billing_address_id.is_some());

    let lines = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(order.id))
        .all(db)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].unit_price_gross, dec!(10));

    let variant = product_variant::Entity::find_by_id(variant.id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variant.quantity_allocated, 2);

    let remaining = wishlist::Entity::find_by_id(wl.token())
        .one(db)
        .await
        .unwrap();
    assert!(remaining.is_none());
}

#[tokio::test]
async fn creating_the_same_order_twice_returns_the_first() {
    let app = TestApp::new().await;
    let (wl, _) = ready_wishlist(&app).await;
    let db = app.db();
    let service = app.service();

    let data = service.prepare_order_data(db, &wl, "web").await.unwrap();
    let (first, created) = service.create_order(db, &wl, data.clone()).await.unwrap();
    assert!(created);

    let (second, created) = service.create_order(db, &wl, data).await.unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);

    let lines = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(first.id))
        .count(db)
        .await
        .unwrap();
    assert_eq!(lines, 1);
}

#[tokio::test]
async fn voucher_usage_is_recorded_with_the_order() {
    let app = TestApp::new().await;
    let promo = app
        .create_voucher("FIVEOFF", VoucherType::EntireOrder, DiscountValueType::Fixed, dec!(5))
        .await;
    let mut active: voucher::ActiveModel = promo.clone().into();
    active.apply_once_per_customer = Set(true);
    active.update(app.db()).await.unwrap();

    let (mut wl, _) = ready_wishlist(&app).await;
    app.service()
        .add_promo_code_to_wishlist(app.db(), &mut wl, "FIVEOFF")
        .await
        .unwrap();

    let order = app.service().place_order(&wl, "web").await.unwrap();
    assert_eq!(order.voucher_id, Some(promo.id));
    assert_eq!(order.discount_amount, dec!(5));
    assert_eq!(order.total_gross, dec!(20));

    let promo = voucher::Entity::find_by_id(promo.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo.used, 1);

    let usages = voucher_customer::Entity::find()
        .filter(voucher_customer::Column::VoucherId.eq(promo.id))
        .filter(voucher_customer::Column::CustomerEmail.eq("ada@example.com"))
        .count(app.db())
        .await
        .unwrap();
    assert_eq!(usages, 1);
}

#[tokio::test]
async fn placing_again_does_not_count_the_voucher_twice() {
    let app = TestApp::new().await;
    let promo = app
        .create_voucher("ONCE", VoucherType::EntireOrder, DiscountValueType::Fixed, dec!(5))
        .await;
    let (mut wl, _) = ready_wishlist(&app).await;
    let db = app.db();
    let service = app.service();
    service
        .add_promo_code_to_wishlist(db, &mut wl, "ONCE")
        .await
        .unwrap();

    // an order written earlier while the wishlist row survived
    let data = service.prepare_order_data(db, &wl, "web").await.unwrap();
    let (first, created) = service.create_order(db, &wl, data).await.unwrap();
    assert!(created);

    let second = service.place_order(&wl, "web").await.unwrap();
    assert_eq!(second.id, first.id);

    let third = service.place_order(&wl, "web").await.unwrap();
    assert_eq!(third.id, first.id);

    let promo = voucher::Entity::find_by_id(promo.id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo.used, 1);

    let remaining = wishlist::Entity::find_by_id(wl.token()).one(db).await.unwrap();
    assert!(remaining.is_none());
}

#[tokio::test]
async fn expired_voucher_aborts_placement_and_keeps_the_wishlist() {
    let app = TestApp::new().await;
    let promo = app
        .create_voucher("SHORT", VoucherType::EntireOrder, DiscountValueType::Fixed, dec!(5))
        .await;
    let (mut wl, _) = ready_wishlist(&app).await;
    app.service()
        .add_promo_code_to_wishlist(app.db(), &mut wl, "SHORT")
        .await
        .unwrap();

    let mut active: voucher::ActiveModel = promo.into();
    active.end_date = Set(Some(Utc::now() - Duration::hours(1)));
    active.update(app.db()).await.unwrap();

    let result = app.service().place_order(&wl, "web").await;
    assert_matches!(result, Err(ServiceError::NotApplicable(reason)) if reason == VOUCHER_EXPIRED);

    let remaining = wishlist::Entity::find_by_id(wl.token())
        .one(app.db())
        .await
        .unwrap();
    assert!(remaining.is_some());
}

#[tokio::test]
async fn gift_cards_are_spent_on_the_order() {
    let app = TestApp::new().await;
    let card = app.create_gift_card("GIFT-15", dec!(15)).await;
    let (mut wl, _) = ready_wishlist(&app).await;
    app.service()
        .add_promo_code_to_wishlist(app.db(), &mut wl, "GIFT-15")
        .await
        .unwrap();

    let order = app.service().place_order(&wl, "web").await.unwrap();
    assert_eq!(order.total_gross, dec!(10));

    let card = gift_card::Entity::find_by_id(card.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.current_balance, dec!(0));
    assert!(card.last_used_on.is_some());

    let links = order_gift_card::Entity::find()
        .filter(order_gift_card::Column::OrderId.eq(order.id))
        .count(app.db())
        .await
        .unwrap();
    assert_eq!(links, 1);
}

#[tokio::test]
async fn completion_checks_report_error_codes() {
    let app = TestApp::new().await;
    let db = app.db();
    let service = app.service();
    let variant = app.create_variant(dec!(10), 10, true).await;
    let method = app.create_shipping(&["US"], dec!(5)).await;
    let mut wl = service
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    service
        .add_variant_to_wishlist(db, &mut wl, &variant, 1, false, true)
        .await
        .unwrap();

    let err = service.clean_wishlist(db, &mut wl).await.unwrap_err();
    assert_eq!(err.error_code(), Some(WishlistErrorCode::ShippingMethodNotSet));

    service
        .update_shipping_address_in_anonymous_wishlist(
            db,
            &mut wl,
            Some((email_form(), address_form())),
            "US",
        )
        .await
        .unwrap();
    service
        .set_shipping_method(db, &mut wl, method.id)
        .await
        .unwrap();
    let err = service.clean_wishlist(db, &mut wl).await.unwrap_err();
    assert_eq!(err.error_code(), Some(WishlistErrorCode::BillingAddressNotSet));

    service
        .update_billing_address_in_anonymous_wishlist(
            db,
            &mut wl,
            Some((email_form(), address_form())),
            "US",
        )
        .await
        .unwrap();
    let err = service.clean_wishlist(db, &mut wl).await.unwrap_err();
    assert_eq!(err.error_code(), Some(WishlistErrorCode::WishlistNotFullyPaid));

    let paid = app.create_payment(wl.token(), dec!(15)).await;
    let order = service
        .complete_wishlist(&mut wl, "web")
        .await
        .expect("fully paid wishlist completes");

    let paid = payment::Entity::find_by_id(paid.id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.order_id, Some(order.id));
}

#[tokio::test]
async fn empty_wishlist_cannot_be_completed() {
    let app = TestApp::new().await;
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(app.db(), Uuid::new_v4())
        .await
        .unwrap();

    let result = app.service().complete_wishlist(&mut wl, "web").await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn anonymous_wishlist_is_merged_on_login() {
    let app = TestApp::new().await;
    let db = app.db();
    let service = app.service();
    let user = app.create_user("grace@example.com").await;
    let variant = app.create_variant(dec!(10), 10, true).await;

    let previous = service
        .get_user_wishlist(db, &user, true)
        .await
        .unwrap()
        .expect("created");

    let mut anonymous = service
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    service
        .add_variant_to_wishlist(db, &mut anonymous, &variant, 3, false, true)
        .await
        .unwrap();

    let merged = service
        .find_and_assign_anonymous_wishlist(&user, Some(anonymous.token()))
        .await
        .unwrap();
    assert!(merged);

    let current = service
        .get_user_wishlist(db, &user, false)
        .await
        .unwrap()
        .expect("user has a wishlist");
    assert_eq!(current.token(), anonymous.token());
    assert_eq!(current.quantity(), 3);
    assert_eq!(current.customer_email().as_deref(), Some("grace@example.com"));

    let old = wishlist::Entity::find_by_id(previous.token())
        .one(db)
        .await
        .unwrap();
    assert!(old.is_none());

    let again = service
        .find_and_assign_anonymous_wishlist(&user, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(!again);
}
