mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;
use wishlist_api::{
    entities::{product_variant, wishlist},
    errors::ServiceError,
    money::{TaxedMoney, TaxedMoneyRange},
    services::wishlist::lines::STOCK_WARNING,
};

#[tokio::test]
async fn adding_a_variant_twice_accumulates_the_line() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 10, true).await;
    let db = app.db();

    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .expect("wishlist");

    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 2, false, true)
        .await
        .expect("first add");
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 3, false, true)
        .await
        .expect("second add");

    assert_eq!(wl.num_lines(), 1);
    assert_eq!(wl.quantity(), 5);

    let stored = wishlist::Entity::find_by_id(wl.token())
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.quantity, 5);
}

#[tokio::test]
async fn replacing_with_zero_removes_the_line() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 10, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();

    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 4, false, true)
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 0, true, true)
        .await
        .unwrap();

    assert!(wl.is_empty());
    assert_eq!(wl.quantity(), 0);
}

#[tokio::test]
async fn adding_more_than_in_stock_fails() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 3, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();

    let result = app
        .service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 4, false, true)
        .await;

    assert_matches!(
        result,
        Err(ServiceError::InsufficientStock { quantity_available: 3, .. })
    );
    assert!(wl.is_empty());
}

#[tokio::test]
async fn unsaved_wishlists_do_not_take_lines() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 3, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_wishlist_for_request(db, None, None)
        .await
        .unwrap();
    assert!(!wl.persisted);

    let result = app
        .service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 1, false, true)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn lines_over_stock_are_clamped_with_a_warning() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 5, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 5, false, true)
        .await
        .unwrap();

    // Someone else bought three of them
    let mut active: product_variant::ActiveModel = variant.clone().into();
    active.quantity_allocated = Set(3);
    active.update(db).await.unwrap();
    app.service().reload(db, &mut wl).await.unwrap();

    let warning = app
        .service()
        .check_product_availability_and_warn(db, &mut wl)
        .await
        .unwrap();

    assert_eq!(warning, Some(STOCK_WARNING));
    assert_eq!(wl.get_line(variant.id).map(|l| l.line.quantity), Some(2));
    assert_eq!(wl.quantity(), 2);
}

#[tokio::test]
async fn clearing_empties_the_wishlist() {
    let app = TestApp::new().await;
    let lamp = app.create_variant(dec!(10), 5, true).await;
    let shade = app.create_variant(dec!(4), 5, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    for variant in [&lamp, &shade] {
        app.service()
            .add_variant_to_wishlist(db, &mut wl, variant, 1, false, true)
            .await
            .unwrap();
    }
    assert_eq!(wl.num_lines(), 2);

    app.service().clear_wishlist(db, &mut wl).await.unwrap();

    assert!(wl.is_empty());
    assert_eq!(wl.quantity(), 0);
}

#[tokio::test]
async fn subtotal_includes_taxes() {
    let app = TestApp::with_tax_rate(dec!(0.2)).await;
    let variant = app.create_variant(dec!(10), 5, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 3, false, true)
        .await
        .unwrap();

    let subtotal = app.service().calculate_subtotal(&wl).unwrap();
    assert_eq!(subtotal.net, dec!(30));
    assert_eq!(subtotal.gross, dec!(36));
}

#[tokio::test]
async fn line_total_is_rounded_once_per_line() {
    let app = TestApp::with_tax_rate(dec!(0.1)).await;
    let variant = app.create_variant(dec!(1.115), 5, true).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 3, false, true)
        .await
        .unwrap();

    let line = &wl.lines[0];
    let total = app.service().calculate_line_total(&wl, line).unwrap();
    assert_eq!(total.net, dec!(3.35));
    assert_eq!(total.gross, dec!(3.68));

    let unit = app.service().calculate_unit_price(&wl, line).unwrap();
    assert_eq!(unit.net, dec!(1.12));
    assert_eq!(unit.gross, dec!(1.23));
}

#[tokio::test]
async fn shipping_estimate_is_ignored_when_nothing_ships() {
    let app = TestApp::new().await;
    let variant = app.create_variant(dec!(10), 5, false).await;
    let db = app.db();
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(db, Uuid::new_v4())
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(db, &mut wl, &variant, 2, false, true)
        .await
        .unwrap();

    let estimate = TaxedMoneyRange {
        start: TaxedMoney::untaxed(dec!(5), "USD"),
        stop: TaxedMoney::untaxed(dec!(15), "USD"),
    };
    let context = app
        .service()
        .get_wishlist_context(&wl, Some(estimate))
        .unwrap();
    assert!(!context.shipping_required);
    assert_eq!(context.total_with_shipping.start.gross, dec!(20));
    assert_eq!(context.total_with_shipping.stop.gross, dec!(20));
}
