mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;
use wishlist_api::{
    entities::{address, shipping_method, ShippingMethodType},
    services::wishlist::LoadedWishlist,
};

/// Three $10 units weighing 1 each
async fn three_lamps(app: &TestApp) -> LoadedWishlist {
    let variant = app.create_variant(dec!(10), 10, true).await;
    let mut wl = app
        .service()
        .get_or_create_anonymous_wishlist_from_token(app.db(), Uuid::new_v4())
        .await
        .unwrap();
    app.service()
        .add_variant_to_wishlist(app.db(), &mut wl, &variant, 3, false, true)
        .await
        .unwrap();
    wl
}

async fn limit_method(
    app: &TestApp,
    method: shipping_method::Model,
    method_type: ShippingMethodType,
    min: Option<Decimal>,
    max: Option<Decimal>,
) -> shipping_method::Model {
    let mut active: shipping_method::ActiveModel = method.into();
    active.method_type = Set(method_type);
    match method_type {
        ShippingMethodType::PriceBased => {
            active.minimum_order_price = Set(min);
            active.maximum_order_price = Set(max);
        }
        ShippingMethodType::WeightBased => {
            active.minimum_order_weight = Set(min);
            active.maximum_order_weight = Set(max);
        }
    }
    active.update(app.db()).await.unwrap()
}

#[tokio::test]
async fn methods_outside_their_price_or_weight_band_are_skipped() {
    let app = TestApp::new().await;
    let cheap = app.create_shipping(&["US"], dec!(3)).await;
    let zone_id = cheap.shipping_zone_id;
    limit_method(&app, cheap, ShippingMethodType::PriceBased, None, Some(dec!(20))).await;

    let light = app.create_method(zone_id, "Light", dec!(4)).await;
    limit_method(&app, light, ShippingMethodType::WeightBased, None, Some(dec!(2))).await;

    let standard = app.create_method(zone_id, "Standard", dec!(5)).await;
    limit_method(&app, standard, ShippingMethodType::PriceBased, Some(dec!(25)), None).await;

    let heavy = app.create_method(zone_id, "Heavy", dec!(6)).await;
    limit_method(
        &app,
        heavy,
        ShippingMethodType::WeightBased,
        Some(dec!(2)),
        Some(dec!(5)),
    )
    .await;

    let wl = three_lamps(&app).await;
    let methods = app
        .service()
        .applicable_shipping_methods(app.db(), &wl, dec!(30), Some("US"))
        .await
        .unwrap()
        .expect("the wishlist ships");
    let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["Standard", "Heavy"]);

    let estimate = app
        .service()
        .get_shipping_price_estimate(app.db(), &wl, "US")
        .await
        .unwrap()
        .expect("an estimate");
    assert_eq!(estimate.start.gross, dec!(5));
    assert_eq!(estimate.stop.gross, dec!(6));
}

#[tokio::test]
async fn no_zone_for_the_country_means_no_methods() {
    let app = TestApp::new().await;
    app.create_shipping(&["US"], dec!(5)).await;
    let wl = three_lamps(&app).await;

    let methods = app
        .service()
        .applicable_shipping_methods(app.db(), &wl, dec!(30), Some("DE"))
        .await
        .unwrap();
    assert_eq!(methods.map(|m| m.len()), Some(0));
}

#[tokio::test]
async fn replaced_anonymous_address_is_deleted() {
    let app = TestApp::new().await;
    let mut wl = three_lamps(&app).await;
    let first = app.create_address(None, "Washington").await;
    let second = app.create_address(None, "Arlington").await;

    app.service()
        .change_shipping_address_in_wishlist(app.db(), &mut wl, Some(first.clone()))
        .await
        .unwrap();
    app.service()
        .change_shipping_address_in_wishlist(app.db(), &mut wl, Some(second.clone()))
        .await
        .unwrap();

    assert_eq!(wl.wishlist.shipping_address_id, Some(second.id));
    let gone = address::Entity::find_by_id(first.id).one(app.db()).await.unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn replaced_book_address_is_kept() {
    let app = TestApp::new().await;
    let user = app.create_user("grace@example.com").await;
    let mut wl = three_lamps(&app).await;
    app.service()
        .change_wishlist_user(app.db(), &mut wl, &user)
        .await
        .unwrap();

    let book_entry = app.create_address(Some(user.id), "Washington").await;
    let fresh = app.create_address(None, "Arlington").await;

    app.service()
        .change_shipping_address_in_wishlist(app.db(), &mut wl, Some(book_entry.clone()))
        .await
        .unwrap();
    app.service()
        .change_shipping_address_in_wishlist(app.db(), &mut wl, Some(fresh.clone()))
        .await
        .unwrap();

    assert_eq!(wl.wishlist.shipping_address_id, Some(fresh.id));
    let kept = address::Entity::find_by_id(book_entry.id).one(app.db()).await.unwrap();
    assert!(kept.is_some());
}
