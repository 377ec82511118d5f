//! The checkout wizard: shipping address, shipping method, summary, and
//! the final completion call.

use axum::{extract::State, response::Response, Form};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::services::wishlist::addresses::user_addresses;
use crate::services::wishlist::forms::{FormState, WishlistNoteForm, WishlistShippingMethodForm};
use crate::services::wishlist::{LoadedWishlist, WishlistService};
use crate::AppState;

use super::request::{
    order_payment_path, Outcome, PostData, ViewResult, WishlistRequest, INDEX, SHIPPING_METHOD,
    SUMMARY,
};
use super::validators::{
    add_voucher_form, validate_is_shipping_required, validate_shipping_address,
    validate_shipping_method, validate_voucher, validate_wishlist, VoucherStep,
};

pub const REVIEW_WISHLIST: &str = "Please review your wishlist.";

async fn current_wishlist(
    service: &WishlistService,
    req: &WishlistRequest,
) -> Result<LoadedWishlist, ServiceError> {
    service
        .get_wishlist_for_request(service.db(), req.user.as_ref(), req.cookie_token)
        .await
}

/// Page context shared by every step: the wishlist, the discount box and
/// whatever forms the step adds
fn step_page(
    service: &WishlistService,
    wl: &LoadedWishlist,
    voucher: &VoucherStep,
    extra: Value,
) -> ViewResult {
    let mut context = json!({
        "wishlist": service.get_wishlist_context(wl, None)?,
        "voucher_form": voucher.form,
    });
    if let (Value::Object(map), Value::Object(extra)) = (&mut context, extra) {
        map.extend(extra);
    }
    Ok(Outcome::page(context))
}

pub async fn shipping_address_page(
    State(state): State<AppState>,
    mut req: WishlistRequest,
) -> Response {
    let result = shipping_address_view(&state, &mut req, None).await;
    req.respond(result)
}

pub async fn shipping_address_submit(
    State(state): State<AppState>,
    mut req: WishlistRequest,
    Form(data): Form<PostData>,
) -> Response {
    let result = shipping_address_view(&state, &mut req, data.bound()).await;
    req.respond(result)
}

async fn shipping_address_view(
    state: &AppState,
    req: &mut WishlistRequest,
    data: Option<PostData>,
) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = current_wishlist(service, req).await?;

    validate_voucher(service, req, &mut wl).await?;
    validate_wishlist(&wl)?;
    validate_is_shipping_required(&wl)?;
    let voucher = add_voucher_form(service, req, &mut wl, data).await?;
    let data = voucher.data.clone().and_then(PostData::without_voucher);
    let country = req.country.clone();

    let (forms, updated) = match wl.user.clone() {
        Some(user) => {
            wl.wishlist.email = Some(user.email.clone());
            service.save(conn, &mut wl).await?;
            let addresses = user_addresses(conn, user.id).await?;
            let submitted = data.map(|d| (d.address_choice_form(), d.address_form()));
            let forms = service
                .update_shipping_address_in_wishlist(conn, &mut wl, &addresses, submitted, &country)
                .await?;
            (
                json!({
                    "user_form": forms.choice_form,
                    "address_form": forms.address_form,
                    "addresses": addresses,
                }),
                forms.updated,
            )
        }
        None => {
            let submitted = data.map(|d| (d.email_form(), d.address_form()));
            let forms = service
                .update_shipping_address_in_anonymous_wishlist(conn, &mut wl, submitted, &country)
                .await?;
            (
                json!({
                    "user_form": forms.choice_form,
                    "address_form": forms.address_form,
                }),
                forms.updated,
            )
        }
    };

    if updated {
        return Ok(Outcome::redirect(SHIPPING_METHOD));
    }
    step_page(service, &wl, &voucher, forms)
}

pub async fn shipping_method_page(
    State(state): State<AppState>,
    mut req: WishlistRequest,
) -> Response {
    let result = shipping_method_view(&state, &mut req, None).await;
    req.respond(result)
}

pub async fn shipping_method_submit(
    State(state): State<AppState>,
    mut req: WishlistRequest,
    Form(data): Form<PostData>,
) -> Response {
    let result = shipping_method_view(&state, &mut req, data.bound()).await;
    req.respond(result)
}

async fn shipping_method_view(
    state: &AppState,
    req: &mut WishlistRequest,
    data: Option<PostData>,
) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = current_wishlist(service, req).await?;

    validate_voucher(service, req, &mut wl).await?;
    validate_wishlist(&wl)?;
    validate_shipping_address(&wl)?;
    validate_is_shipping_required(&wl)?;
    let voucher = add_voucher_form(service, req, &mut wl, data).await?;
    let data = voucher.data.clone().and_then(PostData::without_voucher);

    service.is_valid_shipping_method(conn, &mut wl).await?;
    let methods = service.priced_shipping_methods(conn, &wl).await?;
    let valid: Vec<_> = methods.iter().map(|(method, _)| method.clone()).collect();
    let choices =
        WishlistShippingMethodForm::choices(&methods, state.config.display_gross_prices);

    let mut form = match data {
        Some(data) => FormState::bound(data.shipping_method_form()),
        None => FormState::unbound(WishlistShippingMethodForm::initial(
            wl.wishlist.shipping_method_id,
            &valid,
        )),
    }
    .with_choices(choices);

    if form.is_bound {
        match form.data.clean(&valid) {
            Ok(method_id) => {
                service.set_shipping_method(conn, &mut wl, method_id).await?;
                return Ok(Outcome::redirect(SUMMARY));
            }
            Err(errors) => form.errors = errors,
        }
    }

    step_page(
        service,
        &wl,
        &voucher,
        json!({ "shipping_method_form": form }),
    )
}

pub async fn summary_page(State(state): State<AppState>, mut req: WishlistRequest) -> Response {
    let result = summary_view(&state, &mut req, None).await;
    req.respond(result)
}

pub async fn summary_submit(
    State(state): State<AppState>,
    mut req: WishlistRequest,
    Form(data): Form<PostData>,
) -> Response {
    let result = summary_view(&state, &mut req, data.bound()).await;
    req.respond(result)
}

async fn summary_view(
    state: &AppState,
    req: &mut WishlistRequest,
    data: Option<PostData>,
) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = current_wishlist(service, req).await?;

    validate_voucher(service, req, &mut wl).await?;
    validate_wishlist(&wl)?;
    let voucher = add_voucher_form(service, req, &mut wl, data).await?;
    let data = voucher.data.clone().and_then(PostData::without_voucher);

    let shipping_required = wl.is_shipping_required();
    if shipping_required {
        validate_shipping_address(&wl)?;
        validate_shipping_method(service, &mut wl).await?;
    }

    let mut note_form = match data.as_ref() {
        Some(data) => FormState::bound(data.note_form()),
        None => FormState::unbound(WishlistNoteForm {
            note: Some(wl.wishlist.note.clone()),
        }),
    };
    if note_form.is_bound {
        match note_form.data.clean() {
            Ok(note) => {
                wl.wishlist.note = note;
                service.save(conn, &mut wl).await?;
            }
            Err(errors) => note_form.errors = errors,
        }
    }

    let country = req.country.clone();
    let addresses = match wl.user.as_ref() {
        Some(user) => user_addresses(conn, user.id).await?,
        None => Vec::new(),
    };

    let (forms, updated) = if shipping_required {
        let submitted = data.map(|d| (d.billing_choice_form(), d.address_form()));
        let forms = service
            .update_billing_address_in_wishlist_with_shipping(
                conn, &mut wl, &addresses, submitted, &country,
            )
            .await?;
        (
            json!({
                "user_form": forms.choice_form,
                "address_form": forms.address_form,
            }),
            forms.updated,
        )
    } else if wl.user.is_some() {
        let submitted = data.map(|d| (d.address_choice_form(), d.address_form()));
        let forms = service
            .update_billing_address_in_wishlist(conn, &mut wl, &addresses, submitted, &country)
            .await?;
        (
            json!({
                "user_form": forms.choice_form,
                "address_form": forms.address_form,
            }),
            forms.updated,
        )
    } else {
        let submitted = data.map(|d| (d.email_form(), d.address_form()));
        let forms = service
            .update_billing_address_in_anonymous_wishlist(conn, &mut wl, submitted, &country)
            .await?;
        (
            json!({
                "user_form": forms.choice_form,
                "address_form": forms.address_form,
            }),
            forms.updated,
        )
    };

    if updated && note_form.errors.is_empty() {
        return handle_order_placement(service, req, &wl).await;
    }

    let mut extra = forms;
    if let Value::Object(map) = &mut extra {
        map.insert("note_form".into(), json!(note_form));
        map.insert("addresses".into(), json!(addresses));
    }
    step_page(service, &wl, &voucher, extra)
}

/// Places the order and picks where the customer goes next
async fn handle_order_placement(
    service: &WishlistService,
    req: &mut WishlistRequest,
    wl: &LoadedWishlist,
) -> ViewResult {
    match service.place_order(wl, &req.tracking_code).await {
        Ok(order) => {
            info!(order_id = %order.id, "Order placed from wishlist summary");
            Ok(Outcome::redirect(order_payment_path(order.token)))
        }
        Err(ServiceError::InsufficientStock { variant_id, .. }) => {
            warn!(%variant_id, "Stock ran out while placing order");
            Ok(Outcome::redirect(INDEX))
        }
        Err(ServiceError::NotApplicable(reason)) => {
            warn!(%reason, "Voucher no longer applies");
            req.warning(REVIEW_WISHLIST);
            Ok(Outcome::redirect(SUMMARY))
        }
        Err(ServiceError::TaxError(reason)) => {
            req.warning(format!("Unable to calculate taxes - {}", reason));
            Ok(Outcome::redirect(SUMMARY))
        }
        Err(err) => Err(err.into()),
    }
}

/// POST /wishlist/complete/
pub async fn complete(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result = complete_view(&state, &req).await;
    req.respond(result)
}

async fn complete_view(state: &AppState, req: &WishlistRequest) -> ViewResult {
    let service = &state.wishlist_service;
    let mut wl = current_wishlist(service, req).await?;
    if !wl.persisted {
        return Err(ServiceError::NotFound("No wishlist to complete".into()).into());
    }

    let order = service
        .complete_wishlist(&mut wl, &req.tracking_code)
        .await?;
    Ok(Outcome::json(json!({
        "order": { "id": order.id, "token": order.token },
        "next": order_payment_path(order.token),
    })))
}
