use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Form,
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entities::product_variant;
use crate::errors::ServiceError;
use crate::money::{format_money, get_display_price, zero_taxed_money};
use crate::services::wishlist::forms::{CountryForm, FormState, ReplaceWishlistLineForm};
use crate::services::wishlist::{LoadedWishlist, WishlistService};
use crate::AppState;

use super::request::{
    Outcome, PostData, ViewResult, WishlistRequest, INDEX, SHIPPING_ADDRESS, START,
};
use super::validators::{validate_is_shipping_required, validate_wishlist};

async fn current_wishlist(
    service: &WishlistService,
    req: &WishlistRequest,
) -> Result<LoadedWishlist, ServiceError> {
    service
        .get_wishlist_for_request(service.db(), req.user.as_ref(), req.cookie_token)
        .await
}

fn line_rows(service: &WishlistService, wl: &LoadedWishlist) -> Result<Vec<Value>, ServiceError> {
    wl.lines
        .iter()
        .map(|line| {
            let unit_price = service.calculate_unit_price(wl, line)?;
            let total = service.calculate_line_total(wl, line)?;
            Ok(json!({
                "variant_id": line.variant.id,
                "product_name": line.variant.product_name,
                "variant_name": line.variant.name,
                "sku": line.variant.sku,
                "quantity": line.line.quantity,
                "unit_price": unit_price,
                "total": total,
                "form": FormState::unbound(ReplaceWishlistLineForm {
                    quantity: Some(line.line.quantity.to_string()),
                }),
            }))
        })
        .collect()
}

/// GET /wishlist/
pub async fn index(State(state): State<AppState>, mut req: WishlistRequest) -> Response {
    let result = index_view(&state, &mut req).await;
    req.respond(result)
}

async fn index_view(state: &AppState, req: &mut WishlistRequest) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = current_wishlist(service, req).await?;

    if let Some(warning) = service
        .check_product_availability_and_warn(conn, &mut wl)
        .await?
    {
        req.warning(warning);
    }
    service.reload(conn, &mut wl).await?;

    let lines = line_rows(service, &wl)?;
    let country = req.country.clone();
    let available = service.available_countries(conn).await?;
    let shipping_range = service
        .get_shipping_price_estimate(conn, &wl, &country)
        .await?;
    let context = service.get_wishlist_context(&wl, shipping_range.clone())?;

    let country_form = FormState::unbound(CountryForm {
        country: Some(country),
    })
    .with_choices(CountryForm::choices(&available));

    Ok(Outcome::page(json!({
        "wishlist": context,
        "wishlist_lines": lines,
        "country_form": country_form,
        "shipping_price_range": shipping_range,
    })))
}

/// POST /wishlist/add/{variant_id}
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    mut req: WishlistRequest,
    Path(variant_id): Path<Uuid>,
    Form(data): Form<PostData>,
) -> Response {
    let result = add_to_wishlist_view(&state, &mut req, variant_id, data).await;
    req.respond(result)
}

async fn add_to_wishlist_view(
    state: &AppState,
    req: &mut WishlistRequest,
    variant_id: Uuid,
    data: PostData,
) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = service
        .get_or_create_wishlist_for_request(conn, req.user.as_ref(), req.cookie_token)
        .await?;
    if req.user.is_none() {
        req.set_wishlist_cookie(wl.token(), state.config.wishlist_cookie_max_age_days)?;
    }

    let variant = product_variant::Entity::find_by_id(variant_id)
        .one(conn)
        .await
        .map_err(ServiceError::from)?;
    let form = data.add_to_wishlist_form();
    let cleaned = form.clean(&wl, variant.as_ref(), state.config.max_line_quantity);

    match (cleaned, variant) {
        (Ok(quantity), Some(variant)) => {
            service
                .add_variant_to_wishlist(conn, &mut wl, &variant, quantity, false, true)
                .await?;
            if req.is_ajax {
                Ok(Outcome::json(json!({ "next": INDEX })))
            } else {
                Ok(Outcome::redirect(INDEX))
            }
        }
        (Err(errors), _) if req.is_ajax => Ok(Outcome::Json {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": errors }),
        }),
        (Err(errors), _) => {
            let mut form_state = FormState::bound(form);
            form_state.errors = errors;
            Ok(Outcome::Page {
                status: StatusCode::BAD_REQUEST,
                context: json!({ "variant_id": variant_id, "form": form_state }),
            })
        }
        (Ok(_), None) => {
            Err(ServiceError::NotFound(format!("Variant {} not found", variant_id)).into())
        }
    }
}

/// GET /wishlist/start/
pub async fn start(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result: ViewResult = async {
        let wl = current_wishlist(&state.wishlist_service, &req).await?;
        validate_wishlist(&wl)?;
        validate_is_shipping_required(&wl)?;
        Ok(Outcome::redirect(SHIPPING_ADDRESS))
    }
    .await;
    req.respond(result)
}

/// POST /wishlist/update/{variant_id}/
pub async fn update_line(
    State(state): State<AppState>,
    req: WishlistRequest,
    Path(variant_id): Path<Uuid>,
    Form(data): Form<PostData>,
) -> Response {
    let result = update_line_view(&state, &req, variant_id, data).await;
    req.respond(result)
}

async fn update_line_view(
    state: &AppState,
    req: &WishlistRequest,
    variant_id: Uuid,
    data: PostData,
) -> ViewResult {
    if !req.is_ajax {
        return Ok(Outcome::redirect(INDEX));
    }
    let service = &state.wishlist_service;
    let conn = service.db();
    let mut wl = current_wishlist(service, req).await?;

    let variant = wl
        .get_line(variant_id)
        .map(|line| line.variant.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("No line for variant {}", variant_id)))?;

    let quantity = match data
        .replace_line_form()
        .clean(&variant, state.config.max_line_quantity)
    {
        Ok(quantity) => quantity,
        Err(errors) => {
            return Ok(Outcome::Json {
                status: StatusCode::BAD_REQUEST,
                body: json!({ "error": errors }),
            })
        }
    };

    service
        .add_variant_to_wishlist(conn, &mut wl, &variant, quantity, true, true)
        .await?;

    let display_gross = state.config.display_gross_prices;
    let line_total = match wl.get_line(variant_id) {
        Some(line) => service.calculate_line_total(&wl, line)?,
        None => zero_taxed_money(wl.currency()),
    };
    let subtotal = service.calculate_subtotal(&wl)?;

    Ok(Outcome::json(json!({
        "variantId": variant_id,
        "subtotal": format_money(get_display_price(&line_total, display_gross), wl.currency()),
        "total": format_money(get_display_price(&subtotal, display_gross), wl.currency()),
        "wishlist": {
            "numItems": wl.quantity(),
            "numLines": wl.num_lines(),
        },
    })))
}

/// POST /wishlist/clear/
pub async fn clear(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result: ViewResult = async {
        if !req.is_ajax {
            return Ok(Outcome::redirect(INDEX));
        }
        let service = &state.wishlist_service;
        let mut wl = current_wishlist(service, &req).await?;
        if wl.persisted {
            service.clear_wishlist(service.db(), &mut wl).await?;
        }
        Ok(Outcome::json(json!({ "numItems": 0 })))
    }
    .await;
    req.respond(result)
}

/// POST /wishlist/shipping-options/
pub async fn shipping_options(
    State(state): State<AppState>,
    req: WishlistRequest,
    Form(data): Form<PostData>,
) -> Response {
    let result = shipping_options_view(&state, &req, data).await;
    req.respond(result)
}

async fn shipping_options_view(
    state: &AppState,
    req: &WishlistRequest,
    data: PostData,
) -> ViewResult {
    let service = &state.wishlist_service;
    let conn = service.db();
    let wl = current_wishlist(service, req).await?;
    let available = service.available_countries(conn).await?;
    let choices = CountryForm::choices(&available);

    let (country_form, shipments) = match data.bound() {
        Some(data) => {
            let mut form = FormState::bound(data.country_form()).with_choices(choices);
            let shipments = match form.data.clean(&available) {
                Ok(country) => {
                    service
                        .get_shipping_price_estimate(conn, &wl, &country)
                        .await?
                }
                Err(errors) => {
                    form.errors = errors;
                    None
                }
            };
            (form, shipments)
        }
        None => (
            FormState::unbound(CountryForm::default()).with_choices(choices),
            None,
        ),
    };

    let context = service.get_wishlist_context(&wl, shipments.clone())?;
    Ok(Outcome::page(json!({
        "wishlist": context,
        "shipments": shipments,
        "country_form": country_form,
    })))
}

/// GET /wishlist/dropdown/
pub async fn dropdown(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result: ViewResult = async {
        let service = &state.wishlist_service;
        let wl = current_wishlist(service, &req).await?;
        if wl.is_empty() {
            return Ok(Outcome::json(json!({ "quantity": 0 })));
        }

        let lines = wl
            .lines
            .iter()
            .map(|line| {
                Ok(json!({
                    "product": line.variant.product_name,
                    "variant": line.variant.name,
                    "quantity": line.line.quantity,
                    "price_per_item": service.calculate_unit_price(&wl, line)?,
                    "line_total": service.calculate_line_total(&wl, line)?,
                }))
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(Outcome::json(json!({
            "quantity": wl.quantity(),
            "total": service.calculate_subtotal(&wl)?,
            "lines": lines,
        })))
    }
    .await;
    req.respond(result)
}

/// GET /wishlist/counter/
pub async fn counter(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result: ViewResult = async {
        let wl = current_wishlist(&state.wishlist_service, &req).await?;
        Ok(Outcome::json(json!({ "wishlist_counter": wl.quantity() })))
    }
    .await;
    req.respond(result)
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveVoucherQuery {
    pub code: Option<String>,
}

/// POST /wishlist/remove_voucher/
pub async fn remove_voucher(
    State(state): State<AppState>,
    req: WishlistRequest,
    Query(query): Query<RemoveVoucherQuery>,
) -> Response {
    let result: ViewResult = async {
        let service = &state.wishlist_service;
        let conn = service.db();
        let mut wl = current_wishlist(service, &req).await?;
        if wl.persisted {
            match query.code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => {
                    service
                        .remove_promo_code_from_wishlist(conn, &mut wl, code)
                        .await?
                }
                _ => service.remove_voucher_from_wishlist(conn, &mut wl).await?,
            }
        }
        Ok(Outcome::redirect(req.back_target()))
    }
    .await;
    req.respond(result)
}

/// GET /wishlist/login/
pub async fn login(State(state): State<AppState>, req: WishlistRequest) -> Response {
    let result: ViewResult = async {
        let wl = current_wishlist(&state.wishlist_service, &req).await?;
        validate_wishlist(&wl)?;
        if req.user.is_some() {
            return Ok(Outcome::redirect(START));
        }
        Ok(Outcome::page(json!({
            "login_required": true,
            "next": START,
        })))
    }
    .await;
    req.respond(result)
}
