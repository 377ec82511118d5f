
use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::auth::resolve_user;
use crate::entities::{address, user};
use crate::errors::ServiceError;
use crate::services::wishlist::forms::{
    AddToWishlistForm, AddressChoiceForm, AddressForm, AnonymousUserEmailForm,
    BillingAddressChoiceForm, CountryForm, ReplaceWishlistLineForm, WishlistNoteForm,
    WishlistShippingMethodForm, WishlistVoucherForm,
};
use crate::services::wishlist::lifecycle::parse_token;
use crate::services::wishlist::COOKIE_NAME;
use crate::AppState;

pub const MESSAGES_COOKIE: &str = "messages";
pub const COUNTRY_HEADER: &str = "x-country-code";
pub const CLIENT_ID_HEADER: &str = "x-client-id";

pub const INDEX: &str = "/wishlist/";
pub const START: &str = "/wishlist/start/";
pub const SHIPPING_ADDRESS: &str = "/wishlist/shipping-address/";
pub const SHIPPING_METHOD: &str = "/wishlist/shipping-method/";
pub const SUMMARY: &str = "/wishlist/summary/";

pub fn order_payment_path(token: Uuid) -> String {
    format!("/order/{}/payment/", token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message shown once, on the next page the customer sees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

/// Everything a wishlist view needs to know about the caller.
///
/// The signed cookie jar travels with the request so views can set the
/// anonymous wishlist cookie and queue flash messages; [`respond`] writes
/// both back.
///
/// [`respond`]: WishlistRequest::respond
pub struct WishlistRequest {
    pub user: Option<user::Model>,
    pub jar: SignedCookieJar,
    pub messages: Vec<FlashMessage>,
    had_messages_cookie: bool,
    pub cookie_token: Option<Uuid>,
    pub country: String,
    pub tracking_code: String,
    pub referer: Option<String>,
    pub next: Option<String>,
    pub is_ajax: bool,
}

impl FromRequestParts<AppState> for WishlistRequest {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(&*state.db, &state.config.jwt_secret, &parts.headers).await?;
        let jar = match SignedCookieJar::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };

        let stored = jar.get(MESSAGES_COOKIE);
        let had_messages_cookie = stored.is_some();
        let messages = stored
            .and_then(|cookie| serde_json::from_str::<Vec<FlashMessage>>(cookie.value()).ok())
            .unwrap_or_default();
        let cookie_token = jar
            .get(COOKIE_NAME)
            .and_then(|cookie| parse_token(Some(cookie.value())));

        let country = request_country(state, user.as_ref(), &parts.headers).await?;
        let next = Query::<NextQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.next);

        Ok(Self {
            user,
            jar,
            messages,
            had_messages_cookie,
            cookie_token,
            country,
            tracking_code: header_str(&parts.headers, CLIENT_ID_HEADER)
                .unwrap_or_default()
                .to_string(),
            referer: header_str(&parts.headers, header::REFERER.as_str()).map(str::to_string),
            next,
            is_ajax: header_str(&parts.headers, "x-requested-with") == Some("XMLHttpRequest"),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The user's default shipping country, then the country header, then the configured default
async fn request_country(
    state: &AppState,
    user: Option<&user::Model>,
    headers: &HeaderMap,
) -> Result<String, ServiceError> {
    if let Some(address_id) = user.and_then(|u| u.default_shipping_address_id) {
        if let Some(address) = address::Entity::find_by_id(address_id)
            .one(&*state.db)
            .await?
        {
            return Ok(address.country);
        }
    }
    Ok(header_str(headers, COUNTRY_HEADER)
        .filter(|code| code.len() == 2)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| state.config.default_country.clone()))
}

/// Only site-relative targets are followed
fn safe_target(target: &str) -> Option<&str> {
    if target.starts_with('/') && !target.starts_with("//") {
        return Some(target);
    }
    // Referer headers carry absolute URLs
    let rest = target
        .strip_prefix("https://")
        .or_else(|| target.strip_prefix("http://"))?;
    rest.find('/').map(|idx| &rest[idx..])
}

/// How a view ended
#[derive(Debug)]
pub enum Outcome {
    /// A page context; flash messages are attached and consumed
    Page { status: StatusCode, context: Value },
    /// A bare JSON answer for scripts
    Json { status: StatusCode, body: Value },
    Redirect(String),
}

impl Outcome {
    pub fn page(context: Value) -> Self {
        Outcome::Page {
            status: StatusCode::OK,
            context,
        }
    }

    pub fn json(body: Value) -> Self {
        Outcome::Json {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        Outcome::Redirect(to.into())
    }
}

/// Why a wizard step did not render
#[derive(Debug)]
pub enum WizardExit {
    Redirect(String),
    Failed(ServiceError),
}

impl WizardExit {
    pub fn to(path: impl Into<String>) -> Self {
        WizardExit::Redirect(path.into())
    }
}

impl From<ServiceError> for WizardExit {
    fn from(err: ServiceError) -> Self {
        WizardExit::Failed(err)
    }
}

pub type ViewResult = Result<Outcome, WizardExit>;

impl WishlistRequest {
    pub fn add_message(&mut self, level: MessageLevel, message: impl Into<String>) {
        self.messages.push(FlashMessage {
            level,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.add_message(MessageLevel::Warning, message);
    }

    /// `next`, then the Referer, then the wishlist index
    pub fn back_target(&self) -> String {
        self.next
            .as_deref()
            .and_then(safe_target)
            .or_else(|| self.referer.as_deref().and_then(safe_target))
            .unwrap_or(INDEX)
            .to_string()
    }

    /// Remembers an anonymous wishlist in the signed cookie
    pub fn set_wishlist_cookie(&mut self, token: Uuid, max_age_days: i64) -> Result<(), ServiceError> {
        let raw = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            COOKIE_NAME,
            token,
            max_age_days * 24 * 60 * 60
        );
        let cookie = Cookie::parse(raw)
            .map_err(|e| ServiceError::InternalError(format!("wishlist cookie: {}", e)))?;
        self.jar = self.jar.clone().add(cookie);
        self.cookie_token = Some(token);
        Ok(())
    }

    fn store_messages(self) -> SignedCookieJar {
        if self.messages.is_empty() {
            return self.jar;
        }
        match serde_json::to_string(&self.messages) {
            Ok(value) => self
                .jar
                .add(Cookie::build((MESSAGES_COOKIE, value)).path("/").http_only(true)),
            Err(e) => {
                debug!("Dropping flash messages: {}", e);
                self.jar
            }
        }
    }

    /// Turns a view result into the HTTP response, carrying cookies along
    pub fn respond(self, result: ViewResult) -> Response {
        match result {
            Ok(Outcome::Page {
                status,
                mut context,
            }) => {
                if let Value::Object(map) = &mut context {
                    map.insert(
                        "messages".into(),
                        serde_json::to_value(&self.messages).unwrap_or(Value::Array(Vec::new())),
                    );
                }
                let jar = if self.had_messages_cookie {
                    self.jar.remove(Cookie::build(MESSAGES_COOKIE).path("/"))
                } else {
                    self.jar
                };
                (jar, (status, Json(context))).into_response()
            }
            Ok(Outcome::Json { status, body }) => {
                let jar = self.store_messages();
                (jar, (status, Json(body))).into_response()
            }
            Ok(Outcome::Redirect(to)) | Err(WizardExit::Redirect(to)) => {
                let jar = self.store_messages();
                (jar, Redirect::to(&to)).into_response()
            }
            Err(WizardExit::Failed(err)) => (self.jar, err).into_response(),
        }
    }
}

/// Every field any wishlist form reads from a urlencoded body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostData {
    pub quantity: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub street_address_1: Option<String>,
    pub street_address_2: Option<String>,
    pub city: Option<String>,
    pub city_area: Option<String>,
    pub postal_code: Option<String>,
    pub country_area: Option<String>,
    pub phone: Option<String>,
    pub shipping_method: Option<String>,
    pub note: Option<String>,
    #[serde(rename = "discount-voucher")]
    pub discount_voucher: Option<String>,
}

impl PostData {
    pub fn is_empty(&self) -> bool {
        [
            &self.quantity,
            &self.country,
            &self.email,
            &self.address,
            &self.first_name,
            &self.last_name,
            &self.company_name,
            &self.street_address_1,
            &self.street_address_2,
            &self.city,
            &self.city_area,
            &self.postal_code,
            &self.country_area,
            &self.phone,
            &self.shipping_method,
            &self.note,
            &self.discount_voucher,
        ]
        .iter()
        .all(|field| field.is_none())
    }

    /// `None` for an empty body, so views treat it as a plain GET
    pub fn bound(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }

    pub fn add_to_wishlist_form(&self) -> AddToWishlistForm {
        AddToWishlistForm {
            quantity: self.quantity.clone(),
        }
    }

    pub fn replace_line_form(&self) -> ReplaceWishlistLineForm {
        ReplaceWishlistLineForm {
            quantity: self.quantity.clone(),
        }
    }

    pub fn country_form(&self) -> CountryForm {
        CountryForm {
            country: self.country.clone(),
        }
    }

    pub fn email_form(&self) -> AnonymousUserEmailForm {
        AnonymousUserEmailForm {
            email: self.email.clone().unwrap_or_default(),
        }
    }

    pub fn address_choice_form(&self) -> AddressChoiceForm {
        AddressChoiceForm {
            address: self.address.clone(),
        }
    }

    pub fn billing_choice_form(&self) -> BillingAddressChoiceForm {
        BillingAddressChoiceForm {
            address: self.address.clone(),
        }
    }

    pub fn address_form(&self) -> AddressForm {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        AddressForm {
            first_name: field(&self.first_name),
            last_name: field(&self.last_name),
            company_name: field(&self.company_name),
            street_address_1: field(&self.street_address_1),
            street_address_2: field(&self.street_address_2),
            city: field(&self.city),
            city_area: field(&self.city_area),
            postal_code: field(&self.postal_code),
            country: field(&self.country),
            country_area: field(&self.country_area),
            phone: field(&self.phone),
        }
    }

    pub fn shipping_method_form(&self) -> WishlistShippingMethodForm {
        WishlistShippingMethodForm {
            shipping_method: self.shipping_method.clone(),
        }
    }

    pub fn note_form(&self) -> WishlistNoteForm {
        WishlistNoteForm {
            note: self.note.clone(),
        }
    }

    pub fn voucher_form(&self) -> Option<WishlistVoucherForm> {
        self.discount_voucher.as_ref().map(|code| WishlistVoucherForm {
            voucher: Some(code.clone()),
        })
    }

    /// Drops the discount box field, leaving what the other forms read
    pub fn without_voucher(mut self) -> Option<Self> {
        self.discount_voucher = None;
        self.bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_relative_targets_are_followed() {
        assert_eq!(safe_target("/wishlist/summary/"), Some("/wishlist/summary/"));
        assert_eq!(safe_target("//evil.example/"), None);
        assert_eq!(
            safe_target("https://shop.example/wishlist/?a=1"),
            Some("/wishlist/?a=1")
        );
        assert_eq!(safe_target("javascript:alert(1)"), None);
    }

    #[test]
    fn empty_post_data_is_unbound() {
        assert!(PostData::default().bound().is_none());

        let data = PostData {
            discount_voucher: Some("SAVE10".into()),
            ..PostData::default()
        };
        assert!(data.clone().bound().is_some());
        assert!(data.without_voucher().is_none());
    }

    #[test]
    fn address_fields_map_onto_the_address_form() {
        let data = PostData {
            first_name: Some("Ada".into()),
            city: Some("London".into()),
            country: Some("GB".into()),
            ..PostData::default()
        };
        let form = data.address_form();
        assert_eq!(form.first_name, "Ada");
        assert_eq!(form.city, "London");
        assert_eq!(form.country, "GB");
        assert_eq!(form.last_name, "");
    }
}
