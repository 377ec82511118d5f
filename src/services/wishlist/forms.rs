//! Typed forms for the wishlist pages.
//!
//! Each form is deserialized from the submitted body and cleaned against
//! the wishlist state it applies to. Cleaning never touches the database;
//! the service methods that need lookups take the already-fetched rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::entities::{address, product_variant, shipping_method};
use crate::money::{format_money, get_display_price, TaxedMoney};

use super::addresses::AddressData;
use super::LoadedWishlist;

/// Key under which errors not tied to a single field are reported
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const NEW_ADDRESS: &str = "new_address";
pub const SHIPPING_ADDRESS: &str = "shipping_address";

pub const NOTE_MAX_LENGTH: usize = 250;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

pub type Validated<T> = Result<T, FormErrors>;

/// Field name to error messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn extend(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_result<T>(self, value: T) -> Validated<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(field, message);
            }
        }
        out
    }
}

/// A form as shown on a page: what was submitted and what went wrong
#[derive(Debug, Clone, Serialize)]
pub struct FormState<T: Serialize> {
    pub data: T,
    pub errors: FormErrors,
    pub is_bound: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl<T: Serialize> FormState<T> {
    pub fn unbound(data: T) -> Self {
        Self {
            data,
            errors: FormErrors::new(),
            is_bound: false,
            choices: Vec::new(),
        }
    }

    pub fn bound(data: T) -> Self {
        Self {
            is_bound: true,
            ..Self::unbound(data)
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.is_bound && self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Parses a submitted quantity: an integer between 0 and `max`, 1 when omitted
pub fn clean_quantity(raw: Option<&str>, max: i32) -> Result<i32, String> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(1),
        Some(raw) => raw,
    };
    let quantity: i32 = raw
        .parse()
        .map_err(|_| "Enter a whole number.".to_string())?;
    if quantity < 0 {
        return Err("Ensure this value is greater than or equal to 0.".to_string());
    }
    if quantity > max {
        return Err(format!("Ensure this value is less than or equal to {}.", max));
    }
    Ok(quantity)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddToWishlistForm {
    #[serde(default)]
    pub quantity: Option<String>,
}

impl AddToWishlistForm {
    /// Checks the submitted quantity together with what the wishlist already holds
    pub fn clean(
        &self,
        wl: &LoadedWishlist,
        variant: Option<&product_variant::Model>,
        max_quantity: i32,
    ) -> Validated<i32> {
        let quantity = clean_quantity(self.quantity.as_deref(), max_quantity)
            .map_err(|msg| FormErrors::single("quantity", msg))?;

        let Some(variant) = variant else {
            return Err(FormErrors::single(
                NON_FIELD_ERRORS,
                "Oops. We could not find that product.",
            ));
        };

        let used_quantity = wl
            .get_line(variant.id)
            .map(|l| l.line.quantity)
            .unwrap_or(0);
        let new_quantity = quantity + used_quantity;

        let mut errors = FormErrors::new();
        if new_quantity > max_quantity {
            errors.add(
                "quantity",
                format!(
                    "Sorry. You can't add more than {} times this item.",
                    max_quantity
                ),
            );
        }
        if variant.check_quantity(new_quantity).is_err() {
            let remaining = variant.quantity_available() - used_quantity;
            if remaining > 0 {
                errors.add("quantity", format!("Only {} remaining in stock.", remaining));
            } else {
                errors.add("quantity", "Sorry. This product is currently out of stock.");
            }
        }
        errors.into_result(quantity)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaceWishlistLineForm {
    #[serde(default)]
    pub quantity: Option<String>,
}

impl ReplaceWishlistLineForm {
    pub fn clean(&self, variant: &product_variant::Model, max_quantity: i32) -> Validated<i32> {
        let quantity = clean_quantity(self.quantity.as_deref(), max_quantity)
            .map_err(|msg| FormErrors::single("quantity", msg))?;
        if variant.check_quantity(quantity).is_err() {
            return Err(FormErrors::single(
                "quantity",
                format!("Only {} remaining in stock.", variant.quantity_available()),
            ));
        }
        Ok(quantity)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryForm {
    #[serde(default)]
    pub country: Option<String>,
}

impl CountryForm {
    pub fn clean(&self, available: &[String]) -> Validated<String> {
        let country = match self.country.as_deref().map(str::trim) {
            None | Some("") => return Err(FormErrors::single("country", REQUIRED)),
            Some(code) => code.to_ascii_uppercase(),
        };
        if !available.contains(&country) {
            return Err(FormErrors::single(
                "country",
                format!(
                    "Select a valid choice. {} is not one of the available choices.",
                    country
                ),
            ));
        }
        Ok(country)
    }

    pub fn choices(available: &[String]) -> Vec<Choice> {
        let mut codes = available.to_vec();
        codes.sort();
        codes.dedup();
        codes
            .into_iter()
            .map(|code| Choice {
                label: code.clone(),
                value: code,
            })
            .collect()
    }
}

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(REQUIRED.into());
        return Err(err);
    }
    Ok(())
}

fn country_code(value: &str) -> Result<(), ValidationError> {
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        let mut err = ValidationError::new("country");
        err.message = Some("Enter a valid two-letter country code.".into());
        return Err(err);
    }
    Ok(())
}

/// Postal address form; only names, street, city, postal code and country are required
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AddressForm {
    #[serde(default)]
    #[validate(custom = "required", length(max = 256))]
    pub first_name: String,
    #[serde(default)]
    #[validate(custom = "required", length(max = 256))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub company_name: String,
    #[serde(default)]
    #[validate(custom = "required", length(max = 256))]
    pub street_address_1: String,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub street_address_2: String,
    #[serde(default)]
    #[validate(custom = "required", length(max = 256))]
    pub city: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub city_area: String,
    #[serde(default)]
    #[validate(custom = "required", length(max = 20))]
    pub postal_code: String,
    #[serde(default)]
    #[validate(custom = "country_code")]
    pub country: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub country_area: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: String,
}

impl AddressForm {
    /// An empty form with the country preselected
    pub fn with_country(country: &str) -> Self {
        Self {
            country: country.to_ascii_uppercase(),
            ..Self::default()
        }
    }

    pub fn from_address(address: &address::Model) -> Self {
        Self {
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            company_name: address.company_name.clone(),
            street_address_1: address.street_address_1.clone(),
            street_address_2: address.street_address_2.clone(),
            city: address.city.clone(),
            city_area: address.city_area.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            country_area: address.country_area.clone(),
            phone: address.phone.clone(),
        }
    }

    pub fn clean(&self) -> Validated<AddressData> {
        self.validate()?;
        Ok(AddressData {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            company_name: self.company_name.trim().to_string(),
            street_address_1: self.street_address_1.trim().to_string(),
            street_address_2: self.street_address_2.trim().to_string(),
            city: self.city.trim().to_uppercase(),
            city_area: self.city_area.trim().to_string(),
            postal_code: self.postal_code.trim().to_uppercase(),
            country: self.country.trim().to_ascii_uppercase(),
            country_area: self.country_area.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// E-mail asked from anonymous customers on the shipping or billing step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnonymousUserEmailForm {
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

impl AnonymousUserEmailForm {
    pub fn clean(&self) -> Validated<String> {
        self.validate()?;
        Ok(self.email.trim().to_string())
    }
}

/// What the customer picked in an address choice widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressChoice {
    NewAddress,
    ShippingAddress,
    Existing(Uuid),
}

impl AddressChoice {
    pub fn as_value(&self) -> String {
        match self {
            AddressChoice::NewAddress => NEW_ADDRESS.to_string(),
            AddressChoice::ShippingAddress => SHIPPING_ADDRESS.to_string(),
            AddressChoice::Existing(id) => id.to_string(),
        }
    }
}

fn address_choices(addresses: &[address::Model]) -> Vec<Choice> {
    addresses
        .iter()
        .map(|a| Choice {
            value: a.id.to_string(),
            label: a.to_string(),
        })
        .collect()
}

fn clean_address_choice(
    raw: Option<&str>,
    addresses: &[address::Model],
    allow_shipping: bool,
) -> Validated<AddressChoice> {
    match raw.map(str::trim) {
        None | Some("") => Err(FormErrors::single("address", REQUIRED)),
        Some(NEW_ADDRESS) => Ok(AddressChoice::NewAddress),
        Some(SHIPPING_ADDRESS) if allow_shipping => Ok(AddressChoice::ShippingAddress),
        Some(value) => Uuid::parse_str(value)
            .ok()
            .filter(|id| addresses.iter().any(|a| a.id == *id))
            .map(AddressChoice::Existing)
            .ok_or_else(|| FormErrors::single("address", INVALID_CHOICE)),
    }
}

/// Picks one of the customer's saved addresses or asks for a new one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressChoiceForm {
    #[serde(default)]
    pub address: Option<String>,
}

impl AddressChoiceForm {
    pub fn initial(choice: AddressChoice) -> Self {
        Self {
            address: Some(choice.as_value()),
        }
    }

    pub fn clean(&self, addresses: &[address::Model]) -> Validated<AddressChoice> {
        clean_address_choice(self.address.as_deref(), addresses, false)
    }

    pub fn choices(addresses: &[address::Model]) -> Vec<Choice> {
        let mut choices = address_choices(addresses);
        choices.push(Choice {
            value: NEW_ADDRESS.into(),
            label: "Enter a new address".into(),
        });
        choices
    }
}

/// Like [`AddressChoiceForm`], plus "same as shipping"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingAddressChoiceForm {
    #[serde(default)]
    pub address: Option<String>,
}

impl BillingAddressChoiceForm {
    pub fn initial(choice: AddressChoice) -> Self {
        Self {
            address: Some(choice.as_value()),
        }
    }

    pub fn clean(&self, addresses: &[address::Model]) -> Validated<AddressChoice> {
        clean_address_choice(self.address.as_deref(), addresses, true)
    }

    pub fn choices(addresses: &[address::Model]) -> Vec<Choice> {
        let mut choices = vec![Choice {
            value: SHIPPING_ADDRESS.into(),
            label: "Same as shipping".into(),
        }];
        choices.extend(AddressChoiceForm::choices(addresses));
        choices
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WishlistShippingMethodForm {
    #[serde(default)]
    pub shipping_method: Option<String>,
}

impl WishlistShippingMethodForm {
    /// Preselects the current method when it is still valid, else the first valid one
    pub fn initial(current: Option<Uuid>, valid: &[shipping_method::Model]) -> Self {
        let selected = current
            .filter(|id| valid.iter().any(|m| m.id == *id))
            .or_else(|| valid.first().map(|m| m.id));
        Self {
            shipping_method: selected.map(|id| id.to_string()),
        }
    }

    pub fn clean(&self, valid: &[shipping_method::Model]) -> Validated<Uuid> {
        let raw = match self.shipping_method.as_deref().map(str::trim) {
            None | Some("") => return Err(FormErrors::single("shipping_method", REQUIRED)),
            Some(raw) => raw,
        };
        Uuid::parse_str(raw)
            .ok()
            .filter(|id| valid.iter().any(|m| m.id == *id))
            .ok_or_else(|| FormErrors::single("shipping_method", INVALID_CHOICE))
    }

    /// Choices labelled with the method name and its taxed price
    pub fn choices(
        methods: &[(shipping_method::Model, TaxedMoney)],
        display_gross: bool,
    ) -> Vec<Choice> {
        methods
            .iter()
            .map(|(method, price)| Choice {
                value: method.id.to_string(),
                label: format!(
                    "{} {}",
                    method,
                    format_money(get_display_price(price, display_gross), &price.currency)
                ),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WishlistNoteForm {
    #[serde(default)]
    pub note: Option<String>,
}

impl WishlistNoteForm {
    pub fn clean(&self) -> Validated<String> {
        let note = self.note.as_deref().unwrap_or_default().trim().to_string();
        if note.chars().count() > NOTE_MAX_LENGTH {
            return Err(FormErrors::single(
                "note",
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    NOTE_MAX_LENGTH,
                    note.chars().count()
                ),
            ));
        }
        Ok(note)
    }
}

/// The discount code box; submitted as `discount-voucher`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WishlistVoucherForm {
    #[serde(default)]
    pub voucher: Option<String>,
}

impl WishlistVoucherForm {
    pub const INVALID_CODE: &'static str = "Discount code incorrect or expired";

    pub fn code(&self) -> Validated<String> {
        match self.voucher.as_deref().map(str::trim) {
            None | Some("") => Err(FormErrors::single("voucher", REQUIRED)),
            Some(code) => Ok(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{wishlist, wishlist_line};
    use crate::services::wishlist::LineWithVariant;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn variant(quantity: i32, allocated: i32) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Sneakers".into(),
            category_id: None,
            name: "42".into(),
            sku: "SNK-42".into(),
            price: dec!(80),
            currency: "USD".into(),
            quantity,
            quantity_allocated: allocated,
            track_inventory: true,
            is_shipping_required: true,
            weight: None,
        }
    }

    fn wishlist_with(variant: &product_variant::Model, quantity: i32) -> LoadedWishlist {
        let model = wishlist::Model::new_unsaved(None, "USD");
        let token = model.token;
        let mut wl = LoadedWishlist::unsaved(model, None);
        if quantity > 0 {
            wl.lines.push(LineWithVariant {
                line: wishlist_line::Model {
                    id: Uuid::new_v4(),
                    wishlist_token: token,
                    variant_id: variant.id,
                    quantity,
                },
                variant: variant.clone(),
            });
        }
        wl
    }

    fn add(quantity: &str) -> AddToWishlistForm {
        AddToWishlistForm {
            quantity: Some(quantity.into()),
        }
    }

    #[rstest]
    #[case(None, Ok(1))]
    #[case(Some("3"), Ok(3))]
    #[case(Some("0"), Ok(0))]
    #[case(Some("-1"), Err("Ensure this value is greater than or equal to 0.".to_string()))]
    #[case(Some("51"), Err("Ensure this value is less than or equal to 50.".to_string()))]
    #[case(Some("two"), Err("Enter a whole number.".to_string()))]
    fn quantity_field_rules(#[case] raw: Option<&str>, #[case] expected: Result<i32, String>) {
        assert_eq!(clean_quantity(raw, 50), expected);
    }

    #[test]
    fn add_form_reports_missing_variant() {
        let v = variant(10, 0);
        let errors = add("1").clean(&wishlist_with(&v, 0), None, 50).unwrap_err();
        assert_eq!(
            errors.get(NON_FIELD_ERRORS),
            ["Oops. We could not find that product."]
        );
    }

    #[test]
    fn add_form_counts_quantity_already_in_wishlist() {
        let v = variant(10, 2);
        let wl = wishlist_with(&v, 5);
        let errors = add("4").clean(&wl, Some(&v), 50).unwrap_err();
        assert_eq!(errors.get("quantity"), ["Only 3 remaining in stock."]);

        assert_eq!(add("3").clean(&wl, Some(&v), 50), Ok(3));
    }

    #[test]
    fn add_form_reports_out_of_stock_when_nothing_remains() {
        let v = variant(4, 0);
        let wl = wishlist_with(&v, 4);
        let errors = add("1").clean(&wl, Some(&v), 50).unwrap_err();
        assert_eq!(
            errors.get("quantity"),
            ["Sorry. This product is currently out of stock."]
        );
    }

    #[test]
    fn add_form_enforces_line_limit() {
        let v = variant(100, 0);
        let wl = wishlist_with(&v, 48);
        let errors = add("3").clean(&wl, Some(&v), 50).unwrap_err();
        assert_eq!(
            errors.get("quantity"),
            ["Sorry. You can't add more than 50 times this item."]
        );
    }

    #[test]
    fn replace_form_checks_target_quantity() {
        let v = variant(5, 1);
        let form = ReplaceWishlistLineForm {
            quantity: Some("6".into()),
        };
        let errors = form.clean(&v, 50).unwrap_err();
        assert_eq!(errors.get("quantity"), ["Only 4 remaining in stock."]);

        let ok = ReplaceWishlistLineForm {
            quantity: Some("4".into()),
        };
        assert_eq!(ok.clean(&v, 50), Ok(4));
    }

    #[test]
    fn country_form_accepts_only_known_countries() {
        let available = vec!["PL".to_string(), "DE".to_string()];
        let form = CountryForm {
            country: Some("de".into()),
        };
        assert_eq!(form.clean(&available), Ok("DE".to_string()));

        let form = CountryForm {
            country: Some("US".into()),
        };
        assert!(form.clean(&available).is_err());

        let labels: Vec<_> = CountryForm::choices(&available)
            .into_iter()
            .map(|c| c.value)
            .collect();
        assert_eq!(labels, ["DE", "PL"]);
    }

    #[test]
    fn address_form_requires_postal_fields() {
        let errors = AddressForm::with_country("US").clean().unwrap_err();
        for field in ["first_name", "last_name", "street_address_1", "city", "postal_code"] {
            assert_eq!(errors.get(field), [REQUIRED], "{field}");
        }
        assert!(errors.get("country").is_empty());
        assert!(errors.get("phone").is_empty());
    }

    #[test]
    fn address_form_normalizes_data() {
        let form = AddressForm {
            first_name: " Ada ".into(),
            last_name: "Lovelace".into(),
            street_address_1: "12 Analytical Way".into(),
            city: "London".into(),
            postal_code: "ec1a 1bb".into(),
            country: "gb".into(),
            ..AddressForm::default()
        };
        let data = form.clean().unwrap();
        assert_eq!(data.first_name, "Ada");
        assert_eq!(data.city, "LONDON");
        assert_eq!(data.postal_code, "EC1A 1BB");
        assert_eq!(data.country, "GB");
    }

    #[test]
    fn email_form_rejects_garbage() {
        let form = AnonymousUserEmailForm {
            email: "not-an-email".into(),
        };
        assert_eq!(
            form.clean().unwrap_err().get("email"),
            ["Enter a valid email address."]
        );
        let form = AnonymousUserEmailForm {
            email: "guest@example.com".into(),
        };
        assert_eq!(form.clean(), Ok("guest@example.com".to_string()));
    }

    fn saved_address() -> address::Model {
        address::Model {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            company_name: String::new(),
            street_address_1: "12 Analytical Way".into(),
            street_address_2: String::new(),
            city: "LONDON".into(),
            city_area: String::new(),
            postal_code: "EC1A 1BB".into(),
            country: "GB".into(),
            country_area: String::new(),
            phone: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn address_choices() {
        let book = vec![saved_address()];
        let pick = |value: &str| AddressChoiceForm {
            address: Some(value.into()),
        };
        assert_eq!(pick(NEW_ADDRESS).clean(&book), Ok(AddressChoice::NewAddress));
        assert_eq!(
            pick(&book[0].id.to_string()).clean(&book),
            Ok(AddressChoice::Existing(book[0].id))
        );
        assert!(pick(&Uuid::new_v4().to_string()).clean(&book).is_err());
        assert!(pick(SHIPPING_ADDRESS).clean(&book).is_err());

        let billing = BillingAddressChoiceForm {
            address: Some(SHIPPING_ADDRESS.into()),
        };
        assert_eq!(billing.clean(&book), Ok(AddressChoice::ShippingAddress));
        assert_eq!(BillingAddressChoiceForm::choices(&book).len(), 3);
    }

    #[test]
    fn note_is_stripped_and_limited() {
        let form = WishlistNoteForm {
            note: Some("  leave at the door ".into()),
        };
        assert_eq!(form.clean(), Ok("leave at the door".to_string()));

        let form = WishlistNoteForm {
            note: Some("x".repeat(251)),
        };
        assert!(form.clean().is_err());
    }

    #[test]
    fn form_errors_serialize_as_a_map() {
        let mut errors = FormErrors::single("quantity", "bad");
        errors.add("quantity", "worse");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"quantity": ["bad", "worse"]}));
    }
}
