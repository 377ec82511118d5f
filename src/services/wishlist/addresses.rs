use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::entities::{address, user};
use crate::errors::ServiceError;

use super::forms::{
    AddressChoice, AddressChoiceForm, AddressForm, AnonymousUserEmailForm,
    BillingAddressChoiceForm, FormErrors, FormState,
};
use super::{AddressKind, LoadedWishlist, WishlistService};

/// The postal part of an address, used for equality checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressData {
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub street_address_1: String,
    pub street_address_2: String,
    pub city: String,
    pub city_area: String,
    pub postal_code: String,
    pub country: String,
    pub country_area: String,
    pub phone: String,
}

pub fn address_data(address: &address::Model) -> AddressData {
    AddressData {
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

/// Two addresses are the same when every postal field matches; ids and owners are ignored
pub fn same_address(a: &address::Model, b: &address::Model) -> bool {
    address_data(a) == address_data(b)
}

/// Whether the address is complete enough to ship to
pub fn address_is_complete(address: &address::Model) -> bool {
    AddressForm::from_address(address).clean().is_ok()
}

fn in_address_book(address: &address::Model, user_addresses: &[address::Model]) -> bool {
    user_addresses.iter().any(|a| a.id == address.id)
}

/// Result of one of the address form flows
#[derive(Debug, Clone, Serialize)]
pub struct AddressForms<F: Serialize> {
    /// The address-book choice, or the e-mail form for anonymous customers
    pub choice_form: FormState<F>,
    pub address_form: FormState<AddressForm>,
    #[serde(skip)]
    pub updated: bool,
}

pub(crate) async fn create_address<C: ConnectionTrait>(
    conn: &C,
    data: &AddressData,
    user_id: Option<Uuid>,
) -> Result<address::Model, ServiceError> {
    let row = address::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        first_name: Set(data.first_name.clone()),
        last_name: Set(data.last_name.clone()),
        company_name: Set(data.company_name.clone()),
        street_address_1: Set(data.street_address_1.clone()),
        street_address_2: Set(data.street_address_2.clone()),
        city: Set(data.city.clone()),
        city_area: Set(data.city_area.clone()),
        postal_code: Set(data.postal_code.clone()),
        country: Set(data.country.clone()),
        country_area: Set(data.country_area.clone()),
        phone: Set(data.phone.clone()),
        created_at: Set(Utc::now()),
    };
    Ok(row.insert(conn).await?)
}

/// Inserts an unowned duplicate of the address
pub async fn copy_address<C: ConnectionTrait>(
    conn: &C,
    address: &address::Model,
) -> Result<address::Model, ServiceError> {
    create_address(conn, &address_data(address), None).await
}

pub async fn user_addresses<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<address::Model>, ServiceError> {
    Ok(address::Entity::find()
        .filter(address::Column::UserId.eq(user_id))
        .all(conn)
        .await?)
}

/// Reuses an equal address from the user's book or adds one, then makes it
/// the user's default for `kind` when no default is set yet.
#[instrument(skip(conn, user, address), fields(user_id = %user.id))]
pub async fn store_user_address<C: ConnectionTrait>(
    conn: &C,
    user: &user::Model,
    address: &address::Model,
    kind: AddressKind,
) -> Result<address::Model, ServiceError> {
    let data = address_data(address);
    let existing = user_addresses(conn, user.id)
        .await?
        .into_iter()
        .find(|a| address_data(a) == data);

    let entry = match existing {
        Some(entry) => entry,
        None => {
            debug!("Adding address to the book");
            create_address(conn, &data, Some(user.id)).await?
        }
    };

    let column = match kind {
        AddressKind::Shipping => user::Column::DefaultShippingAddressId,
        AddressKind::Billing => user::Column::DefaultBillingAddressId,
    };
    user::Entity::update_many()
        .col_expr(column, Expr::value(entry.id))
        .filter(user::Column::Id.eq(user.id))
        .filter(column.is_null())
        .exec(conn)
        .await?;

    Ok(entry)
}

/// Reports whether assigning `address` changes the wishlist and whether the
/// previous address row should be deleted. Addresses from the owner's book
/// are never deleted.
pub fn check_new_wishlist_address(
    wl: &LoadedWishlist,
    address: Option<&address::Model>,
    kind: AddressKind,
) -> (bool, bool) {
    let old = match kind {
        AddressKind::Shipping => wl.shipping_address.as_ref(),
        AddressKind::Billing => wl.billing_address.as_ref(),
    };

    let changed = match (address, old) {
        (None, None) => false,
        (Some(new), Some(old)) => !same_address(new, old),
        _ => true,
    };

    let remove_old = changed
        && old.is_some_and(|old| match wl.user.as_ref() {
            None => true,
            Some(user) => !old.belongs_to_user(user.id),
        });

    (changed, remove_old)
}

impl WishlistService {
    async fn change_address_in_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        address: Option<address::Model>,
        kind: AddressKind,
    ) -> Result<(), ServiceError> {
        let (changed, remove_old) = check_new_wishlist_address(wl, address.as_ref(), kind);
        if !changed {
            let current_id = match kind {
                AddressKind::Shipping => wl.wishlist.shipping_address_id,
                AddressKind::Billing => wl.wishlist.billing_address_id,
            };
            // Drop the freshly written duplicate of an unchanged address
            if let Some(new) = address.filter(|a| a.user_id.is_none() && Some(a.id) != current_id) {
                address::Entity::delete_by_id(new.id).exec(conn).await?;
            }
            return Ok(());
        }

        let new_id = address.map(|a| a.id);
        let old_id = match kind {
            AddressKind::Shipping => {
                std::mem::replace(&mut wl.wishlist.shipping_address_id, new_id)
            }
            AddressKind::Billing => std::mem::replace(&mut wl.wishlist.billing_address_id, new_id),
        };
        self.save(conn, wl).await?;

        if let (true, Some(old_id)) = (remove_old, old_id) {
            if Some(old_id) != new_id {
                address::Entity::delete_by_id(old_id).exec(conn).await?;
            }
        }

        info!(wishlist_token = %wl.token(), %kind, "Wishlist address changed");
        self.reload(conn, wl).await
    }

    #[instrument(skip(self, conn, wl, address), fields(wishlist_token = %wl.token()))]
    pub async fn change_shipping_address_in_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        address: Option<address::Model>,
    ) -> Result<(), ServiceError> {
        self.change_address_in_wishlist(conn, wl, address, AddressKind::Shipping)
            .await
    }

    #[instrument(skip(self, conn, wl, address), fields(wishlist_token = %wl.token()))]
    pub async fn change_billing_address_in_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        address: Option<address::Model>,
    ) -> Result<(), ServiceError> {
        self.change_address_in_wishlist(conn, wl, address, AddressKind::Billing)
            .await
    }

    /// Shipping step for signed-in customers: pick a book address or enter a new one
    #[instrument(skip_all, fields(wishlist_token = %wl.token()))]
    pub async fn update_shipping_address_in_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        user_addresses: &[address::Model],
        submitted: Option<(AddressChoiceForm, AddressForm)>,
        country: &str,
    ) -> Result<AddressForms<AddressChoiceForm>, ServiceError> {
        let current = wl.shipping_address.clone().or_else(|| {
            let default_id = wl.user.as_ref()?.default_shipping_address_id?;
            user_addresses.iter().find(|a| a.id == default_id).cloned()
        });
        let choices = AddressChoiceForm::choices(user_addresses);

        let Some((choice_form, address_form)) = submitted else {
            let (choice, address_form) = match current {
                Some(a) if in_address_book(&a, user_addresses) => (
                    AddressChoice::Existing(a.id),
                    AddressForm::with_country(country),
                ),
                Some(a) => (AddressChoice::NewAddress, AddressForm::from_address(&a)),
                None => (AddressChoice::NewAddress, AddressForm::with_country(country)),
            };
            return Ok(AddressForms {
                choice_form: FormState::unbound(AddressChoiceForm::initial(choice))
                    .with_choices(choices),
                address_form: FormState::unbound(address_form),
                updated: false,
            });
        };

        let mut forms = AddressForms {
            choice_form: FormState::bound(choice_form).with_choices(choices),
            address_form: FormState::bound(address_form),
            updated: false,
        };

        match forms.choice_form.data.clean(user_addresses) {
            Err(errors) => forms.choice_form.errors = errors,
            Ok(AddressChoice::Existing(id)) => {
                let address = user_addresses.iter().find(|a| a.id == id).cloned();
                self.change_shipping_address_in_wishlist(conn, wl, address)
                    .await?;
                forms.updated = true;
            }
            Ok(_) => match forms.address_form.data.clean() {
                Ok(data) => {
                    let address = create_address(conn, &data, None).await?;
                    self.change_shipping_address_in_wishlist(conn, wl, Some(address))
                        .await?;
                    forms.updated = true;
                }
                Err(errors) => forms.address_form.errors = errors,
            },
        }
        Ok(forms)
    }

    /// Shipping step for anonymous customers: e-mail plus address
    #[instrument(skip_all, fields(wishlist_token = %wl.token()))]
    pub async fn update_shipping_address_in_anonymous_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        submitted: Option<(AnonymousUserEmailForm, AddressForm)>,
        country: &str,
    ) -> Result<AddressForms<AnonymousUserEmailForm>, ServiceError> {
        let Some((email_form, address_form)) = submitted else {
            let address_form = match wl.shipping_address.as_ref() {
                Some(a) => AddressForm::from_address(a),
                None => AddressForm::with_country(country),
            };
            return Ok(AddressForms {
                choice_form: FormState::unbound(AnonymousUserEmailForm {
                    email: wl.wishlist.email.clone().unwrap_or_default(),
                }),
                address_form: FormState::unbound(address_form),
                updated: false,
            });
        };

        self.update_anonymous_address(conn, wl, email_form, address_form, AddressKind::Shipping)
            .await
    }

    /// Billing step when the wishlist ships: "same as shipping", a book address or a new one
    #[instrument(skip_all, fields(wishlist_token = %wl.token()))]
    pub async fn update_billing_address_in_wishlist_with_shipping<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        user_addresses: &[address::Model],
        submitted: Option<(BillingAddressChoiceForm, AddressForm)>,
        country: &str,
    ) -> Result<AddressForms<BillingAddressChoiceForm>, ServiceError> {
        let shipping = wl.shipping_address.clone();
        let choices = BillingAddressChoiceForm::choices(user_addresses);

        let Some((choice_form, address_form)) = submitted else {
            let shipping_country = shipping
                .as_ref()
                .map(|a| a.country.clone())
                .unwrap_or_else(|| country.to_string());
            let (choice, address_form) = match (wl.billing_address.as_ref(), shipping.as_ref()) {
                (None, _) => (
                    AddressChoice::ShippingAddress,
                    AddressForm::with_country(&shipping_country),
                ),
                (Some(billing), Some(shipping)) if same_address(billing, shipping) => (
                    AddressChoice::ShippingAddress,
                    AddressForm::with_country(&shipping_country),
                ),
                (Some(billing), _) if in_address_book(billing, user_addresses) => (
                    AddressChoice::Existing(billing.id),
                    AddressForm::with_country(&billing.country),
                ),
                (Some(billing), _) => (AddressChoice::NewAddress, AddressForm::from_address(billing)),
            };
            return Ok(AddressForms {
                choice_form: FormState::unbound(BillingAddressChoiceForm::initial(choice))
                    .with_choices(choices),
                address_form: FormState::unbound(address_form),
                updated: false,
            });
        };

        let mut forms = AddressForms {
            choice_form: FormState::bound(choice_form).with_choices(choices),
            address_form: FormState::bound(address_form),
            updated: false,
        };

        let address = match forms.choice_form.data.clean(user_addresses) {
            Err(errors) => {
                forms.choice_form.errors = errors;
                None
            }
            Ok(AddressChoice::ShippingAddress) => match shipping {
                Some(shipping)
                    if wl.user.is_some() && in_address_book(&shipping, user_addresses) =>
                {
                    Some(shipping)
                }
                Some(shipping) => Some(copy_address(conn, &shipping).await?),
                None => {
                    forms.choice_form.errors =
                        FormErrors::single("address", "Shipping address is not set");
                    None
                }
            },
            Ok(AddressChoice::Existing(id)) => user_addresses.iter().find(|a| a.id == id).cloned(),
            Ok(AddressChoice::NewAddress) => match forms.address_form.data.clean() {
                Ok(data) => Some(create_address(conn, &data, None).await?),
                Err(errors) => {
                    forms.address_form.errors = errors;
                    None
                }
            },
        };

        if let Some(address) = address {
            self.change_billing_address_in_wishlist(conn, wl, Some(address))
                .await?;
            forms.updated = true;
        }
        Ok(forms)
    }

    /// Billing step for anonymous customers of wishlists that do not ship
    #[instrument(skip_all, fields(wishlist_token = %wl.token()))]
    pub async fn update_billing_address_in_anonymous_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        submitted: Option<(AnonymousUserEmailForm, AddressForm)>,
        country: &str,
    ) -> Result<AddressForms<AnonymousUserEmailForm>, ServiceError> {
        let Some((email_form, address_form)) = submitted else {
            let address_form = match wl.billing_address.as_ref() {
                Some(a) => AddressForm::from_address(a),
                None => AddressForm::with_country(country),
            };
            return Ok(AddressForms {
                choice_form: FormState::unbound(AnonymousUserEmailForm {
                    email: wl.wishlist.email.clone().unwrap_or_default(),
                }),
                address_form: FormState::unbound(address_form),
                updated: false,
            });
        };

        self.update_anonymous_address(conn, wl, email_form, address_form, AddressKind::Billing)
            .await
    }

    /// Billing step for signed-in customers of wishlists that do not ship
    #[instrument(skip_all, fields(wishlist_token = %wl.token()))]
    pub async fn update_billing_address_in_wishlist<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        user_addresses: &[address::Model],
        submitted: Option<(AddressChoiceForm, AddressForm)>,
        country: &str,
    ) -> Result<AddressForms<AddressChoiceForm>, ServiceError> {
        let choices = AddressChoiceForm::choices(user_addresses);

        let Some((choice_form, address_form)) = submitted else {
            let default_billing = wl
                .user
                .as_ref()
                .and_then(|u| u.default_billing_address_id);
            let (choice, address_form) = match wl.billing_address.as_ref() {
                Some(billing) if in_address_book(billing, user_addresses) => (
                    AddressChoice::Existing(billing.id),
                    AddressForm::with_country(country),
                ),
                Some(billing) => (AddressChoice::NewAddress, AddressForm::from_address(billing)),
                None => (
                    default_billing
                        .map(AddressChoice::Existing)
                        .unwrap_or(AddressChoice::NewAddress),
                    AddressForm::with_country(country),
                ),
            };
            return Ok(AddressForms {
                choice_form: FormState::unbound(AddressChoiceForm::initial(choice))
                    .with_choices(choices),
                address_form: FormState::unbound(address_form),
                updated: false,
            });
        };

        let mut forms = AddressForms {
            choice_form: FormState::bound(choice_form).with_choices(choices),
            address_form: FormState::bound(address_form),
            updated: false,
        };

        match forms.choice_form.data.clean(user_addresses) {
            Err(errors) => forms.choice_form.errors = errors,
            Ok(AddressChoice::Existing(id)) => {
                let address = user_addresses.iter().find(|a| a.id == id).cloned();
                self.change_billing_address_in_wishlist(conn, wl, address)
                    .await?;
                forms.updated = true;
            }
            Ok(_) => match forms.address_form.data.clean() {
                Ok(data) => {
                    let address = create_address(conn, &data, None).await?;
                    self.change_billing_address_in_wishlist(conn, wl, Some(address))
                        .await?;
                    forms.updated = true;
                }
                Err(errors) => forms.address_form.errors = errors,
            },
        }
        Ok(forms)
    }

    async fn update_anonymous_address<C: ConnectionTrait>(
        &self,
        conn: &C,
        wl: &mut LoadedWishlist,
        email_form: AnonymousUserEmailForm,
        address_form: AddressForm,
        kind: AddressKind,
    ) -> Result<AddressForms<AnonymousUserEmailForm>, ServiceError> {
        let mut forms = AddressForms {
            choice_form: FormState::bound(email_form),
            address_form: FormState::bound(address_form),
            updated: false,
        };

        let email = forms.choice_form.data.clean();
        let data = forms.address_form.data.clean();
        match (email, data) {
            (Ok(email), Ok(data)) => {
                wl.wishlist.email = Some(email);
                self.save(conn, wl).await?;
                let address = create_address(conn, &data, None).await?;
                self.change_address_in_wishlist(conn, wl, Some(address), kind)
                    .await?;
                forms.updated = true;
            }
            (email, data) => {
                if let Err(errors) = email {
                    forms.choice_form.errors = errors;
                }
                if let Err(errors) = data {
                    forms.address_form.errors = errors;
                }
            }
        }
        Ok(forms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::wishlist;

    fn address(city: &str, owner: Option<Uuid>) -> address::Model {
        address::Model {
            id: Uuid::new_v4(),
            user_id: owner,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            company_name: String::new(),
            street_address_1: "1 Navy Yard".into(),
            street_address_2: String::new(),
            city: city.into(),
            city_area: String::new(),
            postal_code: "20001".into(),
            country: "US".into(),
            country_area: String::new(),
            phone: String::new(),
            created_at: Utc::now(),
        }
    }

    fn owner() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "grace@example.com".into(),
            default_shipping_address_id: None,
            default_billing_address_id: None,
            created_at: Utc::now(),
        }
    }

    fn wishlist(user: Option<user::Model>, shipping: Option<address::Model>) -> LoadedWishlist {
        let mut wl = LoadedWishlist::unsaved(
            wishlist::Model::new_unsaved(user.as_ref().map(|u| u.id), "USD"),
            user,
        );
        wl.shipping_address = shipping;
        wl
    }

    #[test]
    fn equality_ignores_id_and_owner() {
        let a = address("WASHINGTON", None);
        let mut b = address("WASHINGTON", Some(Uuid::new_v4()));
        assert!(same_address(&a, &b));
        b.city = "ARLINGTON".into();
        assert!(!same_address(&a, &b));
    }

    #[test]
    fn equal_address_is_not_a_change() {
        let wl = wishlist(None, Some(address("WASHINGTON", None)));
        let new = address("WASHINGTON", None);
        assert_eq!(
            check_new_wishlist_address(&wl, Some(&new), AddressKind::Shipping),
            (false, false)
        );
    }

    #[test]
    fn anonymous_old_address_is_removed() {
        let wl = wishlist(None, Some(address("WASHINGTON", None)));
        let new = address("ARLINGTON", None);
        assert_eq!(
            check_new_wishlist_address(&wl, Some(&new), AddressKind::Shipping),
            (true, true)
        );
        assert_eq!(
            check_new_wishlist_address(&wl, None, AddressKind::Shipping),
            (true, true)
        );
    }

    #[test]
    fn book_address_is_kept() {
        let user = owner();
        let book_entry = address("WASHINGTON", Some(user.id));
        let wl = wishlist(Some(user), Some(book_entry));
        let new = address("ARLINGTON", None);
        assert_eq!(
            check_new_wishlist_address(&wl, Some(&new), AddressKind::Shipping),
            (true, false)
        );
    }

    #[test]
    fn setting_first_address_removes_nothing() {
        let wl = wishlist(None, None);
        let new = address("ARLINGTON", None);
        assert_eq!(
            check_new_wishlist_address(&wl, Some(&new), AddressKind::Billing),
            (true, false)
        );
        assert_eq!(
            check_new_wishlist_address(&wl, None, AddressKind::Billing),
            (false, false)
        );
    }

    #[test]
    fn completeness_follows_form_rules() {
        let mut a = address("WASHINGTON", None);
        assert!(address_is_complete(&a));
        a.postal_code.clear();
        assert!(!address_is_complete(&a));
    }
}
