//! Guards run before the wizard steps. Each one either lets the step
//! proceed or sends the customer back to the step that needs attention.

use crate::services::wishlist::addresses::address_is_complete;
use crate::services::wishlist::forms::{FormState, WishlistVoucherForm};
use crate::services::wishlist::vouchers::find_active_voucher;
use crate::services::wishlist::{LoadedWishlist, WishlistService};

use super::request::{
    PostData, WishlistRequest, WizardExit, INDEX, SHIPPING_ADDRESS, SHIPPING_METHOD, SUMMARY,
};

pub const VOUCHER_EXPIRED: &str = "This voucher has expired. Please review your wishlist.";

pub fn validate_wishlist(wl: &LoadedWishlist) -> Result<(), WizardExit> {
    if wl.is_empty() {
        return Err(WizardExit::to(INDEX));
    }
    Ok(())
}

pub fn validate_shipping_address(wl: &LoadedWishlist) -> Result<(), WizardExit> {
    let complete = wl.customer_email().is_some()
        && wl.shipping_address.as_ref().is_some_and(address_is_complete);
    if !complete {
        return Err(WizardExit::to(SHIPPING_ADDRESS));
    }
    Ok(())
}

pub async fn validate_shipping_method(
    service: &WishlistService,
    wl: &mut LoadedWishlist,
) -> Result<(), WizardExit> {
    if !service.is_valid_shipping_method(service.db(), wl).await? {
        return Err(WizardExit::to(SHIPPING_METHOD));
    }
    Ok(())
}

pub fn validate_is_shipping_required(wl: &LoadedWishlist) -> Result<(), WizardExit> {
    if !wl.is_shipping_required() {
        return Err(WizardExit::to(SUMMARY));
    }
    Ok(())
}

/// Drops a voucher code that no longer matches an active voucher
pub async fn validate_voucher(
    service: &WishlistService,
    req: &mut WishlistRequest,
    wl: &mut LoadedWishlist,
) -> Result<(), WizardExit> {
    let Some(code) = wl.wishlist.voucher_code.clone() else {
        return Ok(());
    };
    if find_active_voucher(service.db(), &code, false)
        .await?
        .is_none()
    {
        service.remove_voucher_from_wishlist(service.db(), wl).await?;
        req.warning(VOUCHER_EXPIRED);
        return Err(WizardExit::to(SUMMARY));
    }
    Ok(())
}

/// The discount box shown on every wizard step
pub struct VoucherStep {
    pub form: FormState<WishlistVoucherForm>,
    /// What is left of the submission for the step's own forms
    pub data: Option<PostData>,
}

/// Handles a submitted discount code before the step runs. A valid code
/// sends the customer back where they came from; an invalid one removes
/// the current voucher and the step runs as if nothing was posted.
pub async fn add_voucher_form(
    service: &WishlistService,
    req: &WishlistRequest,
    wl: &mut LoadedWishlist,
    data: Option<PostData>,
) -> Result<VoucherStep, WizardExit> {
    let Some(form) = data.as_ref().and_then(PostData::voucher_form) else {
        service.recalculate_wishlist_discount(service.db(), wl).await?;
        return Ok(VoucherStep {
            form: FormState::unbound(WishlistVoucherForm::default()),
            data,
        });
    };

    let mut state = FormState::bound(form);
    match service
        .apply_voucher_form(service.db(), wl, &state.data)
        .await?
    {
        Ok(()) => Err(WizardExit::Redirect(req.back_target())),
        Err(errors) => {
            service.remove_voucher_from_wishlist(service.db(), wl).await?;
            state.errors = errors;
            Ok(VoucherStep {
                form: state,
                data: None,
            })
        }
    }
}
