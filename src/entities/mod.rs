/// Database entities for the wishlist flow
pub mod address;
pub mod gift_card;
pub mod order;
pub mod order_gift_card;
pub mod order_line;
pub mod payment;
pub mod product_collection;
pub mod product_variant;
pub mod shipping_method;
pub mod shipping_zone;
pub mod user;
pub mod voucher;
pub mod voucher_customer;
pub mod wishlist;
pub mod wishlist_gift_card;
pub mod wishlist_line;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use gift_card::{Entity as GiftCard, Model as GiftCardModel};
pub use order::{Entity as Order, Model as OrderModel};
pub use order_line::{Entity as OrderLine, Model as OrderLineModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
pub use shipping_method::{Entity as ShippingMethod, Model as ShippingMethodModel, ShippingMethodType};
pub use shipping_zone::{Entity as ShippingZone, Model as ShippingZoneModel};
pub use user::{Entity as User, Model as UserModel};
pub use voucher::{DiscountValueType, Entity as Voucher, Model as VoucherModel, VoucherType};
pub use wishlist::{Entity as Wishlist, Model as WishlistModel};
pub use wishlist_line::{Entity as WishlistLine, Model as WishlistLineModel};
