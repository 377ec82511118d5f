pub mod request_id;
pub mod wishlist_merge;

pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
pub use wishlist_merge::merge_anonymous_wishlist;
