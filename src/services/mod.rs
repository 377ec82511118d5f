pub mod taxes;
pub mod wishlist;
