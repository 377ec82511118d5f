pub mod health;
pub mod wishlist;

pub use crate::AppState;
