pub mod models;
pub mod service;
pub mod store;

pub use models::{Cart, CartItem, CartLine};
pub use service::CartService;
pub use store::CartStore;
