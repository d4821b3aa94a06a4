//! Domain entities shared by the stores and the GraphQL schema.
pub mod order;
pub mod restaurant;
pub mod user;

pub use order::{Order, OrderItem, OrderStatus};
pub use restaurant::Restaurant;
pub use user::{User, UserRole};
