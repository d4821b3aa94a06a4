//! Store traits and error types.
//!
//! Persistence is a collaborator behind these traits; the service ships an
//! in-memory implementation and expects durable backends to slot in behind
//! the same contracts.
use crate::model::{Order, OrderItem, OrderStatus, Restaurant, User, UserRole};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct NewRestaurant {
    pub name: String,
    pub address: String,
    pub cover_img: String,
    pub owner_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub items: Vec<OrderItem>,
    pub total: f64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;
}

#[async_trait]
pub trait RestaurantStore: Send + Sync {
    async fn create_restaurant(&self, new_restaurant: NewRestaurant) -> StoreResult<Restaurant>;
    async fn find_restaurant_by_id(&self, id: i64) -> StoreResult<Option<Restaurant>>;
    async fn list_restaurants_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Restaurant>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, new_order: NewOrder) -> StoreResult<Order>;
    async fn find_order_by_id(&self, id: i64) -> StoreResult<Option<Order>>;
    async fn update_order(&self, order: Order) -> StoreResult<Order>;
    /// Orders placed by a customer, optionally narrowed by status.
    async fn list_orders_for_customer(
        &self,
        customer_id: i64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;
    /// Orders assigned to a delivery rider, optionally narrowed by status.
    async fn list_orders_for_driver(
        &self,
        driver_id: i64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;
    /// Orders across a set of restaurants (an owner's), optionally narrowed
    /// by status.
    async fn list_orders_for_restaurants(
        &self,
        restaurant_ids: &[i64],
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;
}
