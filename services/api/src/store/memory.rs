//! In-memory implementation of the store traits.
//!
//! # Purpose
//! Backs local development and tests with `HashMap`s guarded by
//! `tokio::sync::RwLock`. Not durable: all state is lost on restart.
//! Operations are consistent within one process; write locks serialize
//! mutations, reads run concurrently.
use super::{
    NewOrder, NewRestaurant, NewUser, OrderStore, RestaurantStore, StoreError, StoreResult,
    UserStore,
};
use crate::model::{Order, OrderStatus, Restaurant, User};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, User>>,
    restaurants: RwLock<HashMap<i64, Restaurant>>,
    orders: RwLock<HashMap<i64, Order>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            restaurants: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    // One id space across entities keeps test fixtures unambiguous.
    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|user| user.email == new_user.email) {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                new_user.email
            )));
        }
        let now = Utc::now();
        let user = User {
            id: self.assign_id(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            verified: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn update_user(&self, mut user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        user.updated_at = Utc::now();
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RestaurantStore for MemoryStore {
    async fn create_restaurant(&self, new_restaurant: NewRestaurant) -> StoreResult<Restaurant> {
        let mut restaurants = self.restaurants.write().await;
        let restaurant = Restaurant {
            id: self.assign_id(),
            name: new_restaurant.name,
            address: new_restaurant.address,
            cover_img: new_restaurant.cover_img,
            owner_id: new_restaurant.owner_id,
            created_at: Utc::now(),
        };
        restaurants.insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn find_restaurant_by_id(&self, id: i64) -> StoreResult<Option<Restaurant>> {
        Ok(self.restaurants.read().await.get(&id).cloned())
    }

    async fn list_restaurants_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Restaurant>> {
        let mut owned: Vec<Restaurant> = self
            .restaurants
            .read()
            .await
            .values()
            .filter(|restaurant| restaurant.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|restaurant| restaurant.id);
        Ok(owned)
    }
}

fn matches_status(order: &Order, status: Option<OrderStatus>) -> bool {
    status.map_or(true, |wanted| order.status == wanted)
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, new_order: NewOrder) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let now = Utc::now();
        let order = Order {
            id: self.assign_id(),
            customer_id: new_order.customer_id,
            restaurant_id: new_order.restaurant_id,
            driver_id: None,
            items: new_order.items,
            total: new_order.total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order_by_id(&self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order(&self, mut order: Order) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        order.updated_at = Utc::now();
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_orders_for_customer(
        &self,
        customer_id: i64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.customer_id == customer_id && matches_status(order, status))
            .cloned()
            .collect();
        found.sort_by_key(|order| order.id);
        Ok(found)
    }

    async fn list_orders_for_driver(
        &self,
        driver_id: i64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.driver_id == Some(driver_id) && matches_status(order, status))
            .cloned()
            .collect();
        found.sort_by_key(|order| order.id);
        Ok(found)
    }

    async fn list_orders_for_restaurants(
        &self,
        restaurant_ids: &[i64],
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| {
                restaurant_ids.contains(&order.restaurant_id) && matches_status(order, status)
            })
            .cloned()
            .collect();
        found.sort_by_key(|order| order.id);
        Ok(found)
    }
}
