//! Orders, their line items, and the status lifecycle.
use crate::model::user::{User, UserRole};
use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Enum, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    Cooking,
    Cooked,
    PickedUp,
    Delivered,
}

#[derive(SimpleObject, InputObject, Debug, Clone, Serialize, Deserialize)]
#[graphql(input_name = "OrderItemInput")]
pub struct OrderItem {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub driver_id: Option<i64>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` may read this order. `restaurant_owner_id` is the
    /// owner of the order's restaurant, resolved by the caller.
    pub fn visible_to(&self, user: &User, restaurant_owner_id: i64) -> bool {
        self.customer_id == user.id
            || self.driver_id == Some(user.id)
            || restaurant_owner_id == user.id
    }

    /// Which status values a role is allowed to set. Owners run the
    /// kitchen side of the lifecycle, delivery riders the road side;
    /// clients never edit status.
    pub fn status_editable_by(role: UserRole, next: OrderStatus) -> bool {
        match role {
            UserRole::Client => false,
            UserRole::Owner => matches!(next, OrderStatus::Cooking | OrderStatus::Cooked),
            UserRole::Delivery => matches!(next, OrderStatus::PickedUp | OrderStatus::Delivered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        User {
            id,
            email: format!("user{id}@nosh.test"),
            password_hash: String::new(),
            role,
            verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order() -> Order {
        Order {
            id: 1,
            customer_id: 10,
            restaurant_id: 20,
            driver_id: Some(30),
            items: vec![],
            total: 12.5,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn visibility_covers_customer_driver_and_owner() {
        let order = order();
        assert!(order.visible_to(&user(10, UserRole::Client), 40));
        assert!(order.visible_to(&user(30, UserRole::Delivery), 40));
        assert!(order.visible_to(&user(40, UserRole::Owner), 40));
        assert!(!order.visible_to(&user(99, UserRole::Client), 40));
    }

    #[test]
    fn status_edits_are_role_scoped() {
        assert!(Order::status_editable_by(UserRole::Owner, OrderStatus::Cooking));
        assert!(Order::status_editable_by(UserRole::Owner, OrderStatus::Cooked));
        assert!(!Order::status_editable_by(UserRole::Owner, OrderStatus::PickedUp));
        assert!(Order::status_editable_by(UserRole::Delivery, OrderStatus::PickedUp));
        assert!(Order::status_editable_by(UserRole::Delivery, OrderStatus::Delivered));
        assert!(!Order::status_editable_by(UserRole::Delivery, OrderStatus::Cooked));
        assert!(!Order::status_editable_by(UserRole::Client, OrderStatus::Cooking));
    }
}
