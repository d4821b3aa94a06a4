//! Order lifecycle operations and the event feeds backing them.
//!
//! # Purpose
//! Mutations publish order snapshots onto the in-process bus; subscriptions
//! turn bus topics back into typed order streams after an authorization
//! check at subscription time.
use crate::auth::{FORBIDDEN_MESSAGE, RoleGuard, auth_user};
use crate::model::{Order, OrderItem, OrderStatus, UserRole};
use crate::store::NewOrder;
use async_graphql::{Context, InputObject, Object, Result, SimpleObject, Subscription};
use futures_core::Stream;
use futures_util::StreamExt;
use nosh_bus::EventBus;
use std::sync::Arc;

use super::{Services, internal_error};

/// Feed of freshly placed orders, scoped to one restaurant.
pub fn pending_orders_topic(restaurant_id: i64) -> String {
    format!("orders.pending.{restaurant_id}")
}

/// Feed of orders marked cooked, shared by all delivery riders.
pub const COOKED_ORDERS_TOPIC: &str = "orders.cooked";

/// Feed of status changes for one order.
pub fn order_updates_topic(order_id: i64) -> String {
    format!("orders.updates.{order_id}")
}

fn publish_order(bus: &EventBus, topic: &str, order: &Order) {
    match serde_json::to_value(order) {
        Ok(payload) => {
            bus.publish(topic, payload);
        }
        Err(err) => tracing::error!(error = %err, topic, "failed to encode order event"),
    }
}

fn order_stream(events: nosh_bus::Subscription) -> impl Stream<Item = Order> {
    events.filter_map(|payload| async move {
        match serde_json::from_value::<Order>(payload.as_ref().clone()) {
            Ok(order) => Some(order),
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable order event");
                None
            }
        }
    })
}

#[derive(InputObject)]
pub struct CreateOrderInput {
    pub restaurant_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(SimpleObject)]
pub struct CreateOrderOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub order_id: Option<i64>,
}

#[derive(InputObject)]
pub struct EditOrderInput {
    pub id: i64,
    pub status: OrderStatus,
}

#[derive(SimpleObject)]
pub struct EditOrderOutput {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(InputObject)]
pub struct TakeOrderInput {
    pub id: i64,
}

#[derive(SimpleObject)]
pub struct TakeOrderOutput {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(SimpleObject)]
pub struct GetOrdersOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub orders: Option<Vec<Order>>,
}

#[derive(SimpleObject)]
pub struct GetOrderOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub order: Option<Order>,
}

/// Looks up the owner of the restaurant an order belongs to. Orders always
/// reference a live restaurant, so a missing row is a storage-level fault.
async fn restaurant_owner_id(services: &Services, order: &Order) -> Result<i64> {
    let restaurant = services
        .restaurants
        .find_restaurant_by_id(order.restaurant_id)
        .await
        .map_err(internal_error)?;
    match restaurant {
        Some(restaurant) => Ok(restaurant.owner_id),
        None => Err(internal_error(format!(
            "order {} references missing restaurant {}",
            order.id, order.restaurant_id
        ))),
    }
}

#[derive(Default)]
pub struct OrderQuery;

#[Object]
impl OrderQuery {
    /// Orders visible to the caller in their role: placed by them (client),
    /// assigned to them (rider), or placed at their restaurants (owner).
    #[graphql(guard = "RoleGuard::any()")]
    async fn get_orders(
        &self,
        ctx: &Context<'_>,
        status: Option<OrderStatus>,
    ) -> Result<GetOrdersOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let user = auth_user(ctx)?;
        let orders = match user.role {
            UserRole::Client => services
                .orders
                .list_orders_for_customer(user.id, status)
                .await
                .map_err(internal_error)?,
            UserRole::Delivery => services
                .orders
                .list_orders_for_driver(user.id, status)
                .await
                .map_err(internal_error)?,
            UserRole::Owner => {
                let restaurants = services
                    .restaurants
                    .list_restaurants_by_owner(user.id)
                    .await
                    .map_err(internal_error)?;
                let ids: Vec<i64> = restaurants.iter().map(|r| r.id).collect();
                services
                    .orders
                    .list_orders_for_restaurants(&ids, status)
                    .await
                    .map_err(internal_error)?
            }
        };
        Ok(GetOrdersOutput {
            ok: true,
            error: None,
            orders: Some(orders),
        })
    }

    #[graphql(guard = "RoleGuard::any()")]
    async fn get_order(&self, ctx: &Context<'_>, id: i64) -> Result<GetOrderOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let user = auth_user(ctx)?;
        let order = services
            .orders
            .find_order_by_id(id)
            .await
            .map_err(internal_error)?;
        let Some(order) = order else {
            return Ok(GetOrderOutput {
                ok: false,
                error: Some("Order not found".to_string()),
                order: None,
            });
        };
        let owner_id = restaurant_owner_id(services, &order).await?;
        if !order.visible_to(user, owner_id) {
            return Ok(GetOrderOutput {
                ok: false,
                error: Some("You can't see that".to_string()),
                order: None,
            });
        }
        Ok(GetOrderOutput {
            ok: true,
            error: None,
            order: Some(order),
        })
    }
}

#[derive(Default)]
pub struct OrderMutation;

#[Object]
impl OrderMutation {
    /// Places an order and announces it on the restaurant's pending feed.
    #[graphql(guard = "RoleGuard::only(UserRole::Client)")]
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        input: CreateOrderInput,
    ) -> Result<CreateOrderOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let customer = auth_user(ctx)?;
        let restaurant = services
            .restaurants
            .find_restaurant_by_id(input.restaurant_id)
            .await
            .map_err(internal_error)?;
        if restaurant.is_none() {
            return Ok(CreateOrderOutput {
                ok: false,
                error: Some("Restaurant not found".to_string()),
                order_id: None,
            });
        }
        if input.items.is_empty() {
            return Ok(CreateOrderOutput {
                ok: false,
                error: Some("Order has no items".to_string()),
                order_id: None,
            });
        }
        let total = input
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();
        let order = services
            .orders
            .create_order(NewOrder {
                customer_id: customer.id,
                restaurant_id: input.restaurant_id,
                items: input.items,
                total,
            })
            .await
            .map_err(internal_error)?;
        publish_order(
            &services.bus,
            &pending_orders_topic(order.restaurant_id),
            &order,
        );
        Ok(CreateOrderOutput {
            ok: true,
            error: None,
            order_id: Some(order.id),
        })
    }

    /// Advances an order's status within the caller's allowed transitions.
    /// A transition to cooked additionally lands on the shared rider feed.
    #[graphql(guard = "RoleGuard::any()")]
    async fn edit_order_status(
        &self,
        ctx: &Context<'_>,
        input: EditOrderInput,
    ) -> Result<EditOrderOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let user = auth_user(ctx)?;
        let order = services
            .orders
            .find_order_by_id(input.id)
            .await
            .map_err(internal_error)?;
        let Some(mut order) = order else {
            return Ok(EditOrderOutput {
                ok: false,
                error: Some("Order not found".to_string()),
            });
        };
        let owner_id = restaurant_owner_id(services, &order).await?;
        if !order.visible_to(user, owner_id) {
            return Ok(EditOrderOutput {
                ok: false,
                error: Some("You can't see that".to_string()),
            });
        }
        if !Order::status_editable_by(user.role, input.status) {
            return Ok(EditOrderOutput {
                ok: false,
                error: Some("You can't do that".to_string()),
            });
        }
        order.status = input.status;
        let order = services
            .orders
            .update_order(order)
            .await
            .map_err(internal_error)?;
        publish_order(&services.bus, &order_updates_topic(order.id), &order);
        if order.status == OrderStatus::Cooked {
            publish_order(&services.bus, COOKED_ORDERS_TOPIC, &order);
        }
        Ok(EditOrderOutput {
            ok: true,
            error: None,
        })
    }

    /// Assigns the calling rider to an unclaimed order.
    #[graphql(guard = "RoleGuard::only(UserRole::Delivery)")]
    async fn take_order(&self, ctx: &Context<'_>, input: TakeOrderInput) -> Result<TakeOrderOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let driver = auth_user(ctx)?;
        let order = services
            .orders
            .find_order_by_id(input.id)
            .await
            .map_err(internal_error)?;
        let Some(mut order) = order else {
            return Ok(TakeOrderOutput {
                ok: false,
                error: Some("Order not found".to_string()),
            });
        };
        if order.driver_id.is_some() {
            return Ok(TakeOrderOutput {
                ok: false,
                error: Some("This order already has a driver".to_string()),
            });
        }
        order.driver_id = Some(driver.id);
        let order = services
            .orders
            .update_order(order)
            .await
            .map_err(internal_error)?;
        publish_order(&services.bus, &order_updates_topic(order.id), &order);
        Ok(TakeOrderOutput {
            ok: true,
            error: None,
        })
    }
}

#[derive(Default)]
pub struct OrderSubscription;

#[Subscription]
impl OrderSubscription {
    /// New orders at one of the caller's restaurants, as they are placed.
    #[graphql(guard = "RoleGuard::only(UserRole::Owner)")]
    async fn pending_orders(
        &self,
        ctx: &Context<'_>,
        restaurant_id: i64,
    ) -> Result<impl Stream<Item = Order>> {
        let services = ctx.data::<Arc<Services>>()?;
        let owner = auth_user(ctx)?;
        let restaurant = services
            .restaurants
            .find_restaurant_by_id(restaurant_id)
            .await
            .map_err(internal_error)?;
        let owned = restaurant.is_some_and(|r| r.owner_id == owner.id);
        if !owned {
            return Err(FORBIDDEN_MESSAGE.into());
        }
        let events = services.bus.subscribe(&pending_orders_topic(restaurant_id));
        Ok(order_stream(events))
    }

    /// Orders ready for pickup, fanned out to every connected rider.
    #[graphql(guard = "RoleGuard::only(UserRole::Delivery)")]
    async fn cooked_orders(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Order>> {
        let services = ctx.data::<Arc<Services>>()?;
        let events = services.bus.subscribe(COOKED_ORDERS_TOPIC);
        Ok(order_stream(events))
    }

    /// Status changes for one order the caller is involved in. The payload
    /// filter pins the feed to the requested id even if a publisher reuses
    /// the topic.
    #[graphql(guard = "RoleGuard::any()")]
    async fn order_updates(
        &self,
        ctx: &Context<'_>,
        order_id: i64,
    ) -> Result<impl Stream<Item = Order>> {
        let services = ctx.data::<Arc<Services>>()?;
        let user = auth_user(ctx)?;
        let order = services
            .orders
            .find_order_by_id(order_id)
            .await
            .map_err(internal_error)?;
        let Some(order) = order else {
            return Err(FORBIDDEN_MESSAGE.into());
        };
        let owner_id = restaurant_owner_id(services, &order).await?;
        if !order.visible_to(user, owner_id) {
            return Err(FORBIDDEN_MESSAGE.into());
        }
        let events = services.bus.subscribe_filtered(
            &order_updates_topic(order_id),
            move |payload| payload.get("id").and_then(|id| id.as_i64()) == Some(order_id),
        );
        Ok(order_stream(events))
    }
}
