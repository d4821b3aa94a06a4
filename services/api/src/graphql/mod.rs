//! GraphQL schema assembly.
//!
//! # Purpose
//! Merges the per-domain query, mutation, and subscription objects into a
//! single schema and carries the shared service bundle in schema data.
use crate::auth::IdentityResolver;
use crate::auth::password::PasswordHasher;
use crate::store::{OrderStore, RestaurantStore, UserStore};
use async_graphql::{MergedObject, MergedSubscription, Schema};
use nosh_bus::EventBus;
use nosh_token::TokenCodec;
use std::sync::Arc;

pub mod orders;
pub mod restaurants;
pub mod users;

pub use orders::{OrderMutation, OrderQuery, OrderSubscription};
pub use restaurants::{RestaurantMutation, RestaurantQuery};
pub use users::{UserMutation, UserQuery};

/// Shared handles every resolver reaches through schema data.
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub restaurants: Arc<dyn RestaurantStore>,
    pub orders: Arc<dyn OrderStore>,
    pub bus: EventBus,
    pub codec: Arc<TokenCodec>,
    pub passwords: Arc<dyn PasswordHasher>,
}

impl Services {
    pub fn identity_resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.codec.clone(), self.users.clone())
    }
}

#[derive(MergedObject, Default)]
pub struct QueryRoot(UserQuery, RestaurantQuery, OrderQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(UserMutation, RestaurantMutation, OrderMutation);

#[derive(MergedSubscription, Default)]
pub struct SubscriptionRoot(OrderSubscription);

pub type NoshSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

pub fn build_schema(services: Arc<Services>) -> NoshSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        SubscriptionRoot::default(),
    )
    .data(services)
    .finish()
}

/// Collapses storage failures into an opaque operation error. The underlying
/// cause goes to the log, never to the client.
pub(crate) fn internal_error(err: impl std::fmt::Display) -> async_graphql::Error {
    tracing::error!(error = %err, "internal error while serving request");
    async_graphql::Error::new("internal error")
}
