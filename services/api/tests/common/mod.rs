//! Shared fixtures for the integration tests.
#![allow(dead_code)]
use nosh_api::auth::CallerContext;
use nosh_api::auth::password::SaltedSha256;
use nosh_api::graphql::{NoshSchema, Services, build_schema};
use nosh_api::model::{Order, OrderItem, Restaurant, User, UserRole};
use nosh_api::store::memory::MemoryStore;
use nosh_api::store::{NewOrder, NewRestaurant, NewUser, OrderStore, RestaurantStore, UserStore};
use nosh_bus::EventBus;
use nosh_token::TokenCodec;
use std::sync::Arc;

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub schema: NoshSchema,
    pub services: Arc<Services>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let services = Arc::new(Services {
        users: store.clone(),
        restaurants: store.clone(),
        orders: store,
        bus: EventBus::new(),
        codec: Arc::new(TokenCodec::new(TEST_SECRET)),
        passwords: Arc::new(SaltedSha256::new(TEST_SECRET)),
    });
    TestApp {
        schema: build_schema(services.clone()),
        services,
    }
}

impl TestApp {
    pub async fn seed_user(&self, email: &str, password: &str, role: UserRole) -> User {
        self.services
            .users
            .create_user(NewUser {
                email: email.to_string(),
                password_hash: self.services.passwords.hash(password),
                role,
            })
            .await
            .expect("seed user")
    }

    pub async fn seed_restaurant(&self, owner: &User, name: &str) -> Restaurant {
        self.services
            .restaurants
            .create_restaurant(NewRestaurant {
                name: name.to_string(),
                address: "1 Test St".to_string(),
                cover_img: "https://img.example/cover.png".to_string(),
                owner_id: owner.id,
            })
            .await
            .expect("seed restaurant")
    }

    pub async fn seed_order(&self, customer: &User, restaurant: &Restaurant) -> Order {
        self.services
            .orders
            .create_order(NewOrder {
                customer_id: customer.id,
                restaurant_id: restaurant.id,
                items: vec![OrderItem {
                    name: "dumplings".to_string(),
                    price: 9.5,
                    quantity: 2,
                }],
                total: 19.0,
            })
            .await
            .expect("seed order")
    }
}

pub fn as_caller(user: &User) -> CallerContext {
    CallerContext::authenticated(user.clone())
}
