//! Restaurant registration and owner listings.
use crate::auth::{RoleGuard, auth_user};
use crate::model::{Restaurant, UserRole};
use crate::store::NewRestaurant;
use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use std::sync::Arc;

use super::{Services, internal_error};

#[derive(InputObject)]
pub struct CreateRestaurantInput {
    pub name: String,
    pub address: String,
    pub cover_img: String,
}

#[derive(SimpleObject)]
pub struct CreateRestaurantOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub restaurant_id: Option<i64>,
}

#[derive(Default)]
pub struct RestaurantQuery;

#[Object]
impl RestaurantQuery {
    #[graphql(guard = "RoleGuard::only(UserRole::Owner)")]
    async fn my_restaurants(&self, ctx: &Context<'_>) -> Result<Vec<Restaurant>> {
        let services = ctx.data::<Arc<Services>>()?;
        let owner = auth_user(ctx)?;
        services
            .restaurants
            .list_restaurants_by_owner(owner.id)
            .await
            .map_err(internal_error)
    }
}

#[derive(Default)]
pub struct RestaurantMutation;

#[Object]
impl RestaurantMutation {
    #[graphql(guard = "RoleGuard::only(UserRole::Owner)")]
    async fn create_restaurant(
        &self,
        ctx: &Context<'_>,
        input: CreateRestaurantInput,
    ) -> Result<CreateRestaurantOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let owner = auth_user(ctx)?;
        let restaurant = services
            .restaurants
            .create_restaurant(NewRestaurant {
                name: input.name,
                address: input.address,
                cover_img: input.cover_img,
                owner_id: owner.id,
            })
            .await
            .map_err(internal_error)?;
        Ok(CreateRestaurantOutput {
            ok: true,
            error: None,
            restaurant_id: Some(restaurant.id),
        })
    }
}
