//! Account, session, and profile operations.
use crate::auth::{RoleGuard, auth_user};
use crate::model::{User, UserRole};
use crate::store::{NewUser, StoreError};
use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use std::sync::Arc;

use super::{Services, internal_error};

#[derive(InputObject)]
pub struct CreateAccountInput {
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(SimpleObject)]
pub struct CreateAccountOutput {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(SimpleObject)]
pub struct LoginOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub token: Option<String>,
}

#[derive(InputObject)]
pub struct EditProfileInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(SimpleObject)]
pub struct EditProfileOutput {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(SimpleObject)]
pub struct UserProfileOutput {
    pub ok: bool,
    pub error: Option<String>,
    pub user: Option<User>,
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The authenticated caller's own record.
    #[graphql(guard = "RoleGuard::any()")]
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        Ok(auth_user(ctx)?.clone())
    }

    #[graphql(guard = "RoleGuard::any()")]
    async fn user_profile(&self, ctx: &Context<'_>, user_id: i64) -> Result<UserProfileOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        match services.users.find_user_by_id(user_id).await {
            Ok(Some(user)) => Ok(UserProfileOutput {
                ok: true,
                error: None,
                user: Some(user),
            }),
            Ok(None) => Ok(UserProfileOutput {
                ok: false,
                error: Some("User not found".to_string()),
                user: None,
            }),
            Err(err) => Err(internal_error(err)),
        }
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Registers a new account. Public: no token required.
    async fn create_account(
        &self,
        ctx: &Context<'_>,
        input: CreateAccountInput,
    ) -> Result<CreateAccountOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let existing = services
            .users
            .find_user_by_email(&input.email)
            .await
            .map_err(internal_error)?;
        if existing.is_some() {
            return Ok(CreateAccountOutput {
                ok: false,
                error: Some("There is a user with that email already".to_string()),
            });
        }
        let new_user = NewUser {
            email: input.email,
            password_hash: services.passwords.hash(&input.password),
            role: input.role,
        };
        match services.users.create_user(new_user).await {
            Ok(_) => Ok(CreateAccountOutput {
                ok: true,
                error: None,
            }),
            Err(StoreError::Conflict(_)) => Ok(CreateAccountOutput {
                ok: false,
                error: Some("There is a user with that email already".to_string()),
            }),
            Err(err) => Err(internal_error(err)),
        }
    }

    /// Exchanges credentials for a signed token. Public: no token required.
    async fn login(&self, ctx: &Context<'_>, input: LoginInput) -> Result<LoginOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let user = services
            .users
            .find_user_by_email(&input.email)
            .await
            .map_err(internal_error)?;
        let Some(user) = user else {
            return Ok(LoginOutput {
                ok: false,
                error: Some("User not found".to_string()),
                token: None,
            });
        };
        if !services
            .passwords
            .matches(&input.password, &user.password_hash)
        {
            return Ok(LoginOutput {
                ok: false,
                error: Some("Wrong password".to_string()),
                token: None,
            });
        }
        let token = services.codec.sign(user.id).map_err(internal_error)?;
        Ok(LoginOutput {
            ok: true,
            error: None,
            token: Some(token),
        })
    }

    /// Updates the caller's email and/or password. Changing the email resets
    /// the verified flag.
    #[graphql(guard = "RoleGuard::any()")]
    async fn edit_profile(
        &self,
        ctx: &Context<'_>,
        input: EditProfileInput,
    ) -> Result<EditProfileOutput> {
        let services = ctx.data::<Arc<Services>>()?;
        let mut user = auth_user(ctx)?.clone();
        if let Some(email) = input.email {
            if email != user.email {
                let taken = services
                    .users
                    .find_user_by_email(&email)
                    .await
                    .map_err(internal_error)?;
                if taken.is_some() {
                    return Ok(EditProfileOutput {
                        ok: false,
                        error: Some("There is a user with that email already".to_string()),
                    });
                }
                user.email = email;
                user.verified = false;
            }
        }
        if let Some(password) = input.password {
            user.password_hash = services.passwords.hash(&password);
        }
        services
            .users
            .update_user(user)
            .await
            .map_err(internal_error)?;
        Ok(EditProfileOutput {
            ok: true,
            error: None,
        })
    }
}
