//! Role-based access guard for GraphQL operations.
//!
//! # Purpose
//! Each non-public operation attaches a [`RoleGuard`] carrying its
//! [`RoleRequirement`]; async-graphql consults the guard immediately before
//! the operation resolver runs, after identity resolution. Operations with
//! no guard are public and never trigger an identity check.
//!
//! Denials surface as operation-level errors with a fixed message; the
//! caller learns nothing about why access was refused.
use crate::auth::context::CallerContext;
use crate::model::{User, UserRole};
use async_graphql::{Context, Guard, Result};

/// The one message every authorization denial carries.
pub const FORBIDDEN_MESSAGE: &str = "Forbidden resource";

/// Declared access requirement of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any authenticated identity.
    Any,
    /// Only identities holding this role.
    Only(UserRole),
}

impl RoleRequirement {
    /// The decision table: anonymous callers are always denied, `Any`
    /// admits every authenticated user, a named role admits only matches.
    pub fn permits(&self, user: Option<&User>) -> bool {
        match (self, user) {
            (_, None) => false,
            (RoleRequirement::Any, Some(_)) => true,
            (RoleRequirement::Only(role), Some(user)) => user.role == *role,
        }
    }
}

pub struct RoleGuard {
    requirement: RoleRequirement,
}

impl RoleGuard {
    pub fn any() -> Self {
        Self {
            requirement: RoleRequirement::Any,
        }
    }

    pub fn only(role: UserRole) -> Self {
        Self {
            requirement: RoleRequirement::Only(role),
        }
    }
}

impl Guard for RoleGuard {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        let user = ctx
            .data_opt::<CallerContext>()
            .and_then(CallerContext::user);
        if self.requirement.permits(user) {
            Ok(())
        } else {
            Err(FORBIDDEN_MESSAGE.into())
        }
    }
}

/// The resolved caller for a guarded operation. By construction this never
/// fails after a passing [`RoleGuard`]; the error arm only covers misuse
/// on unguarded paths.
pub fn auth_user<'a>(ctx: &Context<'a>) -> Result<&'a User> {
    ctx.data_opt::<CallerContext>()
        .and_then(CallerContext::user)
        .ok_or_else(|| FORBIDDEN_MESSAGE.into())
}
