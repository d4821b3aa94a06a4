//! Per-request caller identity.
use crate::model::User;

/// Request header carrying the identity token. Its absence means an
/// anonymous call, never an error.
pub const TOKEN_HEADER: &str = "x-token";

/// The resolved identity of one request.
///
/// Constructed exactly once at request entry and immutable afterwards;
/// `Public` operations see it anonymous, everything past the role guard
/// sees a user.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    user: Option<User>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }
}
