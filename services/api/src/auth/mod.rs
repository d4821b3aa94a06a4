//! Authentication and authorization pipeline.
//!
//! # Purpose
//! Groups the per-request identity resolution (token header -> verified
//! user), the role guard consulted before each operation, and the password
//! hashing seam.
pub mod context;
pub mod guard;
pub mod password;
pub mod resolver;

pub use context::{CallerContext, TOKEN_HEADER};
pub use guard::{auth_user, RoleGuard, RoleRequirement, FORBIDDEN_MESSAGE};
pub use resolver::{attach_identity, IdentityResolver};
