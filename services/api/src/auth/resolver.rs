//! Request-scoped identity resolution.
//!
//! # Purpose
//! Runs once per inbound request, before any operation resolver: extract
//! the token header, verify it, load the user, and attach a
//! [`CallerContext`]. Every failure along the way downgrades silently to
//! anonymous so that `Public` operations keep working with a bad token.
use crate::auth::context::{CallerContext, TOKEN_HEADER};
use crate::store::UserStore;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use nosh_token::TokenCodec;
use std::sync::Arc;

pub struct IdentityResolver {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { codec, users }
    }

    /// Resolve a caller from request headers. Missing header, unverifiable
    /// token, and unknown subject all yield an anonymous context.
    pub async fn resolve(&self, headers: &HeaderMap) -> CallerContext {
        let Some(raw) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) else {
            return CallerContext::anonymous();
        };
        self.resolve_token(raw).await
    }

    /// Resolve a caller from a raw token string (used by the websocket
    /// connection-init payload, which carries the token out of band).
    pub async fn resolve_token(&self, token: &str) -> CallerContext {
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(error = %err, "token verification failed; continuing as anonymous");
                return CallerContext::anonymous();
            }
        };
        match self.users.find_user_by_id(claims.sub).await {
            Ok(Some(user)) => CallerContext::authenticated(user),
            Ok(None) => {
                tracing::debug!(subject = claims.sub, "token subject not found; continuing as anonymous");
                CallerContext::anonymous()
            }
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed; continuing as anonymous");
                CallerContext::anonymous()
            }
        }
    }

    /// Attach a caller context to the request exactly once. A second call
    /// on the same request is a no-op: the context, once attached, is
    /// immutable for the life of the request.
    pub async fn ensure_context<B>(&self, request: &mut axum::http::Request<B>) {
        if request.extensions().get::<CallerContext>().is_some() {
            return;
        }
        let caller = self.resolve(request.headers()).await;
        request.extensions_mut().insert(caller);
    }
}

/// Axum middleware wrapping [`IdentityResolver::ensure_context`].
pub async fn attach_identity(
    State(resolver): State<Arc<IdentityResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    resolver.ensure_context(&mut request).await;
    next.run(request).await
}
