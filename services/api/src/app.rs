//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Identity resolution happens once per request in middleware; the GraphQL
//! handler only moves the resolved caller into the request data. WebSocket
//! connections carry the token in the `connection_init` payload instead of
//! a header, so they resolve identity at handshake time.
use crate::auth::{CallerContext, IdentityResolver, TOKEN_HEADER, attach_identity};
use crate::graphql::NoshSchema;
use async_graphql::http::{ALL_WEBSOCKET_PROTOCOLS, GraphiQLSource};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::Extension;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Html, IntoResponse, Response};
use axum::{Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub schema: NoshSchema,
    pub resolver: Arc<IdentityResolver>,
    pub metrics: PrometheusHandle,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/graphql",
            axum::routing::get(graphiql).post(graphql_handler),
        )
        .route("/graphql/ws", axum::routing::get(graphql_ws_handler))
        .route("/healthz", axum::routing::get(healthz))
        .route("/metrics", axum::routing::get(render_metrics))
        .layer(middleware::from_fn_with_state(
            state.resolver.clone(),
            attach_identity,
        ))
        .layer(trace_layer)
        .with_state(state)
}

async fn graphiql() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql/ws")
            .finish(),
    )
}

async fn graphql_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    state
        .schema
        .execute(req.into_inner().data(caller))
        .await
        .into()
}

async fn graphql_ws_handler(
    State(state): State<AppState>,
    protocol: GraphQLProtocol,
    upgrade: WebSocketUpgrade,
) -> Response {
    let schema = state.schema.clone();
    let resolver = state.resolver.clone();
    upgrade
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |socket| async move {
            GraphQLWebSocket::new(socket, schema, protocol)
                .on_connection_init(move |init| {
                    let resolver = resolver.clone();
                    async move {
                        let mut data = async_graphql::Data::default();
                        let caller = match init.get(TOKEN_HEADER).and_then(|v| v.as_str()) {
                            Some(token) => resolver.resolve_token(token).await,
                            None => CallerContext::anonymous(),
                        };
                        data.insert(caller);
                        Ok(data)
                    }
                })
                .serve()
                .await
        })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
