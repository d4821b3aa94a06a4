//! nosh API service library crate.
//!
//! # Purpose
//! Exposes the GraphQL schema, the auth pipeline, configuration, and the
//! in-memory store implementations for use by the binary and tests.
pub mod app;
pub mod auth;
pub mod config;
pub mod graphql;
pub mod model;
pub mod observability;
pub mod store;
