//! # Gatekeeper server
//! This crate hosts the HTTP side of the request gatekeeper. It is responsible for:
//! * Declaring, per route, which checks a request must pass ([`pipeline::RoutePolicy`]).
//! * Running those checks in a fixed order in actix middleware: rate limits, bearer token or partner signature,
//!   verification tier, two-factor step-up and permission.
//! * Turning every failure into a single JSON error response, and publishing what was verified to handlers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Demonstration routes, one for each kind of route policy. See [routes](routes/index.html).
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
