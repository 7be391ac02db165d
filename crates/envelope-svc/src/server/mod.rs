//! Axum HTTP server, routing, and handlers.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Map engine errors onto HTTP statuses without leaking values.

pub mod handlers;
pub mod router;
pub mod state;
