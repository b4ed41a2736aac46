//! API Module
//!
//! HTTP handlers and routing for the diagnostics REST API.
//!
//! # Endpoints
//! - `GET /resources/:name` - Cached rows of a watched resource
//! - `PUT /resources/:name/:id` - Insert or update a row
//! - `DELETE /resources/:name/:id` - Delete a row
//! - `GET /events` - Recent bus events
//! - `GET /subscriptions` - Channel status per watched resource
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
