//! API Module
//!
//! HTTP handlers and routing for the page cache service.
//!
//! # Endpoints
//! - `GET /page?url=` - Fetch a page through the counter and cache
//! - `GET /count?url=` - Access count for a URL
//! - `GET /stats` - Cache hit/miss statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
