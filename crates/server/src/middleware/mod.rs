//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Body limit (largest upload ceiling plus multipart framing)
//! 5. Rate limiting on account endpoints (governor)

pub mod auth;
pub mod client_ip;
pub mod rate_limit;
pub mod request_id;

pub use auth::BearerUser;
pub use client_ip::{ClientOrigin, client_ip};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
