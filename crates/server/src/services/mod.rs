//! Business logic services.

pub mod auth;
pub mod engine;
pub mod pictures;
pub mod quota;
pub mod scope;
