//! Pic Profile Maker Core - Shared domain types.
//!
//! This crate provides the types shared by every Pic Profile Maker component:
//! - `server` - HTTP service that orchestrates picture requests
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP. Anything that crosses a trust boundary (tier names, colors,
//! face indexes, emails) is parsed into one of these types before use.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, quality tiers, colors, face indexes and origins

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
