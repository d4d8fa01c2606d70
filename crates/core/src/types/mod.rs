//! Core types for Pic Profile Maker.
//!
//! This module provides type-safe wrappers for the picture-request domain.

pub mod color;
pub mod email;
pub mod face;
pub mod id;
pub mod origin;
pub mod tier;

pub use color::{Color, ColorError, ColorSpec};
pub use email::{Email, EmailError};
pub use face::{FaceIndex, FaceIndexError};
pub use id::*;
pub use origin::Origin;
pub use tier::{Dimension, QualityTier, TierError};
