//! Core types for Stockbridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod code;
pub mod id;
pub mod movement;

pub use code::{LotCode, ProductCode, ProductLotCode};
pub use id::*;
pub use movement::{AdjustmentDirection, MovementKey, MovementType, MovementTypeParseError};
