//! DriftFX Common Types
//!
//! This crate contains shared types used across the DriftFX market engine,
//! including currency symbols, rate rounding, and timing helpers.

pub mod numeric;
pub mod symbol;
pub mod time;

pub use numeric::*;
pub use symbol::*;
pub use time::*;
