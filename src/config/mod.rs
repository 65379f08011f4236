//! # VelDB Configuration Module
//!
//! Centralizes all configuration constants. Interdependent values are grouped
//! and documented in [`constants`], with compile-time assertions guarding the
//! relationships between them.

pub mod constants;
pub use constants::*;
