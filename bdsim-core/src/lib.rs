//! Shared primitives, traits, and utilities for the bdsim birth-death simulators.
//!
//! `bdsim-core` provides the foundation the simulation crates build on:
//!
//! - **Error types**: [`BdsimError`] and [`Result`] for structured error handling
//! - **Random sources**: the [`RandomSource`] trait every simulator draws from
//! - **Traits**: Small shared abstractions like [`Summarizable`]

pub mod error;
pub mod random;
pub mod traits;

pub use error::{BdsimError, Result};
pub use random::RandomSource;
pub use traits::*;
