//! `stockcast-core`: shared domain primitives.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod month;

pub use error::{DomainError, DomainResult};
pub use id::MaterialId;
pub use month::YearMonth;
