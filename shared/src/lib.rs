//! Shared types and models for the Indago coffee pipeline
//!
//! This crate holds the entities exchanged between the order, kitchen,
//! inventory, finance and sales services, together with the pure
//! computations (aggregation, production planning, consumption, scoring)
//! that every service must agree on.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
