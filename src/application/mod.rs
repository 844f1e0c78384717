//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use case: scoring one assessment request.

mod scoring;

pub use scoring::ScoringService;

#[cfg(test)]
pub(crate) use scoring::test_support;
