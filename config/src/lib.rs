//! # Configuration Structures
//!
//! Configuration surface for the ephemeris subsystem, consumed at manager
//! construction. All structures use `serde` for deserialization, carry
//! `Default`s that work out of the box, and validate with `validator`.

pub mod config;

pub use config::{CacheConfig, EphemerisConfig, HealthCheckConfig, RetryPolicy};
