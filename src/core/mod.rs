//! # Core Module
//!
//! Shared-state primitives used between the authoritative thread and the worker
//! pool.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking

pub mod mt_resource;

pub use mt_resource::MtResource;
