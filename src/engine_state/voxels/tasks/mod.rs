//! # Voxel Task System
//!
//! Tasks related to voxel world generation. They are processed on the worker pool
//! so the authoritative loop never waits on terrain generation.

pub mod chunk_generation_task;
