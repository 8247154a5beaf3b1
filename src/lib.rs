#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Chunk Tasks
//!
//! Background chunk generation for a single-threaded authoritative simulation loop.
//!
//! Terrain and biome generation is expensive and must never stall the loop that
//! owns the world. This crate runs it on a pool of worker threads and hands the
//! finished chunks back to the authoritative thread, which commits them at a
//! point of its choosing, once per tick.
//!
//! ## Key Modules
//!
//! * `core` - Shared-state primitives (`MtResource`)
//! * `config` - JSON-loadable settings for the task manager and the demo run
//! * `engine_state::task_management` - Worker pool, task manager, result envelopes
//! * `engine_state::voxels` - Chunks, generators, the world and the generation task
//! * `engine_state` - `EngineState`, the host-facing start/tick/stop glue
//!
//! ## Guarantees
//!
//! * `submit` and `drain_completed` never block the authoritative thread
//! * Each finished task is applied or reported exactly once, on the draining thread
//! * Nothing is applied after `deactivate`; undrained results are discarded
//! * A failing or panicking task never takes a worker thread down
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() {
//!     if let Err(error) = voxel_chunk_tasks::run() {
//!         eprintln!("{error}");
//!     }
//! }
//! ```

use std::{env, sync::Arc, thread, time::Instant};

use log::info;
use thiserror::Error;

pub mod config;
pub mod core;
pub mod engine_state;

use config::{ConfigError, RunConfig};
use engine_state::{
    task_management::{diagnostics::LogDiagnostics, error::TaskError},
    voxels::{chunk_pos, generator::PerlinChunkGenerator},
    EngineState,
};

/// Errors that abort [`run`].
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The task manager could not be activated.
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Initialises logging the same way for every entry point.
///
/// Logs go to stdout, filtered by `RUST_LOG`. Calling this twice is harmless.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Runs the demo: generates a square of chunks around the origin, ticking until
/// every chunk is committed or the tick budget runs out.
///
/// The first command-line argument, if present, is the path of a JSON
/// [`RunConfig`].
pub fn run() -> Result<(), RunError> {
    init_logging();
    info!("Logger initialized");

    let config = match env::args().nth(1) {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };
    run_with(&config)
}

/// Runs the demo with an explicit configuration.
pub fn run_with(config: &RunConfig) -> Result<(), RunError> {
    let mut engine = EngineState::new(
        config.tasks.clone(),
        PerlinChunkGenerator::new(config.generator.clone()),
        Arc::new(LogDiagnostics::default()),
    );
    engine.start()?;

    let started = Instant::now();
    let requested = engine.request_area(chunk_pos(0, 0), config.area_radius);
    info!("Requested {} chunk(s)", requested);

    let mut ticks = 0;
    let mut failed = 0;
    while !engine.is_idle() && ticks < config.max_ticks {
        let summary = engine.tick();
        failed += summary.failed + summary.rejected;
        ticks += 1;
        thread::sleep(config.tick_interval());
    }

    let generated = engine.world().get().chunk_count();
    info!(
        "Generated {} of {} chunk(s) in {} tick(s), {:?}; {} failed, {} still pending",
        generated,
        requested,
        ticks,
        started.elapsed(),
        failed,
        engine.pending_count()
    );

    if let Some(report) = engine.stop() {
        info!(
            "Shutdown joined {} worker(s), {} timed out, {} result(s) discarded",
            report.joined, report.timed_out, report.discarded_results
        );
    }
    Ok(())
}
