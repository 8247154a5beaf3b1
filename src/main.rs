//! # Voxel Chunk Tasks Entry Point
//!
//! Runs the background chunk generation demo. It simply calls into the library's
//! `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

fn main() {
    if let Err(error) = voxel_chunk_tasks::run() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
