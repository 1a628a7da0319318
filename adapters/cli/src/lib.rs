#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adapter that runs save maintenance against a Space Engineers save folder.
//!
//! The library half holds everything touching the file system (configuration,
//! backups, the terrain archive) and the pipeline wiring the pure systems
//! together; the binary only parses flags and installs logging.

pub mod backup;
pub mod config;
pub mod maintenance;
pub mod voxel;

pub use config::MaintenanceConfig;
pub use maintenance::{Maintenance, RunReport, SaveFolder, SOCIAL_STORE_FILE, WORLD_STORE_FILE};
pub use voxel::{FsVoxelArchive, VoxelArchive};
