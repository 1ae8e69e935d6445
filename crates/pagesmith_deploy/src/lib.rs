//! Materialization and publishing layer for pagesmith.
//!
//! Turns structured artifacts into on-disk output directories, runs the
//! external build toolchain for project layouts, and copies results into
//! publicly addressable deploy slots.

pub mod builder;
pub mod deploy;
pub mod error;
pub mod saver;
pub mod screenshot;

pub use builder::{BuildConfig, ProjectBuilder};
pub use deploy::{generate_deploy_key, DeployManager, DEPLOY_KEY_LEN};
pub use error::{DeployError, DeployResult};
pub use saver::FileMaterializer;
pub use screenshot::{
    CommandScreenshotter, LocalObjectStore, ObjectStore, ScreenshotService, Screenshotter,
};
