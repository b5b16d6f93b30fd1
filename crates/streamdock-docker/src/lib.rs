//! Container runtime access for streamdock.
//!
//! This crate defines the [`ContainerDriver`] interface the session
//! workflows call through, and its Docker implementation built on bollard.

mod archive;
mod container;
mod driver;
mod logs;
mod volumes;

pub use archive::archive_directory;
pub use container::DockerDriver;
pub use driver::{ContainerDriver, ContainerHandle, ContainerState, ImageInfo, RunSpec};
pub use logs::LogStream;
pub use volumes::{VolumeBinding, VolumeMap, VolumeMode};
