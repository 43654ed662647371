//! Core types shared by the geograsp crates.
//!
//! - [`point_cloud`]: structure-of-arrays point cloud with optional colors and normals
//! - [`geometry`]: plane, axis and grasp models
//! - [`robust`]: generic RANSAC engine with an injectable random source
//! - [`runtime`]: worker/thread-pool configuration

pub mod geometry;
pub mod point_cloud;
pub mod robust;
pub mod runtime;

pub use geometry::*;
pub use point_cloud::*;
pub use robust::*;
pub use runtime::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Index {index} out of range for {len} grasps")]
    OutOfRange { index: usize, len: usize },
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// True for the geometric failure class, as opposed to bad arguments.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateGeometry(_))
    }
}
