//! Point cloud operations used by the grasp planner
//!
//! # Module Organization
//!
//! - `spatial`: R*-tree backed nearest-neighbour and radius queries
//! - `segmentation`: least-squares and RANSAC plane fitting, grasp plane slicing
//! - `filtering`: statistical outlier removal, voxel downsampling, radius regions
//! - `normals`: parallel normal estimation and orientation
//! - `geometry`: principal axis of an object cloud
//!
//! Every operation takes its input by reference and returns a new cloud.

pub mod filtering;
pub mod geometry;
pub mod normals;
pub mod segmentation;
pub mod spatial;

pub use filtering::{
    extract_radius_region, remove_statistical_outliers, voxel_down_sample, MIN_MEAN_NORMAL_LENGTH,
};
pub use geometry::{
    compute_object_geometry, compute_principal_axis, ObjectGeometry, DEFAULT_ISOTROPY_TOLERANCE,
};
pub use normals::{
    estimate_normals, orient_normals_outward, orient_normals_toward, Neighborhood, NormalConfig,
    NormalEstimation, Orientation,
};
pub use segmentation::{
    build_grasp_plane, fit_plane_least_squares, segment_plane, GraspPlaneSlice, PlaneEstimator,
    PlaneFitConfig, PlaneSegmentation,
};
pub use spatial::{Neighbor, PointIndex};
