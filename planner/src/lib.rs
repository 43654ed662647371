//! Two-finger grasp planning on segmented point clouds.
//!
//! [`GraspPlanner`] runs the full pipeline: support plane, outlier filter,
//! normals, principal axis, grasp plane slice, seed selection, seed regions
//! and antipodal ranking. The stages are also usable on their own.

pub mod config;
pub mod planner;
pub mod ranking;
pub mod seeds;

pub use config::{GraspConfig, OutlierConfig, RegionConfig};
pub use planner::{ComputeStatus, GraspPlanner, PlannerOutput, PlannerState};
pub use ranking::{GraspFrame, GraspRanker, RankedGrasps, RankingWeights};
pub use seeds::{sweep_direction, ExtremesAlongSweep, FarthestPair, SeedStrategy};
