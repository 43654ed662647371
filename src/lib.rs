//! Geometry-only two-finger grasp planning.
//!
//! ```ignore
//! use geograsp::GraspPlanner;
//!
//! let mut planner = GraspPlanner::new();
//! planner.set_background_cloud(table);
//! planner.set_object_cloud(object);
//! planner.set_grip_tip_size(0.08);
//! planner.compute()?;
//! let best = planner.best_grasp()?;
//! ```

pub use geograsp_core as core;
pub use geograsp_planner as planner;
pub use geograsp_point_cloud as point_cloud;

pub use geograsp_core::{Error, GraspConfiguration, GraspPoint, PointCloud, Result};
pub use geograsp_planner::{ComputeStatus, GraspConfig, GraspPlanner, PlannerState};

/// Initialize a single global Rayon thread pool for all CPU-parallel routines.
///
/// Call this once at application startup before planning.
/// Repeated calls are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `GEOGRASP_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> std::result::Result<(), String> {
    geograsp_core::init_global_thread_pool(num_threads)
}
