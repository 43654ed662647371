//! The end-to-end grasp planner.
//!
//! A [`GraspPlanner`] holds the two input clouds and the output of the last
//! successful [`GraspPlanner::compute`]. Setters never recompute; accessors
//! read the last output until the next successful run replaces it.

use geograsp_core::{
    AxisModel, Error, GraspConfiguration, GraspPoint, PlaneModel, PointCloud, Result,
};
use geograsp_point_cloud::{
    build_grasp_plane, compute_object_geometry, estimate_normals, extract_radius_region,
    remove_statistical_outliers, segment_plane, voxel_down_sample,
};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::GraspConfig;
use crate::ranking::{GraspFrame, GraspRanker, RankedGrasps};
use crate::seeds::{ExtremesAlongSweep, SeedStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// At least one input cloud is missing or empty and nothing was computed.
    Uninitialized,
    CloudsSet,
    /// An output is available.
    Computed,
}

/// Outcome of a successful [`GraspPlanner::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeStatus {
    Complete,
    /// Fewer valid grasps than requested, possibly none.
    Partial { requested: usize, found: usize },
}

/// Everything derived by one pipeline run.
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub background_plane: PlaneModel,
    pub object_axis: AxisModel,
    /// The axis is the support normal because the object had no dominant direction.
    pub axis_fallback: bool,
    pub filtered_object: PointCloud,
    pub object_normals: PointCloud,
    pub degenerate_normals: Vec<usize>,
    pub grasp_plane: PlaneModel,
    pub grasp_plane_cloud: PointCloud,
    pub initial_seeds: (GraspPoint, GraspPoint),
    pub first_region: PointCloud,
    pub second_region: PointCloud,
    pub first_region_voxel: PointCloud,
    pub second_region_voxel: PointCloud,
    pub ranked: RankedGrasps,
}

pub struct GraspPlanner {
    background: PointCloud,
    object: PointCloud,
    number_best_grasps: usize,
    grip_tip_size: f32,
    config: GraspConfig,
    seed_strategy: Box<dyn SeedStrategy>,
    output: Option<PlannerOutput>,
}

impl Default for GraspPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl GraspPlanner {
    pub fn new() -> Self {
        Self::with_config(GraspConfig::default())
    }

    pub fn with_config(config: GraspConfig) -> Self {
        Self {
            background: PointCloud::default(),
            object: PointCloud::default(),
            number_best_grasps: 1,
            grip_tip_size: 0.0,
            config,
            seed_strategy: Box::new(ExtremesAlongSweep),
            output: None,
        }
    }

    pub fn state(&self) -> PlannerState {
        if self.output.is_some() {
            PlannerState::Computed
        } else if !self.background.is_empty() && !self.object.is_empty() {
            PlannerState::CloudsSet
        } else {
            PlannerState::Uninitialized
        }
    }

    pub fn set_background_cloud(&mut self, cloud: PointCloud) {
        self.background = cloud;
    }

    pub fn set_object_cloud(&mut self, cloud: PointCloud) {
        self.object = cloud;
    }

    /// Number of grasps to return.
    pub fn set_grasps(&mut self, count: usize) {
        self.number_best_grasps = count;
    }

    /// Maximum finger opening, in the unit of the clouds.
    pub fn set_grip_tip_size(&mut self, size: f32) {
        self.grip_tip_size = size;
    }

    pub fn set_config(&mut self, config: GraspConfig) {
        self.config = config;
    }

    pub fn set_rng_seed(&mut self, seed: u64) {
        self.config.rng_seed = Some(seed);
    }

    pub fn set_seed_strategy(&mut self, strategy: impl SeedStrategy + 'static) {
        self.seed_strategy = Box::new(strategy);
    }

    pub fn config(&self) -> &GraspConfig {
        &self.config
    }

    /// Run the whole pipeline on the current inputs.
    ///
    /// On error the previous output is left untouched.
    pub fn compute(&mut self) -> Result<ComputeStatus> {
        self.validate()?;
        let output = self.run_pipeline()?;

        let status = if output.ranked.partial {
            ComputeStatus::Partial {
                requested: output.ranked.requested,
                found: output.ranked.len(),
            }
        } else {
            ComputeStatus::Complete
        };
        info!(
            grasps = output.ranked.len(),
            best = ?output.ranked.rankings.first(),
            ?status,
            "grasp computation finished"
        );
        self.output = Some(output);
        Ok(status)
    }

    fn validate(&self) -> Result<()> {
        if self.background.is_empty() {
            return Err(Error::invalid_input("background cloud is empty"));
        }
        if self.object.is_empty() {
            return Err(Error::invalid_input("object cloud is empty"));
        }
        if self.number_best_grasps == 0 {
            return Err(Error::invalid_input("number of grasps must be >= 1"));
        }
        if !(self.grip_tip_size > 0.0) || !self.grip_tip_size.is_finite() {
            return Err(Error::invalid_input(format!(
                "grip tip size must be positive, got {}",
                self.grip_tip_size
            )));
        }
        Ok(())
    }

    fn run_pipeline(&self) -> Result<PlannerOutput> {
        let config = &self.config;
        info!(
            background = self.background.len(),
            object = self.object.len(),
            grasps = self.number_best_grasps,
            grip_tip_size = self.grip_tip_size,
            "grasp computation started"
        );

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let segmentation = segment_plane(&self.background, &config.plane, &mut rng)?;
        let mut background_plane = segmentation.plane;

        let (filtered_object, _) = remove_statistical_outliers(
            &self.object,
            config.outliers.k,
            config.outliers.std_ratio,
        )?;
        let Some(object_centroid) = filtered_object.centroid() else {
            return Err(Error::degenerate("outlier filter removed every object point"));
        };
        // The support normal points toward the object.
        if background_plane.signed_distance(&object_centroid) < 0.0 {
            background_plane = background_plane.flipped();
        }
        let up = background_plane.normal;
        debug!(
            inliers = segmentation.inliers.len(),
            object = filtered_object.len(),
            "background plane and filtered object ready"
        );

        let normals = estimate_normals(&filtered_object, &config.normals)?;

        let (object_axis, axis_fallback) =
            match compute_object_geometry(&filtered_object, config.isotropy_tolerance) {
                Ok(geometry) => (geometry.axis, false),
                Err(e) if e.is_degenerate() => {
                    warn!(error = %e, "no principal axis, using the support normal");
                    let axis = AxisModel::new(object_centroid, up)
                        .ok_or_else(|| Error::degenerate("support normal vanished"))?;
                    (axis, true)
                }
                Err(e) => return Err(e),
            };

        let slice = build_grasp_plane(
            &object_axis.centroid,
            &object_axis.direction,
            config.slice_threshold,
            &normals.cloud,
        )?;
        let initial_seeds = self.seed_strategy.select(&slice.cloud, &object_axis, &up)?;
        debug!(
            slice = slice.cloud.len(),
            first_seed = ?initial_seeds.0.position,
            second_seed = ?initial_seeds.1.position,
            "seeds selected"
        );

        let region = &config.region;
        let first_region =
            extract_radius_region(&initial_seeds.0.position, region.radius, &normals.cloud)?;
        let second_region =
            extract_radius_region(&initial_seeds.1.position, region.radius, &normals.cloud)?;
        let first_region_voxel = voxel_down_sample(&first_region, region.leaf_size)?;
        let second_region_voxel = voxel_down_sample(&second_region, region.leaf_size)?;
        debug!(
            first = first_region.len(),
            second = second_region.len(),
            first_voxel = first_region_voxel.len(),
            second_voxel = second_region_voxel.len(),
            "seed regions extracted"
        );

        let ranker = GraspRanker::new(self.grip_tip_size, region.radius)
            .with_weights(config.weights)
            .with_target_width_ratio(config.target_width_ratio)
            .with_min_opposition(config.min_opposition);
        let ranked = ranker.rank(
            &initial_seeds.0,
            &initial_seeds.1,
            &GraspFrame::new(slice.plane, object_axis),
            &first_region_voxel,
            &second_region_voxel,
            self.number_best_grasps,
        )?;

        Ok(PlannerOutput {
            background_plane,
            object_axis,
            axis_fallback,
            filtered_object,
            object_normals: normals.cloud,
            degenerate_normals: normals.degenerate,
            grasp_plane: slice.plane,
            grasp_plane_cloud: slice.cloud,
            initial_seeds,
            first_region,
            second_region,
            first_region_voxel,
            second_region_voxel,
            ranked,
        })
    }

    fn output(&self) -> Result<&PlannerOutput> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::not_ready("compute() has not succeeded yet"))
    }

    /// The whole last output.
    pub fn last_output(&self) -> Result<PlannerOutput> {
        self.output().cloned()
    }

    pub fn grasp(&self, index: usize) -> Result<GraspConfiguration> {
        let ranked = &self.output()?.ranked;
        ranked.grasps.get(index).copied().ok_or(Error::OutOfRange {
            index,
            len: ranked.len(),
        })
    }

    pub fn best_grasp(&self) -> Result<GraspConfiguration> {
        self.grasp(0)
    }

    pub fn ranking(&self, index: usize) -> Result<f32> {
        let ranked = &self.output()?.ranked;
        ranked.rankings.get(index).copied().ok_or(Error::OutOfRange {
            index,
            len: ranked.len(),
        })
    }

    pub fn best_ranking(&self) -> Result<f32> {
        self.ranking(0)
    }

    pub fn grasps(&self) -> Result<Vec<GraspConfiguration>> {
        Ok(self.output()?.ranked.grasps.clone())
    }

    pub fn rankings(&self) -> Result<Vec<f32>> {
        Ok(self.output()?.ranked.rankings.clone())
    }

    pub fn is_partial(&self) -> Result<bool> {
        Ok(self.output()?.ranked.partial)
    }

    pub fn background_plane(&self) -> Result<PlaneModel> {
        Ok(self.output()?.background_plane)
    }

    pub fn object_axis(&self) -> Result<AxisModel> {
        Ok(self.output()?.object_axis)
    }

    /// `[px, py, pz, dx, dy, dz]` of the object axis.
    pub fn object_axis_coefficients(&self) -> Result<[f32; 6]> {
        Ok(self.output()?.object_axis.coefficients())
    }

    pub fn grasp_plane(&self) -> Result<PlaneModel> {
        Ok(self.output()?.grasp_plane)
    }

    pub fn grasp_plane_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.grasp_plane_cloud.clone())
    }

    pub fn filtered_object_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.filtered_object.clone())
    }

    pub fn object_normal_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.object_normals.clone())
    }

    pub fn degenerate_normals(&self) -> Result<Vec<usize>> {
        Ok(self.output()?.degenerate_normals.clone())
    }

    pub fn initial_seeds(&self) -> Result<(GraspPoint, GraspPoint)> {
        Ok(self.output()?.initial_seeds)
    }

    pub fn first_region_normal_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.first_region.clone())
    }

    pub fn second_region_normal_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.second_region.clone())
    }

    pub fn first_region_voxel_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.first_region_voxel.clone())
    }

    pub fn second_region_voxel_cloud(&self) -> Result<PointCloud> {
        Ok(self.output()?.second_region_voxel.clone())
    }

    /// Unit support plane normal used as "up", oriented toward the object.
    pub fn support_normal(&self) -> Result<Vector3<f32>> {
        Ok(self.output()?.background_plane.normal)
    }
}
