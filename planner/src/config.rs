use geograsp_point_cloud::{NormalConfig, PlaneFitConfig, DEFAULT_ISOTROPY_TOLERANCE};

use crate::ranking::RankingWeights;

/// Statistical outlier filter applied to the object cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierConfig {
    /// Neighbours per point. Must be smaller than the object cloud.
    pub k: usize,
    pub std_ratio: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self { k: 50, std_ratio: 1.0 }
    }
}

/// Neighbourhood extracted around each seed, and its voxel leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionConfig {
    pub radius: f32,
    pub leaf_size: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            radius: 0.01,
            leaf_size: 0.002,
        }
    }
}

/// Every tunable of the planning pipeline. Lengths are in the unit of the
/// input clouds; the defaults assume metres.
#[derive(Debug, Clone)]
pub struct GraspConfig {
    pub plane: PlaneFitConfig,
    pub outliers: OutlierConfig,
    pub normals: NormalConfig,
    /// Relative eigenvalue spread under which the object has no principal axis.
    pub isotropy_tolerance: f32,
    /// Half-thickness of the grasp plane slice.
    pub slice_threshold: f32,
    pub region: RegionConfig,
    pub weights: RankingWeights,
    /// Preferred opening as a fraction of the grip tip size.
    pub target_width_ratio: f32,
    /// Pairs with `n1 · n2 > -min_opposition` are rejected.
    pub min_opposition: f32,
    /// Fixed seed for plane fitting; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for GraspConfig {
    fn default() -> Self {
        Self {
            plane: PlaneFitConfig::default(),
            outliers: OutlierConfig::default(),
            normals: NormalConfig::default(),
            isotropy_tolerance: DEFAULT_ISOTROPY_TOLERANCE,
            slice_threshold: 0.005,
            region: RegionConfig::default(),
            weights: RankingWeights::default(),
            target_width_ratio: 0.5,
            min_opposition: 0.5,
            rng_seed: None,
        }
    }
}

impl GraspConfig {
    pub fn fast() -> Self {
        Self {
            plane: PlaneFitConfig {
                max_iterations: 50,
                ..PlaneFitConfig::default()
            },
            outliers: OutlierConfig { k: 20, std_ratio: 1.0 },
            normals: NormalConfig::fast(),
            region: RegionConfig {
                radius: 0.01,
                leaf_size: 0.004,
            },
            ..Self::default()
        }
    }

    pub fn high_quality() -> Self {
        Self {
            plane: PlaneFitConfig {
                max_iterations: 500,
                confidence: 0.999,
                ..PlaneFitConfig::default()
            },
            outliers: OutlierConfig { k: 80, std_ratio: 1.0 },
            normals: NormalConfig::high_quality(),
            slice_threshold: 0.003,
            region: RegionConfig {
                radius: 0.01,
                leaf_size: 0.001,
            },
            ..Self::default()
        }
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geograsp_point_cloud::Neighborhood;

    #[test]
    fn test_default_values() {
        let config = GraspConfig::default();
        assert_eq!(config.plane.distance_threshold, 0.015);
        assert_eq!(config.plane.max_iterations, 100);
        assert_eq!(config.outliers.k, 50);
        assert_eq!(config.normals.neighborhood, Neighborhood::KNearest(30));
        assert_eq!(config.slice_threshold, 0.005);
        assert_eq!(config.region, RegionConfig { radius: 0.01, leaf_size: 0.002 });
        assert!(config.normals.workers >= 1);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_presets() {
        let fast = GraspConfig::fast();
        let hq = GraspConfig::high_quality();
        assert!(fast.plane.max_iterations < hq.plane.max_iterations);
        assert!(fast.region.leaf_size > hq.region.leaf_size);
        assert_eq!(GraspConfig::fast().with_rng_seed(7).rng_seed, Some(7));
    }
}
