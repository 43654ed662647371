//! Plane fitting and plane-constrained extraction.
//!
//! - Least-squares plane through a point set (also used per neighbourhood by
//!   normal estimation)
//! - Plane segmentation using RANSAC
//! - Grasp plane slicing

use geograsp_core::{
    Error, PlaneModel, PointCloud, Ransac, Result, RobustConfig, RobustModel,
};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rand::Rng;
use tracing::debug;

/// Second eigenvalue over the largest below which a point set counts as a line.
const COLLINEAR_TOLERANCE: f32 = 1e-5;

/// Least-squares plane through `points`.
///
/// The normal is the eigenvector of the smallest eigenvalue of the
/// covariance matrix about the centroid.
pub fn fit_plane_least_squares(points: &[Point3<f32>]) -> Result<PlaneModel> {
    fit_plane_refs(points.iter())
}

pub(crate) fn fit_plane_refs<'a, I>(points: I) -> Result<PlaneModel>
where
    I: Iterator<Item = &'a Point3<f32>> + Clone,
{
    let n = points.clone().count();
    if n < 3 {
        return Err(Error::degenerate(format!(
            "plane fit needs at least 3 points, got {n}"
        )));
    }

    let mut centroid = Vector3::zeros();
    for p in points.clone() {
        centroid += p.coords;
    }
    centroid /= n as f32;

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p.coords - centroid;
        cov += d * d.transpose();
    }
    cov /= n as f32;

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let middle = eigen.eigenvalues[order[1]];
    let largest = eigen.eigenvalues[order[2]];

    // NaN-safe: a non-finite covariance is degenerate too.
    if !(largest > f32::EPSILON * f32::EPSILON) || middle <= COLLINEAR_TOLERANCE * largest {
        return Err(Error::degenerate("points are collinear or coincident"));
    }

    let normal: Vector3<f32> = eigen.eigenvectors.column(order[0]).into_owned();
    PlaneModel::from_point_normal(&Point3::from(centroid), &normal)
        .ok_or_else(|| Error::degenerate("plane normal vanished"))
}

pub struct PlaneEstimator;

impl RobustModel<Point3<f32>> for PlaneEstimator {
    type Model = PlaneModel;

    fn min_sample_size(&self) -> usize {
        3
    }

    fn estimate(&self, data: &[&Point3<f32>]) -> Option<Self::Model> {
        PlaneModel::from_points(data[0], data[1], data[2])
    }

    fn compute_error(&self, model: &Self::Model, data: &Point3<f32>) -> f64 {
        model.distance(data) as f64
    }
}

/// Parameters of the robust (RANSAC) plane fit.
#[derive(Debug, Clone)]
pub struct PlaneFitConfig {
    /// Maximum point-to-plane distance of an inlier.
    pub distance_threshold: f32,
    pub max_iterations: usize,
    /// Inlier fraction that ends the search early.
    pub confidence: f64,
    /// Fraction of the cloud the winning plane must explain.
    pub min_inlier_ratio: f64,
}

impl Default for PlaneFitConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.015,
            max_iterations: 100,
            confidence: 0.99,
            min_inlier_ratio: 0.2,
        }
    }
}

impl PlaneFitConfig {
    pub fn with_threshold(mut self, distance_threshold: f32) -> Self {
        self.distance_threshold = distance_threshold;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PlaneSegmentation {
    pub plane: PlaneModel,
    /// Ascending indices of the points within the threshold.
    pub inliers: Vec<usize>,
}

impl PlaneSegmentation {
    pub fn inlier_ratio(&self, cloud_len: usize) -> f64 {
        if cloud_len == 0 {
            0.0
        } else {
            self.inliers.len() as f64 / cloud_len as f64
        }
    }
}

/// Segment the dominant plane of `pc` using RANSAC.
///
/// The best sampled plane is refined by least squares over its inliers; the
/// refinement is kept only if it explains at least as many points.
/// The input cloud is not modified.
pub fn segment_plane<R: Rng + ?Sized>(
    pc: &PointCloud,
    config: &PlaneFitConfig,
    rng: &mut R,
) -> Result<PlaneSegmentation> {
    if !(config.distance_threshold >= 0.0) {
        return Err(Error::invalid_input("plane distance threshold must be >= 0"));
    }
    if pc.points.len() < 3 {
        return Err(Error::degenerate(format!(
            "plane segmentation needs at least 3 points, got {}",
            pc.points.len()
        )));
    }

    let ransac = Ransac::new(RobustConfig {
        threshold: config.distance_threshold as f64,
        max_iterations: config.max_iterations,
        confidence: config.confidence,
        min_sample_size: 3,
    });
    let res = ransac.run(&PlaneEstimator, &pc.points, rng);

    let Some(sampled) = res.model.clone() else {
        return Err(Error::degenerate(format!(
            "no non-collinear sample in {} iterations",
            res.iterations
        )));
    };

    let mut plane = sampled;
    let mut inliers = res.inlier_indices();

    let inlier_points = inliers.iter().map(|&i| &pc.points[i]);
    if let Ok(refined) = fit_plane_refs(inlier_points) {
        let (mask, count, _) = ransac.score(&PlaneEstimator, &refined, &pc.points);
        if count >= inliers.len() {
            plane = refined;
            inliers = mask
                .iter()
                .enumerate()
                .filter(|(_, &m)| m)
                .map(|(i, _)| i)
                .collect();
        }
    }

    let ratio = inliers.len() as f64 / pc.points.len() as f64;
    debug!(
        inliers = inliers.len(),
        points = pc.points.len(),
        iterations = res.iterations,
        "plane segmented"
    );
    if ratio < config.min_inlier_ratio {
        return Err(Error::degenerate(format!(
            "best plane explains {:.1}% of points, need {:.1}%",
            ratio * 100.0,
            config.min_inlier_ratio * 100.0
        )));
    }

    Ok(PlaneSegmentation { plane, inliers })
}

/// Points of a cloud lying close to a constructed plane.
#[derive(Debug, Clone)]
pub struct GraspPlaneSlice {
    pub plane: PlaneModel,
    pub cloud: PointCloud,
    /// Indices of `cloud`'s points in the source cloud.
    pub indices: Vec<usize>,
}

/// Build the plane through `point` with `normal` and keep every point of
/// `pc` within `distance_threshold` of it. Normals and colors are carried.
pub fn build_grasp_plane(
    point: &Point3<f32>,
    normal: &Vector3<f32>,
    distance_threshold: f32,
    pc: &PointCloud,
) -> Result<GraspPlaneSlice> {
    if !(distance_threshold >= 0.0) {
        return Err(Error::invalid_input("slice distance threshold must be >= 0"));
    }
    let plane = PlaneModel::from_point_normal(point, normal)
        .ok_or_else(|| Error::invalid_input("grasp plane normal must be non-zero"))?;

    let indices: Vec<usize> = pc
        .points
        .iter()
        .enumerate()
        .filter(|(_, p)| plane.distance(p) <= distance_threshold)
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        return Err(Error::degenerate(format!(
            "no points within {distance_threshold} of the grasp plane"
        )));
    }

    debug!(slice = indices.len(), points = pc.len(), "grasp plane built");
    Ok(GraspPlaneSlice {
        plane,
        cloud: pc.select(&indices),
        indices,
    })
}
