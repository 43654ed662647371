//! Surface normal estimation.
//!
//! Each point's normal is the least-squares plane normal of its
//! neighbourhood. The work runs on a dedicated Rayon pool over disjoint
//! chunks of the output buffer, so the result does not depend on the
//! number of workers.

use geograsp_core::{default_worker_count, Error, PointCloud, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, warn};

use crate::segmentation::fit_plane_refs;
use crate::spatial::PointIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Neighborhood {
    /// The `k` nearest points, the point itself included.
    KNearest(usize),
    /// Every point within the radius, capped at `max_neighbors`.
    Radius(f32),
}

/// Sign convention applied after fitting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Orientation {
    /// Point away from the cloud centroid (outward on convex objects).
    #[default]
    AwayFromCentroid,
    TowardViewpoint(Point3<f32>),
}

#[derive(Debug, Clone)]
pub struct NormalConfig {
    pub neighborhood: Neighborhood,
    pub orientation: Orientation,
    pub workers: usize,
    pub max_neighbors: usize,
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::KNearest(30),
            orientation: Orientation::AwayFromCentroid,
            workers: default_worker_count(),
            max_neighbors: 64,
        }
    }
}

impl NormalConfig {
    pub fn fast() -> Self {
        Self {
            neighborhood: Neighborhood::KNearest(10),
            ..Self::default()
        }
    }

    pub fn high_quality() -> Self {
        Self {
            neighborhood: Neighborhood::KNearest(50),
            max_neighbors: 128,
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Normals attached to a copy of the input cloud.
#[derive(Debug, Clone)]
pub struct NormalEstimation {
    pub cloud: PointCloud,
    /// Points whose neighbourhood could not be fitted. Their normal is zero.
    pub degenerate: Vec<usize>,
}

/// Estimate a normal for every point of `pc`.
///
/// Degenerate neighbourhoods (fewer than 3 points, or collinear) do not
/// abort the pass: the point gets the zero vector and its index is listed in
/// [`NormalEstimation::degenerate`].
pub fn estimate_normals(pc: &PointCloud, config: &NormalConfig) -> Result<NormalEstimation> {
    if pc.is_empty() {
        return Err(Error::invalid_input("cannot estimate normals of an empty cloud"));
    }
    match config.neighborhood {
        Neighborhood::KNearest(k) if k < 3 => {
            return Err(Error::invalid_input(format!(
                "normal estimation needs k >= 3, got {k}"
            )));
        }
        Neighborhood::Radius(r) if !(r > 0.0) => {
            return Err(Error::invalid_input(format!(
                "normal search radius must be positive, got {r}"
            )));
        }
        _ => {}
    }
    if config.workers == 0 {
        return Err(Error::invalid_input("normal estimation needs at least one worker"));
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| Error::invalid_input(format!("failed to build worker pool: {e}")))?;

    let n = pc.len();
    let tree = PointIndex::build(&pc.points);
    let points = &pc.points;

    let local_normal = |i: usize| -> Option<Vector3<f32>> {
        let neighbors = match config.neighborhood {
            Neighborhood::KNearest(k) => tree.nearest(&points[i], k),
            Neighborhood::Radius(r) => {
                let mut hits = tree.within_radius(&points[i], r);
                hits.truncate(config.max_neighbors);
                hits
            }
        };
        fit_plane_refs(neighbors.iter().map(|nb| &points[nb.index]))
            .ok()
            .map(|plane| plane.normal)
    };

    let chunk = n.div_ceil(config.workers);
    let mut normals = vec![Vector3::zeros(); n];
    let mut failed = vec![false; n];

    // install() returns once every chunk is written.
    pool.install(|| {
        normals
            .par_chunks_mut(chunk)
            .zip(failed.par_chunks_mut(chunk))
            .enumerate()
            .for_each(|(c, (out, bad))| {
                let start = c * chunk;
                for (offset, (normal, flag)) in out.iter_mut().zip(bad.iter_mut()).enumerate() {
                    match local_normal(start + offset) {
                        Some(v) => *normal = v,
                        None => *flag = true,
                    }
                }
            });
    });

    let degenerate: Vec<usize> = failed
        .iter()
        .enumerate()
        .filter(|(_, &f)| f)
        .map(|(i, _)| i)
        .collect();
    if !degenerate.is_empty() {
        warn!(
            count = degenerate.len(),
            points = n,
            "degenerate neighbourhoods, zero normals assigned"
        );
    }

    let mut cloud = pc.clone().with_normals(normals)?;
    match config.orientation {
        Orientation::AwayFromCentroid => orient_normals_outward(&mut cloud),
        Orientation::TowardViewpoint(v) => orient_normals_toward(&mut cloud, &v),
    }

    debug!(points = n, workers = config.workers, "normals estimated");
    Ok(NormalEstimation { cloud, degenerate })
}

/// Flip normals so that they point away from the cloud centroid.
pub fn orient_normals_outward(pc: &mut PointCloud) {
    let Some(centroid) = pc.centroid() else {
        return;
    };
    if let Some(normals) = pc.normals.as_mut() {
        for (n, p) in normals.iter_mut().zip(&pc.points) {
            if n.dot(&(p - centroid)) < 0.0 {
                *n = -*n;
            }
        }
    }
}

/// Flip normals so that they face `viewpoint`.
pub fn orient_normals_toward(pc: &mut PointCloud, viewpoint: &Point3<f32>) {
    if let Some(normals) = pc.normals.as_mut() {
        for (n, p) in normals.iter_mut().zip(&pc.points) {
            if n.dot(&(viewpoint - p)) < 0.0 {
                *n = -*n;
            }
        }
    }
}
