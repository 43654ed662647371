//! Point cloud filtering operations
//!
//! Filtering operations include:
//! - Statistical outlier removal
//! - Voxel downsampling
//! - Radius region extraction around a seed point

use geograsp_core::{Error, PointCloud, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::spatial::PointIndex;

/// Averaged voxel normals shorter than this cancelled out and carry no
/// direction; they are written as the zero sentinel.
pub const MIN_MEAN_NORMAL_LENGTH: f32 = 0.1;

/// Remove statistical outliers.
/// Compute mean distance to `k` neighbors for each point.
/// Points with mean distance > global_mean + std_ratio * std_dev are removed.
///
/// Returns the filtered cloud (an order-preserving subsequence carrying
/// colors and normals) and the kept indices.
pub fn remove_statistical_outliers(
    pc: &PointCloud,
    k: usize,
    std_ratio: f64,
) -> Result<(PointCloud, Vec<usize>)> {
    if k == 0 {
        return Err(Error::invalid_input("outlier filter needs k >= 1"));
    }
    if k >= pc.len() {
        return Err(Error::invalid_input(format!(
            "outlier filter k = {k} must be smaller than the cloud size {}",
            pc.len()
        )));
    }

    let tree = PointIndex::build(&pc.points);

    let distances: Vec<f32> = pc
        .points
        .par_iter()
        .map(|p| {
            // k + 1 because the nearest hit is the point itself.
            let neighbors = tree.nearest(p, k + 1);
            let sum: f32 = neighbors.iter().skip(1).map(|n| n.distance_2.sqrt()).sum();
            let count = neighbors.len().saturating_sub(1);
            if count > 0 {
                sum / count as f32
            } else {
                0.0
            }
        })
        .collect();

    let n = distances.len() as f64;
    let mean_dist = distances.iter().map(|&d| d as f64).sum::<f64>() / n;
    let variance = distances
        .iter()
        .map(|&d| {
            let diff = d as f64 - mean_dist;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    let threshold = mean_dist + std_ratio * std_dev;

    let inliers: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|(_, &dist)| dist as f64 <= threshold)
        .map(|(i, _)| i)
        .collect();

    debug!(
        kept = inliers.len(),
        removed = pc.len() - inliers.len(),
        threshold,
        "statistical outlier removal"
    );
    Ok((pc.select(&inliers), inliers))
}

/// Downsample a point cloud with a voxel grid.
/// Returns a new point cloud with one point per voxel (the centroid).
///
/// The grid is anchored at the minimum corner of the cloud's bounding box,
/// so a leaf larger than the cloud always yields a single point. Output
/// points are ordered by voxel key, so the result only depends on the leaf
/// size and the input.
///
/// Normals are averaged and renormalised. A voxel whose normals cancel
/// (mean shorter than [`MIN_MEAN_NORMAL_LENGTH`]) gets a zero normal.
pub fn voxel_down_sample(pc: &PointCloud, voxel_size: f32) -> Result<PointCloud> {
    if !(voxel_size > 0.0) || !voxel_size.is_finite() {
        return Err(Error::invalid_input(format!(
            "voxel leaf size must be positive and finite, got {voxel_size}"
        )));
    }
    if pc.is_empty() {
        return Ok(PointCloud::default());
    }

    let n = pc.len();
    let mut indices: Vec<(i64, i64, i64, usize)> = Vec::with_capacity(n);

    let origin = pc
        .points
        .iter()
        .fold(Point3::from(Vector3::repeat(f32::INFINITY)), |acc, p| {
            Point3::new(acc.x.min(p.x), acc.y.min(p.y), acc.z.min(p.z))
        });

    // 1. Compute indices
    for (i, p) in pc.points.iter().enumerate() {
        let d = p - origin;
        let hx = (d.x / voxel_size).floor() as i64;
        let hy = (d.y / voxel_size).floor() as i64;
        let hz = (d.z / voxel_size).floor() as i64;
        indices.push((hx, hy, hz, i));
    }

    // 2. Sort by voxel index, then by original position within a voxel
    if n > 10000 {
        indices.par_sort_unstable();
    } else {
        indices.sort_unstable();
    }

    // 3. Aggregate
    let mut out = VoxelAccumulator::new(pc.colors.is_some(), pc.normals.is_some());
    let mut current_voxel = (indices[0].0, indices[0].1, indices[0].2);

    for &(hx, hy, hz, idx) in &indices {
        if (hx, hy, hz) != current_voxel {
            out.flush();
            current_voxel = (hx, hy, hz);
        }
        out.add(pc, idx);
    }
    out.flush();

    debug!(input = n, output = out.points.len(), voxel_size, "voxel downsample");
    Ok(out.into_cloud())
}

struct VoxelAccumulator {
    points: Vec<Point3<f32>>,
    colors: Option<Vec<Point3<f32>>>,
    normals: Option<Vec<Vector3<f32>>>,
    sum_p: Vector3<f32>,
    sum_c: Vector3<f32>,
    sum_n: Vector3<f32>,
    count: usize,
}

impl VoxelAccumulator {
    fn new(has_colors: bool, has_normals: bool) -> Self {
        Self {
            points: Vec::new(),
            colors: has_colors.then(Vec::new),
            normals: has_normals.then(Vec::new),
            sum_p: Vector3::zeros(),
            sum_c: Vector3::zeros(),
            sum_n: Vector3::zeros(),
            count: 0,
        }
    }

    fn add(&mut self, pc: &PointCloud, idx: usize) {
        self.sum_p += pc.points[idx].coords;
        if let Some(colors) = &pc.colors {
            self.sum_c += colors[idx].coords;
        }
        if let Some(normals) = &pc.normals {
            self.sum_n += normals[idx];
        }
        self.count += 1;
    }

    fn flush(&mut self) {
        if self.count == 0 {
            return;
        }
        let factor = 1.0 / self.count as f32;
        self.points.push(Point3::from(self.sum_p * factor));

        if let Some(nc) = &mut self.colors {
            nc.push(Point3::from(self.sum_c * factor));
        }
        if let Some(nn) = &mut self.normals {
            let mean = self.sum_n * factor;
            nn.push(
                mean.try_normalize(MIN_MEAN_NORMAL_LENGTH)
                    .unwrap_or_else(Vector3::zeros),
            );
        }

        self.sum_p = Vector3::zeros();
        self.sum_c = Vector3::zeros();
        self.sum_n = Vector3::zeros();
        self.count = 0;
    }

    fn into_cloud(self) -> PointCloud {
        PointCloud {
            points: self.points,
            colors: self.colors,
            normals: self.normals,
        }
    }
}

/// Points of `pc` within `radius` of `seed`, nearest first.
///
/// Colors and normals are carried over.
pub fn extract_radius_region(seed: &Point3<f32>, radius: f32, pc: &PointCloud) -> Result<PointCloud> {
    if !(radius > 0.0) {
        return Err(Error::invalid_input(format!(
            "region radius must be positive, got {radius}"
        )));
    }

    let tree = PointIndex::build(&pc.points);
    let indices: Vec<usize> = tree
        .within_radius(seed, radius)
        .into_iter()
        .map(|n| n.index)
        .collect();

    if indices.is_empty() {
        return Err(Error::degenerate(format!(
            "no points within {radius} of ({}, {}, {})",
            seed.x, seed.y, seed.z
        )));
    }

    Ok(pc.select(&indices))
}
