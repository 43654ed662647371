//! Initial contact selection on the grasp plane slice.
//!
//! The ranker searches around two seed points. Choosing them is a
//! pluggable step behind [`SeedStrategy`].

use geograsp_core::{AxisModel, Error, GraspPoint, PointCloud, Result};
use nalgebra::Vector3;

/// Cross products shorter than this are treated as parallel vectors.
const SWEEP_EPS: f32 = 1e-3;
/// Seeds closer than this are the same point.
const DISTINCT_EPS: f32 = 1e-6;

/// Picks the two initial contacts from the points of the grasp plane slice.
pub trait SeedStrategy: Send + Sync {
    /// `axis` is the object's principal axis and `up` the support plane
    /// normal. The slice carries normals when the caller has them.
    fn select(
        &self,
        slice: &PointCloud,
        axis: &AxisModel,
        up: &Vector3<f32>,
    ) -> Result<(GraspPoint, GraspPoint)>;
}

/// The two slice points at the extremes of the sweep direction
/// `axis × up`, i.e. the outermost points across the object, parallel to
/// the support surface. Ties go to the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtremesAlongSweep;

/// The two slice points farthest apart.
///
/// Exhaustive search over all pairs, quadratic in the slice size. Meant as
/// a fallback on thin grasp plane slices, not for whole clouds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FarthestPair;

fn grasp_point(slice: &PointCloud, index: usize) -> GraspPoint {
    GraspPoint::new(
        slice.points[index],
        slice.normal(index).unwrap_or_else(Vector3::zeros),
    )
}

/// `axis × up`, or `axis` crossed with the first world axis that is not
/// parallel to it.
pub fn sweep_direction(axis: &Vector3<f32>, up: &Vector3<f32>) -> Option<Vector3<f32>> {
    let up = up.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
    let axis = axis.try_normalize(f32::EPSILON)?;
    [up, Vector3::x(), Vector3::y(), Vector3::z()]
        .iter()
        .find_map(|v| axis.cross(v).try_normalize(SWEEP_EPS))
}

impl SeedStrategy for ExtremesAlongSweep {
    fn select(
        &self,
        slice: &PointCloud,
        axis: &AxisModel,
        up: &Vector3<f32>,
    ) -> Result<(GraspPoint, GraspPoint)> {
        if slice.len() < 2 {
            return Err(Error::degenerate(format!(
                "seed selection needs two slice points, got {}",
                slice.len()
            )));
        }
        let sweep = sweep_direction(&axis.direction, up)
            .ok_or_else(|| Error::degenerate("object axis has no direction"))?;

        let mut min = (f32::INFINITY, 0);
        let mut max = (f32::NEG_INFINITY, 0);
        for (i, p) in slice.points.iter().enumerate() {
            let t = sweep.dot(&(p - axis.centroid));
            if t < min.0 {
                min = (t, i);
            }
            if t > max.0 {
                max = (t, i);
            }
        }

        if max.0 - min.0 <= DISTINCT_EPS {
            // Slice is flat across the sweep direction.
            return FarthestPair.select(slice, axis, up);
        }
        Ok((grasp_point(slice, min.1), grasp_point(slice, max.1)))
    }
}

impl SeedStrategy for FarthestPair {
    fn select(
        &self,
        slice: &PointCloud,
        _axis: &AxisModel,
        _up: &Vector3<f32>,
    ) -> Result<(GraspPoint, GraspPoint)> {
        let mut best = (0.0f32, 0, 0);
        for i in 0..slice.len() {
            for j in (i + 1)..slice.len() {
                let d2 = (slice.points[i] - slice.points[j]).norm_squared();
                if d2 > best.0 {
                    best = (d2, i, j);
                }
            }
        }
        if best.0.sqrt() <= DISTINCT_EPS {
            return Err(Error::degenerate(
                "grasp plane slice has fewer than two distinct points",
            ));
        }
        Ok((grasp_point(slice, best.1), grasp_point(slice, best.2)))
    }
}
