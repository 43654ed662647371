//! Principal axis of an object cloud.

use geograsp_core::{AxisModel, Error, PointCloud, Result};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use tracing::debug;

/// Relative eigenvalue spread below which a cloud has no dominant direction.
pub const DEFAULT_ISOTROPY_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectGeometry {
    pub axis: AxisModel,
    /// Covariance eigenvalues, largest first.
    pub eigenvalues: [f32; 3],
}

/// Centroid and dominant elongation direction of `pc`.
///
/// The direction is the eigenvector of the largest eigenvalue of the
/// covariance tensor about the centroid, signed so that its largest
/// component is positive.
pub fn compute_object_geometry(pc: &PointCloud, isotropy_tolerance: f32) -> Result<ObjectGeometry> {
    let Some(centroid) = pc.centroid() else {
        return Err(Error::degenerate("principal axis of an empty cloud"));
    };

    let mut cov = Matrix3::zeros();
    for p in &pc.points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= pc.len() as f32;

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
    let [largest, _, smallest] = eigenvalues;

    if !(largest > f32::EPSILON * f32::EPSILON) {
        return Err(Error::degenerate("object cloud has no spatial extent"));
    }
    if largest - smallest <= isotropy_tolerance * largest {
        return Err(Error::degenerate(format!(
            "object cloud is isotropic (eigenvalues {eigenvalues:?})"
        )));
    }

    let mut direction: Vector3<f32> = eigen.eigenvectors.column(order[0]).into_owned();
    if direction[direction.iamax()] < 0.0 {
        direction = -direction;
    }
    let axis = AxisModel::new(centroid, direction)
        .ok_or_else(|| Error::degenerate("principal direction vanished"))?;

    debug!(?eigenvalues, "principal axis computed");
    Ok(ObjectGeometry { axis, eigenvalues })
}

pub fn compute_principal_axis(pc: &PointCloud) -> Result<AxisModel> {
    compute_object_geometry(pc, DEFAULT_ISOTROPY_TOLERANCE).map(|g| g.axis)
}
