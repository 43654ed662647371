use nalgebra::{Point3, Vector3};

const UNIT_EPS: f32 = 1e-9;

/// Infinite plane `normal · p + offset = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneModel {
    pub normal: Vector3<f32>,
    pub offset: f32,
}

impl PlaneModel {
    /// Returns `None` when `normal` has no usable length.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Option<Self> {
        let norm = normal.norm();
        if !norm.is_finite() || norm < UNIT_EPS {
            return None;
        }
        Some(Self {
            normal: normal / norm,
            offset: offset / norm,
        })
    }

    pub fn from_point_normal(point: &Point3<f32>, normal: &Vector3<f32>) -> Option<Self> {
        let norm = normal.norm();
        if !norm.is_finite() || norm < UNIT_EPS {
            return None;
        }
        let n = normal / norm;
        Some(Self {
            normal: n,
            offset: -n.dot(&point.coords),
        })
    }

    /// Plane through three points; `None` if they are collinear.
    pub fn from_points(p1: &Point3<f32>, p2: &Point3<f32>, p3: &Point3<f32>) -> Option<Self> {
        let normal = (p2 - p1).cross(&(p3 - p1));
        Self::from_point_normal(p1, &normal)
    }

    pub fn signed_distance(&self, point: &Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) + self.offset
    }

    pub fn distance(&self, point: &Point3<f32>) -> f32 {
        self.signed_distance(point).abs()
    }

    /// Closest point of the plane to the origin.
    pub fn point_on_plane(&self) -> Point3<f32> {
        Point3::from(-self.offset * self.normal)
    }

    pub fn project(&self, point: &Point3<f32>) -> Point3<f32> {
        point - self.signed_distance(point) * self.normal
    }

    /// `[a, b, c, d]` with `ax + by + cz + d = 0`.
    pub fn coefficients(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.offset]
    }

    /// Same plane with the normal pointing the other way.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }
}

/// A line through the object centroid along its dominant elongation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisModel {
    pub centroid: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl AxisModel {
    pub fn new(centroid: Point3<f32>, direction: Vector3<f32>) -> Option<Self> {
        let norm = direction.norm();
        if !norm.is_finite() || norm < UNIT_EPS {
            return None;
        }
        Some(Self {
            centroid,
            direction: direction / norm,
        })
    }

    /// `[px, py, pz, dx, dy, dz]`: point on the line followed by its direction.
    pub fn coefficients(&self) -> [f32; 6] {
        [
            self.centroid.x,
            self.centroid.y,
            self.centroid.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
        ]
    }

    pub fn distance(&self, point: &Point3<f32>) -> f32 {
        let d = point - self.centroid;
        (d - d.dot(&self.direction) * self.direction).norm()
    }
}

/// A finger contact: position plus the surface normal at that position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspPoint {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl GraspPoint {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }

    pub fn distance(&self, other: &GraspPoint) -> f32 {
        (self.position - other.position).norm()
    }
}

/// Candidate two-finger grasp. Order is kept for traceability: `first`
/// comes from the first seed region, `second` from the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspConfiguration {
    pub first: GraspPoint,
    pub second: GraspPoint,
}

impl GraspConfiguration {
    pub fn new(first: GraspPoint, second: GraspPoint) -> Self {
        Self { first, second }
    }

    /// Finger opening needed for this grasp.
    pub fn width(&self) -> f32 {
        self.first.distance(&self.second)
    }

    pub fn midpoint(&self) -> Point3<f32> {
        nalgebra::center(&self.first.position, &self.second.position)
    }
}
