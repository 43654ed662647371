//! Nearest-neighbour queries over cloud positions, backed by an R*-tree.

use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

// Wrapper for RTree
#[derive(Debug, Clone, Copy)]
pub(crate) struct PointWrapper(pub usize, pub Point3<f32>);

impl RTreeObject for PointWrapper {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.1.x, self.1.y, self.1.z])
    }
}

impl PointDistance for PointWrapper {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.1.x - point[0];
        let dy = self.1.y - point[1];
        let dz = self.1.z - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// A neighbour hit: index into the indexed slice and squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance_2: f32,
}

/// Read-only spatial index over a slice of positions.
pub struct PointIndex {
    tree: RTree<PointWrapper>,
}

impl PointIndex {
    pub fn build(points: &[Point3<f32>]) -> Self {
        let wrappers: Vec<PointWrapper> = points
            .iter()
            .enumerate()
            .map(|(i, p)| PointWrapper(i, *p))
            .collect();
        Self {
            tree: RTree::bulk_load(wrappers),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` closest points to `query`, nearest first. Includes the query
    /// point itself when it is part of the index.
    pub fn nearest(&self, query: &Point3<f32>, k: usize) -> Vec<Neighbor> {
        let q = [query.x, query.y, query.z];
        self.tree
            .nearest_neighbor_iter(&q)
            .take(k)
            .map(|w| Neighbor {
                index: w.0,
                distance_2: w.distance_2(&q),
            })
            .collect()
    }

    /// All points within `radius` of `query`, sorted by ascending distance
    /// with ties broken by index.
    pub fn within_radius(&self, query: &Point3<f32>, radius: f32) -> Vec<Neighbor> {
        let q = [query.x, query.y, query.z];
        // locate_within_distance uses squared distance
        let mut hits: Vec<Neighbor> = self
            .tree
            .locate_within_distance(q, radius * radius)
            .map(|w| Neighbor {
                index: w.0,
                distance_2: w.distance_2(&q),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance_2
                .total_cmp(&b.distance_2)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits
    }
}
