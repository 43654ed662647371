/// Integration tests for point-cloud crate
/// Exercise the public operations together on small synthetic clouds
use geograsp_core::PointCloud;
use geograsp_point_cloud::*;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noisy_patch(seed: u64, n: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points = (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.002..0.002),
            )
        })
        .collect();
    PointCloud::new(points)
}

#[test]
fn test_plane_inliers_grow_with_threshold() {
    let mut points = Vec::new();
    for x in 0..10 {
        for y in 0..10 {
            points.push(Point3::new(x as f32 * 0.1, y as f32 * 0.1, 0.0));
        }
    }
    for i in 0..20 {
        points.push(Point3::new(0.05 * i as f32, 0.5, 0.03 * (i + 1) as f32));
    }
    let pc = PointCloud::new(points);

    let mut previous = 0;
    for threshold in [0.01, 0.05, 0.2, 1.0] {
        let mut rng = StdRng::seed_from_u64(11);
        let config = PlaneFitConfig::default().with_threshold(threshold);
        let seg = segment_plane(&pc, &config, &mut rng).unwrap();
        assert!(
            seg.inliers.len() >= previous,
            "threshold {threshold}: {} < {previous}",
            seg.inliers.len()
        );
        previous = seg.inliers.len();
    }
    assert_eq!(previous, pc.len());
}

#[test]
fn test_outlier_filter_shrinks_cloud() {
    let mut pc = noisy_patch(2, 300);
    pc.points.push(Point3::new(1.0, 1.0, 1.0));
    pc.points.push(Point3::new(-1.0, 0.5, -1.0));

    let (filtered, kept) = remove_statistical_outliers(&pc, 10, 1.0).unwrap();
    assert!(filtered.len() <= pc.len());
    assert_eq!(filtered.len(), kept.len());
    assert!(!kept.contains(&300));
    assert!(!kept.contains(&301));
}

#[test]
fn test_outlier_filter_idempotent_without_outliers() {
    // Cube corners: every point sees the same neighbour distances.
    let mut points = Vec::new();
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                points.push(Point3::new(x, y, z));
            }
        }
    }
    let pc = PointCloud::new(points);

    let (once, _) = remove_statistical_outliers(&pc, 7, 1.0).unwrap();
    let (twice, _) = remove_statistical_outliers(&once, 7, 1.0).unwrap();
    assert_eq!(once.len(), pc.len());
    assert_eq!(once, twice);
}

#[test]
fn test_downsample_size_bounds() {
    // The patch straddles the origin on every axis.
    let pc = noisy_patch(4, 500);
    for leaf in [1e-5, 0.005, 0.02, 0.1] {
        let down = voxel_down_sample(&pc, leaf).unwrap();
        assert!(down.len() <= pc.len());
        assert!(!down.is_empty());
    }
    assert_eq!(voxel_down_sample(&pc, 1e6).unwrap().len(), 1);
    assert_eq!(voxel_down_sample(&pc, 1e-7).unwrap().len(), pc.len());
}

#[test]
fn test_flat_patch_slice_extracts_everything() {
    // Coplanar patch on a tilted plane with outward normals.
    let normal = Vector3::new(0.0, -0.6, 0.8);
    let u = Vector3::new(1.0, 0.0, 0.0);
    let v = normal.cross(&u);
    let origin = Point3::new(0.2, 0.1, 0.5);
    let mut points = Vec::new();
    for i in 0..8 {
        for j in 0..8 {
            points.push(origin + u * (i as f32 * 0.01) + v * (j as f32 * 0.01));
        }
    }
    let pc = PointCloud::new(points)
        .with_normals(vec![normal; 64])
        .unwrap();

    let plane = fit_plane_least_squares(&pc.points).unwrap();
    let centroid = pc.centroid().unwrap();
    let slice = build_grasp_plane(&centroid, &plane.normal, 1e-4, &pc).unwrap();

    assert_eq!(slice.cloud.len(), pc.len());
    assert_eq!(slice.indices, (0..64).collect::<Vec<_>>());
    assert_eq!(slice.cloud.normals, pc.normals);
}

#[test]
fn test_region_then_downsample_keeps_normals() {
    let pc = noisy_patch(9, 400);
    let est = estimate_normals(
        &pc,
        &NormalConfig {
            orientation: Orientation::TowardViewpoint(Point3::new(0.0, 0.0, 1.0)),
            ..NormalConfig::default()
        },
    )
    .unwrap();

    let region = extract_radius_region(&Point3::origin(), 0.05, &est.cloud).unwrap();
    assert!(region.points.iter().all(|p| p.coords.norm() <= 0.05 + 1e-6));

    let down = voxel_down_sample(&region, 0.02).unwrap();
    assert!(down.len() <= region.len());
    let normals = down.normals.as_ref().unwrap();
    assert_eq!(normals.len(), down.len());
    assert!(normals.iter().all(|n| n.z > 0.8));
}
