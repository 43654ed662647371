#![allow(dead_code)]

use geograsp::PointCloud;
use nalgebra::Point3;

/// Flat support surface at z = 0, 0.3 x 0.3 around the origin.
pub fn table() -> PointCloud {
    let mut points = Vec::new();
    for i in 0..=30 {
        for j in 0..=30 {
            points.push(Point3::new(-0.15 + i as f32 * 0.01, -0.15 + j as f32 * 0.01, 0.0));
        }
    }
    let colors = vec![Point3::new(0.6, 0.5, 0.4); points.len()];
    PointCloud::new(points).with_colors(colors).unwrap()
}

/// Surface samples of an axis-aligned box with `steps` cells per side,
/// centred on `center` in x and y and starting at `z0`.
/// The bottom face is left out when `open_bottom` is set, as seen by a
/// camera above the table.
pub fn box_surface(
    steps: [usize; 3],
    step: f32,
    center: Point3<f32>,
    z0: f32,
    open_bottom: bool,
) -> PointCloud {
    let [nx, ny, nz] = steps;
    let half_x = nx as f32 * step / 2.0;
    let half_y = ny as f32 * step / 2.0;
    let mut points = Vec::new();
    for i in 0..=nx {
        for j in 0..=ny {
            for k in 0..=nz {
                let on_side = i == 0 || i == nx || j == 0 || j == ny || k == nz;
                let on_bottom = k == 0 && !open_bottom;
                if on_side || on_bottom {
                    points.push(Point3::new(
                        center.x - half_x + i as f32 * step,
                        center.y - half_y + j as f32 * step,
                        z0 + k as f32 * step,
                    ));
                }
            }
        }
    }
    let colors = vec![Point3::new(0.9, 0.1, 0.1); points.len()];
    PointCloud::new(points).with_colors(colors).unwrap()
}

/// A 0.12 x 0.04 x 0.06 box standing on the table, long side along x.
pub fn long_box() -> PointCloud {
    box_surface([30, 10, 15], 0.004, Point3::origin(), 0.0, true)
}

/// A closed 0.04 cube floating above the table.
pub fn cube() -> PointCloud {
    box_surface([10, 10, 10], 0.004, Point3::origin(), 0.01, false)
}
