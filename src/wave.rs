//! Water surface height field: a sum of traveling sinusoids with exact
//! analytic slopes, plus the grid mesh that samples it every frame.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::params::WaveParams;

/// Vertex data for the water mesh (position + surface normal)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SurfaceVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Surface height above the floor plane at `(x, z)` and time `t`.
///
/// Mean level plus three superposed sine trains. Defined for all real
/// inputs; pure.
pub fn height(params: &WaveParams, x: f32, z: f32, t: f32) -> f32 {
    let mut h = params.mean_level_m;
    for c in &params.components {
        let phase = c.wave_vector[0] * x + c.wave_vector[1] * z - c.angular_speed * t + c.phase;
        h += c.amplitude_m * phase.sin();
    }
    h
}

/// Exact analytic slope `(dh/dx, dh/dz)` of [`height`].
///
/// This must stay the true derivative of the height sum (cosine terms with
/// the same arguments), never a finite difference; the shading normal is
/// derived from it and any mismatch shows up as surface artifacts.
pub fn slope(params: &WaveParams, x: f32, z: f32, t: f32) -> (f32, f32) {
    let mut dx = 0.0;
    let mut dz = 0.0;
    for c in &params.components {
        let phase = c.wave_vector[0] * x + c.wave_vector[1] * z - c.angular_speed * t + c.phase;
        let d = c.amplitude_m * phase.cos();
        dx += d * c.wave_vector[0];
        dz += d * c.wave_vector[1];
    }
    (dx, dz)
}

/// Unit surface normal `normalize(-dh/dx, 1, -dh/dz)`.
///
/// With the bounded steepness of [`WaveParams`] the vertical component is
/// always positive.
pub fn surface_normal(params: &WaveParams, x: f32, z: f32, t: f32) -> Vec3 {
    let (dx, dz) = slope(params, x, z, t);
    Vec3::new(-dx, 1.0, -dz).normalize()
}

/// Water grid mesh covering the floor footprint.
///
/// Vertex `(i, j)` maps deterministically to a fixed `(x, z)`; only heights
/// and normals are recomputed per frame, then the whole vertex buffer is
/// re-uploaded.
pub struct WaterGrid {
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
}

impl WaterGrid {
    /// Create a grid of `cols x rows` quads spanning `[0, extent.x] x
    /// [0, extent.y]` on the floor plane.
    pub fn new(cols: usize, rows: usize, extent: Vec2) -> Self {
        let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
        let mut indices = Vec::with_capacity(cols * rows * 6);

        for j in 0..=rows {
            for i in 0..=cols {
                let (x, z) = Self::vertex_position(i, j, cols, rows, extent);
                vertices.push(SurfaceVertex {
                    position: [x, 0.0, z],
                    normal: [0.0, 1.0, 0.0],
                });
            }
        }

        // Triangle indices, counter-clockwise winding seen from above
        for j in 0..rows {
            for i in 0..cols {
                let top_left = (j * (cols + 1) + i) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((j + 1) * (cols + 1) + i) as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Self { vertices, indices }
    }

    /// Pure mapping from grid index to world position on the floor plane.
    pub fn vertex_position(i: usize, j: usize, cols: usize, rows: usize, extent: Vec2) -> (f32, f32) {
        let x = i as f32 / cols as f32 * extent.x;
        let z = j as f32 / rows as f32 * extent.y;
        (x, z)
    }

    /// Re-evaluate the wave field at time `t` for every vertex.
    ///
    /// Horizontal positions never change; height and normal are overwritten
    /// in place so the buffer can be uploaded as-is.
    pub fn update(&mut self, params: &WaveParams, t: f32) {
        for vertex in &mut self.vertices {
            let x = vertex.position[0];
            let z = vertex.position[2];
            vertex.position[1] = height(params, x, z, t);
            vertex.normal = surface_normal(params, x, z, t).to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<(f32, f32, f32)> {
        let mut pts = Vec::new();
        for i in 0..8 {
            for j in 0..4 {
                for k in 0..3 {
                    pts.push((i as f32 * 5.3, j as f32 * 1.9, k as f32 * 0.7));
                }
            }
        }
        pts
    }

    #[test]
    fn analytic_slope_matches_finite_difference() {
        let params = WaveParams::default();
        let eps = 1e-3;

        for (x, z, t) in sample_points() {
            let (dx, dz) = slope(&params, x, z, t);
            let fd_dx =
                (height(&params, x + eps, z, t) - height(&params, x - eps, z, t)) / (2.0 * eps);
            let fd_dz =
                (height(&params, x, z + eps, t) - height(&params, x, z - eps, t)) / (2.0 * eps);

            assert!(
                (dx - fd_dx).abs() < 1e-3,
                "dh/dx mismatch at ({x}, {z}, {t}): analytic {dx}, finite difference {fd_dx}"
            );
            assert!(
                (dz - fd_dz).abs() < 1e-3,
                "dh/dz mismatch at ({x}, {z}, {t}): analytic {dz}, finite difference {fd_dz}"
            );
        }
    }

    #[test]
    fn normal_is_unit_with_positive_y() {
        let params = WaveParams::default();
        for (x, z, t) in sample_points() {
            let n = surface_normal(&params, x, z, t);
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!(n.y > 0.0, "normal dipped below horizontal at ({x}, {z}, {t})");
        }
    }

    #[test]
    fn grid_has_expected_topology() {
        let grid = WaterGrid::new(16, 8, Vec2::new(40.0, 8.0));

        assert_eq!(grid.vertices.len(), 17 * 9);
        assert_eq!(grid.indices.len(), 16 * 8 * 6);

        // Corner vertices span the full extent
        let first = grid.vertices.first().unwrap().position;
        let last = grid.vertices.last().unwrap().position;
        assert_eq!([first[0], first[2]], [0.0, 0.0]);
        assert_eq!([last[0], last[2]], [40.0, 8.0]);
    }

    #[test]
    fn flat_water_stays_at_mean_level() {
        let mut params = WaveParams::default();
        for c in &mut params.components {
            c.amplitude_m = 0.0;
        }

        let mut grid = WaterGrid::new(8, 4, Vec2::new(40.0, 8.0));
        grid.update(&params, 3.2);

        for v in &grid.vertices {
            assert_eq!(v.position[1], params.mean_level_m);
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }
}
