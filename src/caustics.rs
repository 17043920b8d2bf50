//! Forward projection of sunlight through the wave surface onto the floor.
//!
//! Each wave-grid vertex becomes one point primitive positioned in the
//! caustic buffer's clip space at its refracted landing point, carrying the
//! transmitted light energy. Samples are accumulated additively on the GPU
//! (blend add, depth off), so evaluation order never matters: focusing shows
//! up as many points landing in the same texels, defocusing as few.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::optics::{refracted_landing_point, transmittance, AIR_IOR, WATER_IOR};
use crate::params::SceneConstants;
use crate::wave::WaterGrid;

/// One caustic sample: a pre-transformed clip-space position in the caustic
/// buffer plus the light it deposits there.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CausticVertex {
    pub clip_pos: [f32; 2],
    pub irradiance: [f32; 3],
}

/// Map a floor-plane landing point to the caustic buffer's clip space.
///
/// `u = x / width` and `v = z / depth` span the floor; clip y is flipped so
/// a sample at `v = 0` writes the topmost texel row, matching the texture
/// lookup direction used by the floor and water shaders.
pub fn floor_to_clip(landing_x: f32, landing_z: f32, scene: &SceneConstants) -> [f32; 2] {
    let u = landing_x / scene.floor_width_m;
    let v = landing_z / scene.floor_depth_m;
    [u * 2.0 - 1.0, 1.0 - v * 2.0]
}

/// Project every vertex of the water grid toward the floor along the light.
///
/// The grid must already hold this frame's heights and normals. Vertices
/// facing away from the light are skipped; landing points outside the floor
/// extent are kept and fall outside clip space, where the rasterizer drops
/// them. `energy_norm` spreads the total sun energy over the buffer so that
/// a flat surface under vertical light reproduces the plain sun color per
/// texel, independent of grid and buffer resolution.
///
/// Output is written into `out` (cleared first) to reuse its allocation
/// across frames.
pub fn project(
    grid: &WaterGrid,
    scene: &SceneConstants,
    buffer_texels: u32,
    out: &mut Vec<CausticVertex>,
) {
    out.clear();

    let light = scene.light_direction();
    let sun = Vec3::from_array(scene.sun_color);
    let energy_norm = buffer_texels as f32 / grid.vertices.len() as f32;

    for vertex in &grid.vertices {
        let normal = Vec3::from_array(vertex.normal);
        let cos_theta = normal.dot(light);
        if cos_theta <= 0.0 {
            continue;
        }

        let transmit = transmittance(cos_theta, AIR_IOR, WATER_IOR);
        let landing = refracted_landing_point(
            Vec3::from_array(vertex.position),
            light,
            normal,
            AIR_IOR,
            WATER_IOR,
        );

        out.push(CausticVertex {
            clip_pos: floor_to_clip(landing.x, landing.y, scene),
            irradiance: (sun * transmit * energy_norm).to_array(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::WaveParams;
    use glam::Vec2;

    fn flat_waves() -> WaveParams {
        let mut params = WaveParams::default();
        for c in &mut params.components {
            c.amplitude_m = 0.0;
        }
        params
    }

    fn overhead_scene() -> SceneConstants {
        SceneConstants {
            light_direction: [0.0, 1.0, 0.0],
            ..SceneConstants::default()
        }
    }

    /// Bin samples into a w x h grid the way the additive blend pass does.
    fn accumulate(samples: &[CausticVertex], w: usize, h: usize) -> Vec<f32> {
        let mut buffer = vec![0.0f32; w * h];
        for s in samples {
            let u = (s.clip_pos[0] + 1.0) / 2.0;
            let v = (1.0 - s.clip_pos[1]) / 2.0;
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let x = (u * w as f32) as usize;
            let y = (v * h as f32) as usize;
            buffer[y * w + x] += s.irradiance[0];
        }
        buffer
    }

    #[test]
    fn flat_water_under_vertical_light_lands_on_straight_projection() {
        let scene = overhead_scene();
        let mut grid = WaterGrid::new(40, 8, scene.floor_extent());
        grid.update(&flat_waves(), 0.0);

        let mut samples = Vec::new();
        project(&grid, &scene, 640 * 128, &mut samples);

        assert_eq!(samples.len(), grid.vertices.len());
        for (sample, vertex) in samples.iter().zip(&grid.vertices) {
            // Zero bend at normal incidence: the clip position equals the
            // vertex's own floor projection.
            let expected = floor_to_clip(vertex.position[0], vertex.position[2], &scene);
            assert!((sample.clip_pos[0] - expected[0]).abs() < 1e-6);
            assert!((sample.clip_pos[1] - expected[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn flat_water_fills_the_buffer_uniformly() {
        let scene = overhead_scene();
        // One flat sample per texel center, so uniformity is exact rather
        // than statistical and no sample sits on a bin boundary
        let (w, h) = (40usize, 8usize);
        let mut vertices = Vec::new();
        for j in 0..h {
            for i in 0..w {
                vertices.push(crate::wave::SurfaceVertex {
                    position: [
                        (i as f32 + 0.5) / w as f32 * scene.floor_width_m,
                        1.5,
                        (j as f32 + 0.5) / h as f32 * scene.floor_depth_m,
                    ],
                    normal: [0.0, 1.0, 0.0],
                });
            }
        }
        let grid = WaterGrid {
            vertices,
            indices: Vec::new(),
        };

        let mut samples = Vec::new();
        project(&grid, &scene, (w * h) as u32, &mut samples);
        let buffer = accumulate(&samples, w, h);

        let (lo, hi) = buffer
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        assert!(lo > 0.0, "every texel must receive exactly one sample");
        assert!(
            hi - lo < 1e-5,
            "flat water must neither focus nor defocus (min {lo}, max {hi})"
        );
    }

    #[test]
    fn accumulation_is_order_independent() {
        let scene = SceneConstants::default();
        let mut grid = WaterGrid::new(64, 16, scene.floor_extent());
        grid.update(&WaveParams::default(), 1.7);

        let mut samples = Vec::new();
        project(&grid, &scene, 640 * 128, &mut samples);

        let forward = accumulate(&samples, 64, 16);
        let mut shuffled = samples.clone();
        shuffled.reverse();
        // Interleave halves for a non-trivial reordering
        let half = shuffled.len() / 2;
        let (a, b) = shuffled.split_at(half);
        let interleaved: Vec<CausticVertex> = a
            .iter()
            .zip(b.iter())
            .flat_map(|(x, y)| [*y, *x])
            .chain(shuffled.iter().skip(2 * half).copied())
            .collect();
        let reordered = accumulate(&interleaved, 64, 16);

        for (i, (f, r)) in forward.iter().zip(&reordered).enumerate() {
            assert!(
                (f - r).abs() < 1e-4,
                "texel {i} differs between orderings: {f} vs {r}"
            );
        }
    }

    #[test]
    fn back_facing_vertices_are_masked() {
        // Light arriving horizontally: every upward-ish normal with a
        // negative dot against it must be skipped.
        let scene = SceneConstants {
            light_direction: [-1.0, 0.0, 0.0],
            ..SceneConstants::default()
        };
        let mut grid = WaterGrid::new(16, 4, scene.floor_extent());
        grid.update(&WaveParams::default(), 0.5);

        let mut samples = Vec::new();
        project(&grid, &scene, 640 * 128, &mut samples);

        let light = scene.light_direction();
        let lit = grid
            .vertices
            .iter()
            .filter(|v| Vec3::from_array(v.normal).dot(light) > 0.0)
            .count();
        assert_eq!(samples.len(), lit);
    }

    #[test]
    fn transmitted_energy_shrinks_toward_grazing() {
        // Two flat samples, one lit overhead and one near grazing; the
        // grazing one must carry far less energy into the caustic buffer.
        let overhead = overhead_scene();
        let grazing = SceneConstants {
            light_direction: Vec3::new(1.0, 0.02, 0.0).normalize().to_array(),
            ..SceneConstants::default()
        };

        let mut grid = WaterGrid::new(4, 4, Vec2::new(40.0, 8.0));
        grid.update(&flat_waves(), 0.0);

        let mut a = Vec::new();
        let mut b = Vec::new();
        project(&grid, &overhead, 100, &mut a);
        project(&grid, &grazing, 100, &mut b);

        assert!(b[0].irradiance[0] < 0.2 * a[0].irradiance[0]);
    }
}
