//! Parameter definitions with physical units and documented semantics.
//!
//! All scene constants live here: wave shapes, lighting, floor extent,
//! camera motion, and render-target sizing. Everything is initialized once
//! at startup and treated as immutable for the rest of the run.

use glam::{Vec2, Vec3};

/// One traveling sinusoid of the water surface.
#[derive(Debug, Clone, Copy)]
pub struct WaveComponent {
    /// Wave amplitude (meters)
    pub amplitude_m: f32,

    /// Spatial frequency vector (radians per meter in x and z).
    /// Direction of travel is along this vector.
    pub wave_vector: [f32; 2],

    /// Temporal angular frequency (radians per second)
    pub angular_speed: f32,

    /// Phase offset (radians)
    pub phase: f32,
}

/// Water surface parameters: a fixed sum of traveling sinusoids above the
/// floor plane.
///
/// The total steepness `sum(amplitude * |wave_vector|)` must stay well below
/// 1 so the surface normal always keeps a positive vertical component.
#[derive(Debug, Clone)]
pub struct WaveParams {
    /// Mean water level above the floor plane (meters)
    pub mean_level_m: f32,

    /// The three superposed wave trains
    pub components: [WaveComponent; 3],
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            mean_level_m: 1.5,
            components: [
                WaveComponent {
                    amplitude_m: 0.10,
                    wave_vector: [0.8, 0.3],
                    angular_speed: 1.1,
                    phase: 0.0,
                },
                WaveComponent {
                    amplitude_m: 0.06,
                    wave_vector: [-0.4, 0.9],
                    angular_speed: 1.7,
                    phase: 1.3,
                },
                WaveComponent {
                    amplitude_m: 0.04,
                    wave_vector: [1.7, -1.3],
                    angular_speed: 2.3,
                    phase: 4.0,
                },
            ],
        }
    }
}

impl WaveParams {
    /// Total slope bound `sum(a_i * |k_i|)`; the normal derivation assumes
    /// this stays below 1.
    pub fn max_steepness(&self) -> f32 {
        self.components
            .iter()
            .map(|c| c.amplitude_m * Vec2::from_array(c.wave_vector).length())
            .sum()
    }
}

/// Fixed lighting and material constants of the scene.
#[derive(Debug, Clone)]
pub struct SceneConstants {
    /// Unit direction from the surface toward the sun
    pub light_direction: [f32; 3],

    /// Sun light color (linear RGB)
    pub sun_color: [f32; 3],

    /// Ambient light color (linear RGB)
    pub ambient_color: [f32; 3],

    /// Specular highlight strength on the floor
    pub glossiness: f32,

    /// Specular lobe width; exponent is `1/roughness^2 - 1`
    pub roughness: f32,

    /// Floor extent along x (meters)
    pub floor_width_m: f32,

    /// Floor extent along z (meters)
    pub floor_depth_m: f32,
}

impl Default for SceneConstants {
    fn default() -> Self {
        Self {
            light_direction: Vec3::new(0.9, 1.0, -0.2).normalize().to_array(),
            sun_color: [1.0, 0.9, 0.8],
            ambient_color: [0.2, 0.2, 0.2],
            glossiness: 3.0,
            roughness: 0.05,
            floor_width_m: 40.0,
            floor_depth_m: 8.0,
        }
    }
}

impl SceneConstants {
    pub fn light_direction(&self) -> Vec3 {
        Vec3::from_array(self.light_direction)
    }

    pub fn floor_extent(&self) -> Vec2 {
        Vec2::new(self.floor_width_m, self.floor_depth_m)
    }
}

/// Free-fly camera motion constants.
#[derive(Debug, Clone)]
pub struct CameraParams {
    /// Initial eye position (meters); defaults to mid-floor, above and
    /// behind the pool looking down -Z
    pub start_position: [f32; 3],

    /// Translation speed (meters per second)
    pub move_speed_m_per_s: f32,

    /// Yaw/pitch speed (radians per second)
    pub turn_speed_rad_per_s: f32,

    /// Pitch is clamped to +/- this angle (radians) to keep the fixed up
    /// vector valid
    pub pitch_limit_rad: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            start_position: [20.0, 10.0, 20.0],
            move_speed_m_per_s: 6.0,
            turn_speed_rad_per_s: 2.0,
            pitch_limit_rad: 1.55,
        }
    }
}

/// Window, projection, and buffer-resolution configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels); tracks live window size after resize events
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Near clipping plane (meters)
    pub near_plane_m: f32,

    /// Far clipping plane (meters)
    pub far_plane_m: f32,

    /// Water grid resolution along x (quads); vertex count per row is cols+1
    pub surface_cols: usize,

    /// Water grid resolution along z (quads)
    pub surface_rows: usize,

    /// Offscreen caustic buffer width (texels)
    pub caustic_width: u32,

    /// Offscreen caustic buffer height (texels)
    pub caustic_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            fov_degrees: 90.0,
            near_plane_m: 0.01,
            far_plane_m: 100.0,
            surface_cols: 400,
            surface_rows: 80,
            caustic_width: 640,
            caustic_height: 128,
        }
    }
}

impl RenderConfig {
    pub fn aspect_ratio(&self) -> f32 {
        self.window_width as f32 / self.window_height.max(1) as f32
    }

    /// Total texel count of the caustic buffer; used to normalize per-sample
    /// energy so overall brightness is independent of grid resolution.
    pub fn caustic_texels(&self) -> u32 {
        self.caustic_width * self.caustic_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waves_keep_bounded_slope() {
        let waves = WaveParams::default();
        assert!(
            waves.max_steepness() < 1.0,
            "steepness {} would tip the surface normal below horizontal",
            waves.max_steepness()
        );
    }

    #[test]
    fn light_direction_is_unit_and_above_horizon() {
        let scene = SceneConstants::default();
        let dir = scene.light_direction();
        assert!((dir.length() - 1.0).abs() < 1e-6);
        assert!(dir.y > 0.0);
    }
}
