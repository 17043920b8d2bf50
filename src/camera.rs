//! Free-fly camera: position plus yaw/pitch, with the view direction derived
//! each frame by rotating a fixed forward vector.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

use crate::params::{CameraParams, RenderConfig};

/// Held movement keys, polled once per frame. The window layer owns the
/// mapping from physical keys to these flags; the camera never sees winit.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub pitch_up: bool,
    pub pitch_down: bool,
}

/// Camera pose; mutated only by [`CameraSystem::integrate`], read-only to
/// the render passes.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraState {
    /// View direction: the fixed forward `(0, 0, -1)` rotated by yaw about Y
    /// then pitch about X.
    pub fn front(&self) -> Vec3 {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0) * Vec3::NEG_Z
    }

    /// Rightward direction on the horizontal-ish plane of the view.
    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }
}

/// Camera system: integrates held-key input into the pose and produces the
/// per-frame matrices.
pub struct CameraSystem {
    pub state: CameraState,
    params: CameraParams,
}

impl CameraSystem {
    pub fn new(params: CameraParams) -> Self {
        let state = CameraState {
            position: Vec3::from_array(params.start_position),
            yaw: 0.0,
            pitch: 0.0,
        };
        Self { state, params }
    }

    /// Apply one frame of held-key movement. Translation rides the current
    /// view direction; vertical motion is world-space up/down.
    pub fn integrate(&mut self, input: &MovementInput, dt: f32) {
        let move_step = self.params.move_speed_m_per_s * dt;
        let turn_step = self.params.turn_speed_rad_per_s * dt;

        if input.yaw_left {
            self.state.yaw += turn_step;
        }
        if input.yaw_right {
            self.state.yaw -= turn_step;
        }
        if input.pitch_up {
            self.state.pitch += turn_step;
        }
        if input.pitch_down {
            self.state.pitch -= turn_step;
        }
        self.state.pitch = self
            .state
            .pitch
            .clamp(-self.params.pitch_limit_rad, self.params.pitch_limit_rad);

        let front = self.state.front();
        let right = self.state.right();
        if input.forward {
            self.state.position += front * move_step;
        }
        if input.backward {
            self.state.position -= front * move_step;
        }
        if input.right {
            self.state.position += right * move_step;
        }
        if input.left {
            self.state.position -= right * move_step;
        }
        if input.up {
            self.state.position += Vec3::Y * move_step;
        }
        if input.down {
            self.state.position -= Vec3::Y * move_step;
        }
    }

    /// View-projection matrix, its rotation-only counterpart for backdrop
    /// ray reconstruction, and the eye position.
    pub fn frame_matrices(&self, config: &RenderConfig) -> (Mat4, Mat4, Vec3) {
        let view = self.state.view_matrix();
        let proj = Mat4::perspective_rh(
            config.fov_degrees.to_radians(),
            config.aspect_ratio(),
            config.near_plane_m,
            config.far_plane_m,
        );

        // Strip the translation so the backdrop follows rotation only
        let rotation_view = Mat4::from_mat3(Mat3::from_mat4(view));

        (proj * view, proj * rotation_view, self.state.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_looks_down_negative_z() {
        let camera = CameraSystem::new(CameraParams::default());
        let front = camera.state.front();
        assert!((front - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn yaw_turns_left_and_pitch_looks_up() {
        let mut camera = CameraSystem::new(CameraParams::default());
        camera.state.yaw = std::f32::consts::FRAC_PI_2;
        let front = camera.state.front();
        assert!((front - Vec3::NEG_X).length() < 1e-5);

        camera.state.yaw = 0.0;
        camera.state.pitch = 0.4;
        assert!(camera.state.front().y > 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let params = CameraParams::default();
        let limit = params.pitch_limit_rad;
        let mut camera = CameraSystem::new(params);

        let input = MovementInput {
            pitch_up: true,
            ..MovementInput::default()
        };
        for _ in 0..1000 {
            camera.integrate(&input, 0.1);
        }
        assert!(camera.state.pitch <= limit + 1e-6);
    }

    #[test]
    fn forward_motion_follows_the_view_direction() {
        let mut camera = CameraSystem::new(CameraParams::default());
        camera.state.yaw = std::f32::consts::FRAC_PI_2; // facing -X
        let start = camera.state.position;

        let input = MovementInput {
            forward: true,
            ..MovementInput::default()
        };
        camera.integrate(&input, 1.0);

        let delta = camera.state.position - start;
        assert!(delta.x < 0.0);
        assert!(delta.z.abs() < 1e-4);
    }

    #[test]
    fn frame_matrices_are_finite_and_distinct() {
        let camera = CameraSystem::new(CameraParams::default());
        let (view_proj, backdrop_vp, eye) = camera.frame_matrices(&RenderConfig::default());

        assert_ne!(view_proj, Mat4::IDENTITY);
        assert_ne!(view_proj, backdrop_vp);
        assert!(eye.x.is_finite() && eye.y.is_finite() && eye.z.is_finite());
        assert!(backdrop_vp.inverse().is_finite());
    }
}
