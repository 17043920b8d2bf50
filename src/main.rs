//! Water pool - a real-time pool scene with refractive caustics.
//!
//! One control thread drives the whole frame: poll input, advance time,
//! run the caustics/backdrop/floor/water passes, present.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use waterpool::camera::{CameraSystem, MovementInput};
use waterpool::caustics::{self, CausticVertex};
use waterpool::params::{CameraParams, RenderConfig, SceneConstants, WaveParams};
use waterpool::rendering::{FrameContext, RenderSystem};
use waterpool::wave::WaterGrid;

/// Sliding-window frame statistics, logged once per second.
struct FpsTracker {
    frame_times: VecDeque<Duration>,
    last_frame: Instant,
    last_log: Instant,
}

impl FpsTracker {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            frame_times: VecDeque::new(),
            last_frame: now,
            last_log: now,
        }
    }

    fn record_frame(&mut self) {
        let now = Instant::now();
        self.frame_times.push_back(now - self.last_frame);
        self.last_frame = now;
        if self.frame_times.len() > 60 {
            self.frame_times.pop_front();
        }

        if now - self.last_log > Duration::from_secs(1) {
            let total: Duration = self.frame_times.iter().sum();
            let avg = total.as_secs_f32() / self.frame_times.len() as f32;
            if avg > 0.0 {
                log::debug!("FPS avg: {:.1}", 1.0 / avg);
            }
            self.last_log = now;
        }
    }
}

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Scene state
    water: WaterGrid,
    waves: WaveParams,
    scene: SceneConstants,
    camera: CameraSystem,
    caustic_samples: Vec<CausticVertex>,

    // Input and configuration
    input: MovementInput,
    render_config: RenderConfig,

    // Time tracking: `time` freezes while paused, the camera stays live
    time: f32,
    paused: bool,
    last_frame: Instant,
    fps: FpsTracker,
}

impl App {
    fn new() -> Self {
        let waves = WaveParams::default();
        let scene = SceneConstants::default();
        let render_config = RenderConfig::default();

        let water = WaterGrid::new(
            render_config.surface_cols,
            render_config.surface_rows,
            scene.floor_extent(),
        );
        let camera = CameraSystem::new(CameraParams::default());

        Self {
            window: None,
            render_system: None,
            water,
            waves,
            scene,
            camera,
            caustic_samples: Vec::new(),
            input: MovementInput::default(),
            render_config,
            time: 0.0,
            paused: false,
            last_frame: Instant::now(),
            fps: FpsTracker::new(),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, pressed: bool, repeat: bool) {
        match code {
            KeyCode::Escape if pressed => event_loop.exit(),
            KeyCode::Space if pressed && !repeat => {
                self.paused = !self.paused;
                log::info!("{}", if self.paused { "Paused" } else { "Resumed" });
            }
            KeyCode::KeyW => self.input.forward = pressed,
            KeyCode::KeyS => self.input.backward = pressed,
            KeyCode::KeyA => self.input.left = pressed,
            KeyCode::KeyD => self.input.right = pressed,
            KeyCode::ShiftLeft => self.input.up = pressed,
            KeyCode::ControlLeft => self.input.down = pressed,
            KeyCode::ArrowLeft => self.input.yaw_left = pressed,
            KeyCode::ArrowRight => self.input.yaw_right = pressed,
            KeyCode::ArrowUp => self.input.pitch_up = pressed,
            KeyCode::ArrowDown => self.input.pitch_down = pressed,
            _ => {}
        }
    }

    /// Render a single frame
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let dt = {
            let now = Instant::now();
            let dt = (now - self.last_frame).as_secs_f32();
            self.last_frame = now;
            dt
        };
        if !self.paused {
            self.time += dt;
        }
        self.camera.integrate(&self.input, dt);

        // Re-evaluate the wave field, then forward-project it toward the
        // floor for this frame's caustic samples
        self.water.update(&self.waves, self.time);
        caustics::project(
            &self.water,
            &self.scene,
            self.render_config.caustic_texels(),
            &mut self.caustic_samples,
        );

        let Some(render_system) = self.render_system.as_mut() else {
            return;
        };
        render_system.update_water_vertices(&self.water.vertices);
        render_system.update_caustic_samples(&self.caustic_samples);

        let ctx = FrameContext::new(self.time, &self.camera, &self.render_config);
        render_system.update_uniforms(&ctx);

        match render_system.render() {
            Ok(()) => self.fps.record_frame(),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                render_system.resize(
                    self.render_config.window_width,
                    self.render_config.window_height,
                );
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::warn!("Frame skipped: {:?}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Water pool")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        let render_system = match pollster::block_on(RenderSystem::new(
            Arc::clone(&window),
            &self.water,
            self.scene.clone(),
            &self.render_config,
        )) {
            Ok(render_system) => render_system,
            Err(e) => {
                // Setup failures are fatal; there is no degraded mode
                log::error!("Renderer setup failed: {}", e);
                std::process::exit(1);
            }
        };

        log::info!("Water pool is running; ESC quits, Space pauses");

        self.window = Some(window);
        self.render_system = Some(render_system);
        self.last_frame = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.render_config.window_width = size.width;
                self.render_config.window_height = size.height;
                if let Some(render_system) = self.render_system.as_mut() {
                    render_system.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state,
                        physical_key: PhysicalKey::Code(code),
                        repeat,
                        ..
                    },
                ..
            } => {
                self.handle_key(event_loop, code, state == ElementState::Pressed, repeat);
            }
            WindowEvent::RedrawRequested => {
                self.render_frame(event_loop);
            }
            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let mut app = App::new();
    let event_loop = EventLoop::new().unwrap();
    let _ = event_loop.run_app(&mut app);
}
