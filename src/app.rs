//! Android application shell
//!
//! Drives the scene from the winit event loop: sensors and input are
//! sampled once per frame, both eyes are drawn, then the trigger is
//! handled. A fatal error ends the loop.

use std::ffi::CString;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Instant;

use android_activity::AndroidApp;
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{NativeKeyCode, PhysicalKey};
use winit::platform::android::EventLoopBuilderExtAndroid;
use winit::window::{Window, WindowId};

use crate::audio::JniAudioEngine;
use crate::config::{HuntConfig, RenderConfig};
use crate::error::Result;
use crate::found_model::{self, IndexedMesh};
use crate::haptics::JniVibrator;
use crate::input;
use crate::renderer::Renderer;
use crate::scene::{CubeMode, TreasureHunt};
use crate::sensors::SensorInput;
use crate::stereo::StereoRig;

struct TreasureHuntApp {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    sensors: Option<SensorInput>,
    scene: TreasureHunt,
    rig: StereoRig,
    render_config: RenderConfig,
    found_model: Option<IndexedMesh>,
    audio_started: bool,
    last_frame_time: Instant,
}

impl TreasureHuntApp {
    fn new(app: AndroidApp) -> Self {
        let render_config = RenderConfig::default();
        let found_model = load_found_model(&app, &render_config.found_model_file);
        let scene = TreasureHunt::new(
            HuntConfig::default(),
            Box::new(JniAudioEngine::new(app.clone())),
            Box::new(JniVibrator::new(app)),
        );
        let rig = StereoRig::new(
            render_config.ipd,
            render_config.fov_y_deg,
            render_config.lens_center_offset,
        );

        Self {
            window: None,
            renderer: None,
            sensors: None,
            scene,
            rig,
            render_config,
            found_model,
            audio_started: false,
            last_frame_time: Instant::now(),
        }
    }

    fn create_renderer(&self, window: Arc<Window>) -> Result<Renderer> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        });
        let size = window.inner_size();
        let surface = instance.create_surface(window)?;
        pollster::block_on(Renderer::new(
            &instance,
            surface,
            size.width,
            size.height,
            &self.render_config,
            self.found_model.as_ref(),
        ))
    }

    fn draw_frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        let actions = input::poll_actions();

        let head = match self.sensors.as_mut() {
            Some(sensors) => {
                if actions.recenter {
                    sensors.recenter();
                }
                sensors.update(dt);
                sensors.head_transform()
            }
            None => Default::default(),
        };

        self.scene.new_frame(&head);

        if let Some(renderer) = self.renderer.as_mut() {
            let (width, height) = renderer.size();
            let eyes = self
                .rig
                .eyes(&head, width, height)
                .map(|eye| self.scene.draw_eye(&eye));
            renderer.render(&eyes)?;
        }

        if actions.trigger {
            match self.scene.on_trigger(&mut rand::thread_rng()) {
                CubeMode::Found => info!("Treasure found, hiding it again"),
                CubeMode::Normal => info!("Trigger missed the treasure"),
            }
        }

        Ok(())
    }
}

impl ApplicationHandler for TreasureHuntApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        info!("App resumed - creating window");

        let window_attrs = Window::default_attributes().with_title("Treasure Hunt");
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        match self.create_renderer(window.clone()) {
            Ok(renderer) => {
                self.scene.set_found_model_available(renderer.has_found_model());
                self.renderer = Some(renderer);
            }
            Err(e) => {
                error!("{}", e);
                event_loop.exit();
                return;
            }
        }

        // Sensors survive pause/resume
        if self.sensors.is_none() {
            let sensors = SensorInput::new();
            if !sensors.is_available() {
                warn!("No rotation sensor - using simulated head motion");
            }
            self.sensors = Some(sensors);
        }

        if !self.audio_started {
            self.scene.start_audio();
            self.audio_started = true;
        }
        self.scene.resume_audio();

        self.last_frame_time = Instant::now();
        window.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        info!("App suspended - releasing GPU resources");
        self.scene.pause_audio();
        self.renderer = None;
        self.window = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.draw_frame() {
                    error!("{}", e);
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Unidentified(NativeKeyCode::Android(code)) = event.physical_key {
                    let pressed = event.state == ElementState::Pressed;
                    input::handle_button(code as i32, pressed);
                }
            }

            WindowEvent::Touch(touch) => {
                if touch.phase == TouchPhase::Ended {
                    input::handle_tap();
                }
            }

            _ => {}
        }
    }
}

/// Reads the found model from the APK assets. Without it the gold cube is shown.
fn load_found_model(app: &AndroidApp, file: &str) -> Option<IndexedMesh> {
    let asset = CString::new(file)
        .ok()
        .and_then(|name| app.asset_manager().open(&name));
    let Some(asset) = asset else {
        warn!("Model asset {} not found - using the gold cube", file);
        return None;
    };
    match found_model::load_reader(file, &mut BufReader::new(asset)) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("{} - using the gold cube", e);
            None
        }
    }
}

/// Android entry point
#[no_mangle]
fn android_main(app: AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("TreasureHunt"),
    );

    info!("Treasure Hunt starting...");

    let event_loop = match EventLoop::builder().with_android_app(app.clone()).build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("Failed to create event loop: {}", e);
            return;
        }
    };

    let mut hunt = TreasureHuntApp::new(app);
    if let Err(e) = event_loop.run_app(&mut hunt) {
        error!("Event loop failed: {}", e);
    }
}
