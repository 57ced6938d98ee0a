//! Tunable parameters for the scene and the renderer

use glam::Vec3;
use std::path::PathBuf;
use std::time::Duration;

/// Scene constants for the treasure hunt
#[derive(Debug, Clone)]
pub struct HuntConfig {
    pub z_near: f32,
    pub z_far: f32,
    /// Camera sits just behind the origin, looking at it
    pub camera_z: f32,
    /// Cube spin per frame, in degrees
    pub rotation_step_deg: f32,
    pub rotation_axis: Vec3,
    pub yaw_limit: f32,
    pub pitch_limit: f32,
    /// Light is kept just above the user
    pub light_pos_world: Vec3,
    pub min_model_distance: f32,
    pub max_model_distance: f32,
    pub floor_depth: f32,
    pub skybox_scale: f32,
    /// Found model relative to the cube
    pub found_model_scale: f32,
    pub object_sound_file: String,
    pub success_sound_file: String,
    pub vibration: Duration,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            z_near: 0.1,
            z_far: 100.0,
            camera_z: 0.01,
            rotation_step_deg: 0.3,
            rotation_axis: Vec3::new(0.5, 0.5, 1.0),
            yaw_limit: 0.12,
            pitch_limit: 0.12,
            light_pos_world: Vec3::new(0.0, 2.0, 0.0),
            min_model_distance: 3.0,
            max_model_distance: 7.0,
            floor_depth: 20.0,
            skybox_scale: 30.0,
            found_model_scale: 0.005,
            object_sound_file: "cube_sound.wav".to_string(),
            success_sound_file: "success.wav".to_string(),
            vibration: Duration::from_millis(50),
        }
    }
}

/// Renderer and stereo rig parameters
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub clear_color: [f64; 4],
    /// Inter-pupillary distance (average human IPD is ~63mm)
    pub ipd: f32,
    pub fov_y_deg: f32,
    /// Horizontal shift of each lens centre, in half-viewport units
    pub lens_center_offset: f32,
    /// Read shaders from here instead of the embedded sources
    pub shader_dir: Option<PathBuf>,
    /// OBJ asset shown in place of the cube while it is looked at
    pub found_model_file: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.1, 0.5],
            ipd: 0.063,
            fov_y_deg: 90.0,
            lens_center_offset: 0.0,
            shader_dir: None,
            found_model_file: "helicopter.obj".to_string(),
        }
    }
}
