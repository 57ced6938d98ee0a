//! Treasure Hunt - stereo VR mini-game
//!
//! A cube floats around the user. Looking at it turns it gold; pulling the
//! trigger while it is gold plays a chime and hides it somewhere else
//! around the user. A looping sound is attached to the cube so it can be
//! found by ear.
//!
//! Scene logic, stereo math, geometry and input are plain Rust and run on
//! any host. The Android shell wires them to sensors, wgpu, and the Java
//! side's audio engine and vibrator.

pub mod audio;
pub mod config;
pub mod error;
pub mod found_model;
pub mod haptics;
pub mod input;
mod jni_bridge;
pub mod renderer;
pub mod scene;
pub mod sensors;
pub mod shaders;
pub mod skybox;
pub mod stereo;
pub mod world_layout;

#[cfg(target_os = "android")]
mod app;

pub use config::{HuntConfig, RenderConfig};
pub use error::{Result, VrError};
pub use scene::{CubeMode, DrawCommand, EyeFrame, MeshKind, TreasureHunt};
pub use stereo::{Eye, EyeKind, HeadTransform, StereoRig};
