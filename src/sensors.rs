//! Head tracking
//!
//! Orientation comes from the Game Rotation Vector sensor when present
//! (no magnetic interference), else from integrating the gyroscope, else
//! from a gentle simulated sway. Recentering removes the current yaw.
//!
//! Android reports rotations of the device's portrait axes in a Z-up
//! world. The scene is Y-up, looks down -Z, and the phone sits in the
//! viewer in landscape, so samples are remapped on the way in.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Quat, Vec3};
use log::info;

use crate::stereo::HeadTransform;

/// Sensor world (Z up, Y north) to scene world (Y up, -Z forward)
fn world_remap() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// Landscape view axes to portrait device axes: view up is device +X
fn display_rotation() -> Quat {
    Quat::from_rotation_z(-FRAC_PI_2)
}

/// Sensor-independent orientation state, in scene axes
#[derive(Debug, Clone)]
pub struct HeadTracker {
    orientation: Quat,
    recenter_offset: Quat,
    sim_time: f32,
}

impl Default for HeadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadTracker {
    pub fn new() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            recenter_offset: Quat::IDENTITY,
            sim_time: 0.0,
        }
    }

    /// Rotation vector sample in sensor axes; w is optional on some devices.
    pub fn set_rotation_vector(&mut self, x: f32, y: f32, z: f32, w: Option<f32>) {
        let w = w.unwrap_or_else(|| (1.0 - x * x - y * y - z * z).max(0.0).sqrt());
        let device = Quat::from_xyzw(x, y, z, w).normalize();
        self.orientation = (world_remap() * device * display_rotation()).normalize();
    }

    /// Gyroscope rates in rad/s, device axes
    pub fn integrate_gyro(&mut self, rates: Vec3, dt: f32) {
        let view_rates = display_rotation().inverse() * rates;
        self.orientation = (self.orientation * Quat::from_scaled_axis(view_rates * dt)).normalize();
    }

    /// Fallback when no sensor is available
    pub fn simulate(&mut self, dt: f32) {
        self.sim_time += dt;
        let breathing = (self.sim_time * 0.5).sin() * 0.01;
        let sway = (self.sim_time * 0.3).sin() * 0.005;
        self.orientation = Quat::from_euler(EulerRot::YXZ, 0.0, breathing, sway);
    }

    /// Makes the current heading the new forward; pitch and roll are kept.
    pub fn recenter(&mut self) {
        let (yaw, _, _) = self.orientation.to_euler(EulerRot::YXZ);
        self.recenter_offset = Quat::from_rotation_y(-yaw);
        info!("Head tracking recentered (yaw {:.1} deg)", yaw.to_degrees());
    }

    pub fn orientation(&self) -> Quat {
        (self.recenter_offset * self.orientation).normalize()
    }

    pub fn head_transform(&self) -> HeadTransform {
        HeadTransform::from_orientation(self.orientation())
    }
}

#[cfg(target_os = "android")]
pub use self::android::SensorInput;

#[cfg(target_os = "android")]
mod android {
    use super::HeadTracker;
    use crate::stereo::HeadTransform;
    use glam::Vec3;
    use log::info;
    use std::ptr;

    const ASENSOR_TYPE_GAME_ROTATION_VECTOR: i32 = 15;
    const ASENSOR_TYPE_GYROSCOPE: i32 = 4;
    // ~60Hz
    const EVENT_RATE_US: i32 = 16_000;

    /// NDK sensor queue feeding a [`HeadTracker`]
    pub struct SensorInput {
        sensor_manager: *mut ndk_sys::ASensorManager,
        event_queue: *mut ndk_sys::ASensorEventQueue,
        tracker: HeadTracker,
        initialized: bool,
    }

    impl SensorInput {
        pub fn new() -> Self {
            let mut input = Self {
                sensor_manager: ptr::null_mut(),
                event_queue: ptr::null_mut(),
                tracker: HeadTracker::new(),
                initialized: false,
            };
            input.init_sensors();
            input
        }

        fn init_sensors(&mut self) {
            info!("Initializing head tracking sensors...");

            unsafe {
                self.sensor_manager = ndk_sys::ASensorManager_getInstanceForPackage(
                    b"com.treasurehunt\0".as_ptr() as *const _,
                );
                if self.sensor_manager.is_null() {
                    self.sensor_manager = ndk_sys::ASensorManager_getInstance();
                }
                if self.sensor_manager.is_null() {
                    info!("ASensorManager not available");
                    return;
                }

                let mut sensor = ndk_sys::ASensorManager_getDefaultSensor(
                    self.sensor_manager,
                    ASENSOR_TYPE_GAME_ROTATION_VECTOR,
                );
                if sensor.is_null() {
                    info!("Game Rotation Vector not available, trying gyroscope");
                    sensor = ndk_sys::ASensorManager_getDefaultSensor(
                        self.sensor_manager,
                        ASENSOR_TYPE_GYROSCOPE,
                    );
                }
                if sensor.is_null() {
                    info!("No rotation sensors available");
                    return;
                }

                let mut looper = ndk_sys::ALooper_forThread();
                if looper.is_null() {
                    looper = ndk_sys::ALooper_prepare(0);
                }
                if looper.is_null() {
                    info!("Failed to get ALooper");
                    return;
                }

                self.event_queue = ndk_sys::ASensorManager_createEventQueue(
                    self.sensor_manager,
                    looper,
                    0,
                    None,
                    ptr::null_mut(),
                );
                if self.event_queue.is_null() {
                    info!("Failed to create sensor event queue");
                    return;
                }

                let result = ndk_sys::ASensorEventQueue_enableSensor(self.event_queue, sensor);
                if result < 0 {
                    info!("Failed to enable sensor: {}", result);
                    return;
                }
                ndk_sys::ASensorEventQueue_setEventRate(self.event_queue, sensor, EVENT_RATE_US);

                self.initialized = true;
                info!("Head tracking sensors initialized");
            }
        }

        /// Drains pending sensor events
        pub fn update(&mut self, dt: f32) {
            if !self.initialized || self.event_queue.is_null() {
                self.tracker.simulate(dt);
                return;
            }

            unsafe {
                let mut event: ndk_sys::ASensorEvent = std::mem::zeroed();
                while ndk_sys::ASensorEventQueue_getEvents(self.event_queue, &mut event, 1) > 0 {
                    let data = event.__bindgen_anon_1.__bindgen_anon_1.data;
                    match event.type_ {
                        ASENSOR_TYPE_GAME_ROTATION_VECTOR => {
                            self.tracker.set_rotation_vector(data[0], data[1], data[2], None)
                        }
                        ASENSOR_TYPE_GYROSCOPE => self
                            .tracker
                            .integrate_gyro(Vec3::new(data[0], data[1], data[2]), dt),
                        _ => {}
                    }
                }
            }
        }

        pub fn recenter(&mut self) {
            self.tracker.recenter();
        }

        pub fn head_transform(&self) -> HeadTransform {
            self.tracker.head_transform()
        }

        pub fn is_available(&self) -> bool {
            self.initialized
        }
    }

    impl Drop for SensorInput {
        fn drop(&mut self) {
            unsafe {
                if !self.event_queue.is_null() && !self.sensor_manager.is_null() {
                    ndk_sys::ASensorManager_destroyEventQueue(self.sensor_manager, self.event_queue);
                }
            }
        }
    }
}
