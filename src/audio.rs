//! Spatial audio capability
//!
//! The binaural engine itself is external. Calls are fire-and-forget: a
//! failed source creation yields [`SourceId::INVALID`] and later calls on
//! it are ignored by the engine.

use glam::{Quat, Vec3};

/// Handle to a sound source owned by the audio engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub i32);

impl SourceId {
    pub const INVALID: SourceId = SourceId(-1);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

pub trait SpatialAudio {
    /// Decode ahead of time to avoid stalls at first playback
    fn preload_sound_file(&mut self, file: &str) -> bool;

    /// Positioned source, rendered binaurally
    fn create_sound_object(&mut self, file: &str) -> SourceId;

    /// Unspatialized source
    fn create_stereo_sound(&mut self, file: &str) -> SourceId;

    fn set_sound_object_position(&mut self, id: SourceId, position: Vec3);

    fn play_sound(&mut self, id: SourceId, looped: bool);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Listener orientation
    fn set_head_rotation(&mut self, rotation: Quat);

    /// Once per frame
    fn update(&mut self);
}

/// For hosts without an audio engine
pub struct NullAudio;

impl SpatialAudio for NullAudio {
    fn preload_sound_file(&mut self, _file: &str) -> bool {
        false
    }
    fn create_sound_object(&mut self, _file: &str) -> SourceId {
        SourceId::INVALID
    }
    fn create_stereo_sound(&mut self, _file: &str) -> SourceId {
        SourceId::INVALID
    }
    fn set_sound_object_position(&mut self, _id: SourceId, _position: Vec3) {}
    fn play_sound(&mut self, _id: SourceId, _looped: bool) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn set_head_rotation(&mut self, _rotation: Quat) {}
    fn update(&mut self) {}
}

#[cfg(target_os = "android")]
pub use self::android::JniAudioEngine;

#[cfg(target_os = "android")]
mod android {
    use super::{SourceId, SpatialAudio};
    use crate::jni_bridge::with_activity;
    use android_activity::AndroidApp;
    use glam::{Quat, Vec3};
    use jni::objects::JValue;
    use log::info;

    /// Forwards to the activity's audio helper, which wraps the binaural engine.
    pub struct JniAudioEngine {
        app: AndroidApp,
    }

    impl JniAudioEngine {
        pub fn new(app: AndroidApp) -> Self {
            info!("Audio: JNI audio engine bridge created");
            Self { app }
        }

        fn create(&self, method: &str, file: &str) -> SourceId {
            with_activity(&self.app, method, |env, activity| {
                let name = env.new_string(file)?;
                env.call_method(activity, method, "(Ljava/lang/String;)I", &[JValue::Object(&name)])?
                    .i()
            })
            .map(SourceId)
            .unwrap_or(SourceId::INVALID)
        }

        fn call_no_args(&self, method: &str) {
            with_activity(&self.app, method, |env, activity| {
                env.call_method(activity, method, "()V", &[]).map(|_| ())
            });
        }
    }

    impl SpatialAudio for JniAudioEngine {
        fn preload_sound_file(&mut self, file: &str) -> bool {
            with_activity(&self.app, "preloadSoundFile", |env, activity| {
                let name = env.new_string(file)?;
                env.call_method(
                    activity,
                    "preloadSoundFile",
                    "(Ljava/lang/String;)Z",
                    &[JValue::Object(&name)],
                )?
                .z()
            })
            .unwrap_or(false)
        }

        fn create_sound_object(&mut self, file: &str) -> SourceId {
            self.create("createSoundObject", file)
        }

        fn create_stereo_sound(&mut self, file: &str) -> SourceId {
            self.create("createStereoSound", file)
        }

        fn set_sound_object_position(&mut self, id: SourceId, position: Vec3) {
            if !id.is_valid() {
                return;
            }
            with_activity(&self.app, "setSoundObjectPosition", |env, activity| {
                env.call_method(
                    activity,
                    "setSoundObjectPosition",
                    "(IFFF)V",
                    &[
                        JValue::Int(id.0),
                        JValue::Float(position.x),
                        JValue::Float(position.y),
                        JValue::Float(position.z),
                    ],
                )
                .map(|_| ())
            });
        }

        fn play_sound(&mut self, id: SourceId, looped: bool) {
            if !id.is_valid() {
                return;
            }
            with_activity(&self.app, "playSound", |env, activity| {
                env.call_method(
                    activity,
                    "playSound",
                    "(IZ)V",
                    &[JValue::Int(id.0), JValue::Bool(looped as u8)],
                )
                .map(|_| ())
            });
        }

        fn pause(&mut self) {
            self.call_no_args("pauseAudio");
        }

        fn resume(&mut self) {
            self.call_no_args("resumeAudio");
        }

        fn set_head_rotation(&mut self, rotation: Quat) {
            with_activity(&self.app, "setHeadRotation", |env, activity| {
                env.call_method(
                    activity,
                    "setHeadRotation",
                    "(FFFF)V",
                    &[
                        JValue::Float(rotation.x),
                        JValue::Float(rotation.y),
                        JValue::Float(rotation.z),
                        JValue::Float(rotation.w),
                    ],
                )
                .map(|_| ())
            });
        }

        fn update(&mut self) {
            self.call_no_args("updateAudio");
        }
    }
}
