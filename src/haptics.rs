//! Haptic feedback capability

use std::time::Duration;

pub trait Haptics {
    fn vibrate(&mut self, duration: Duration);
}

/// For hosts without a vibrator
pub struct NullHaptics;

impl Haptics for NullHaptics {
    fn vibrate(&mut self, _duration: Duration) {}
}

#[cfg(target_os = "android")]
pub use self::android::JniVibrator;

#[cfg(target_os = "android")]
mod android {
    use super::Haptics;
    use crate::jni_bridge::with_activity;
    use android_activity::AndroidApp;
    use jni::objects::JValue;
    use std::time::Duration;

    /// Calls `vibrate(long)` on the activity
    pub struct JniVibrator {
        app: AndroidApp,
    }

    impl JniVibrator {
        pub fn new(app: AndroidApp) -> Self {
            Self { app }
        }
    }

    impl Haptics for JniVibrator {
        fn vibrate(&mut self, duration: Duration) {
            let millis = duration.as_millis() as i64;
            with_activity(&self.app, "vibrate", |env, activity| {
                env.call_method(activity, "vibrate", "(J)V", &[JValue::Long(millis)])
                    .map(|_| ())
            });
        }
    }
}
