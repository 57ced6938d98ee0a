//! Calls into the Java activity
//!
//! Audio and vibration live on the Java side; everything here is
//! fire-and-forget, failures are logged and dropped.

use jni::errors::Error as JniError;

/// A failed call that leaves a Java exception pending on the thread
#[cfg_attr(not(target_os = "android"), allow(dead_code))]
fn leaves_java_exception(err: &JniError) -> bool {
    matches!(err, JniError::JavaException)
}

#[cfg(target_os = "android")]
pub use self::android::with_activity;

#[cfg(target_os = "android")]
mod android {
    use super::leaves_java_exception;
    use android_activity::AndroidApp;
    use jni::objects::JObject;
    use jni::sys::jobject;
    use jni::JNIEnv;
    use log::error;

    /// Runs `f` with the thread's JNI env and the activity object.
    ///
    /// The event loop thread stays attached after the first call, so the
    /// per-frame audio calls don't attach and detach every time.
    pub fn with_activity<T>(
        app: &AndroidApp,
        what: &str,
        f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<T>,
    ) -> Option<T> {
        let vm = match unsafe { jni::JavaVM::from_raw(app.vm_as_ptr() as *mut jni::sys::JavaVM) } {
            Ok(vm) => vm,
            Err(e) => {
                error!("JNI: no JavaVM for {}: {:?}", what, e);
                return None;
            }
        };
        let mut env = match vm.attach_current_thread_permanently() {
            Ok(env) => env,
            Err(e) => {
                error!("JNI: attach failed for {}: {:?}", what, e);
                return None;
            }
        };

        let activity = unsafe { JObject::from_raw(app.activity_as_ptr() as jobject) };
        match f(&mut env, &activity) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("JNI: {} failed: {:?}", what, e);
                // Later calls on this thread would fail with it still set
                if leaves_java_exception(&e) || env.exception_check().unwrap_or(false) {
                    let _ = env.exception_describe();
                    let _ = env.exception_clear();
                }
                None
            }
        }
    }
}
