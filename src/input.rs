//! Trigger input
//!
//! Touch taps and gamepad buttons all map onto the trigger. Raw state is
//! recorded as events arrive (winit on the event loop, JNI from the Java
//! side) and turned into one-shot actions once per frame.

use lazy_static::lazy_static;
use std::sync::Mutex;

/// Android KeyEvent button codes
pub mod keycodes {
    pub const BUTTON_A: i32 = 96; // X on DualSense
    pub const BUTTON_R2: i32 = 105;
    pub const BUTTON_THUMBL: i32 = 106; // L3
    pub const DPAD_CENTER: i32 = 23;
    pub const ENTER: i32 = 66;
}

/// One-shot actions, fired on the press edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputActions {
    pub trigger: bool,
    pub recenter: bool,
}

/// Raw button state
#[derive(Debug, Clone, Default)]
pub struct InputState {
    trigger_held: bool,
    recenter_held: bool,
    /// Taps have no release, they fire once
    pending_taps: u32,
    prev_trigger: bool,
    prev_recenter: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_button(&mut self, key_code: i32, pressed: bool) {
        match key_code {
            keycodes::BUTTON_A
            | keycodes::BUTTON_R2
            | keycodes::DPAD_CENTER
            | keycodes::ENTER => self.trigger_held = pressed,
            keycodes::BUTTON_THUMBL => self.recenter_held = pressed,
            _ => {}
        }
    }

    pub fn handle_tap(&mut self) {
        self.pending_taps += 1;
    }

    /// Call once per frame.
    pub fn poll_actions(&mut self) -> InputActions {
        let actions = InputActions {
            trigger: (self.trigger_held && !self.prev_trigger) || self.pending_taps > 0,
            recenter: self.recenter_held && !self.prev_recenter,
        };

        self.prev_trigger = self.trigger_held;
        self.prev_recenter = self.recenter_held;
        self.pending_taps = 0;

        actions
    }
}

// Shared with the JNI callbacks, which run off the event loop thread
lazy_static! {
    static ref INPUT_STATE: Mutex<InputState> = Mutex::new(InputState::new());
}

/// Called from the event loop when a gamepad or key event is received
pub fn handle_button(key_code: i32, pressed: bool) {
    if let Ok(mut state) = INPUT_STATE.lock() {
        state.handle_button(key_code, pressed);
    }
}

/// Called from the event loop on a completed touch
pub fn handle_tap() {
    if let Ok(mut state) = INPUT_STATE.lock() {
        state.handle_tap();
    }
}

/// Get this frame's actions
pub fn poll_actions() -> InputActions {
    INPUT_STATE
        .lock()
        .map(|mut state| state.poll_actions())
        .unwrap_or_default()
}

// JNI Export: Cardboard-style trigger from Java (viewer button, controller emulation)
#[cfg(target_os = "android")]
#[no_mangle]
pub unsafe extern "C" fn Java_com_treasurehunt_MainActivity_onTrigger(
    _env: jni::JNIEnv,
    _class: jni::objects::JObject,
) {
    log::info!("JNI: trigger");
    handle_tap();
}

// JNI Export: gamepad button from Java
#[cfg(target_os = "android")]
#[no_mangle]
pub unsafe extern "C" fn Java_com_treasurehunt_MainActivity_onGamepadButton(
    _env: jni::JNIEnv,
    _class: jni::objects::JObject,
    button_code: jni::sys::jint,
    pressed: jni::sys::jboolean,
) {
    handle_button(button_code, pressed != 0);
}
