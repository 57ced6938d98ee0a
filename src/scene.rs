//! Treasure hunt scene: per-frame transforms, gaze test and cube relocation
//!
//! The scene takes the head transform once per frame and an [`Eye`] per
//! eye draw, and answers with [`DrawCommand`]s. It never touches the GPU;
//! the renderer consumes the commands. Audio and haptics are reached
//! through their capability traits.

use glam::{Mat4, Vec3};
use log::{debug, info};
use rand::Rng;

use crate::audio::{SourceId, SpatialAudio};
use crate::config::HuntConfig;
use crate::haptics::Haptics;
use crate::stereo::{Eye, HeadTransform};

/// GPU-side mesh a draw refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Cube,
    /// Same geometry as `Cube`, gold colours
    CubeFound,
    /// Loaded model, drawn instead of the gold cube when available
    FoundModel,
    Floor,
    Skybox,
}

/// Observable state of the cube, recomputed every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeMode {
    Normal,
    Found,
}

/// Uniforms shared by every program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshUniforms {
    /// Eye space
    pub light_pos: Vec3,
    pub model: Mat4,
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub mesh: MeshKind,
    pub uniforms: MeshUniforms,
}

/// Everything needed to render one eye
#[derive(Debug, Clone)]
pub struct EyeFrame {
    pub eye: Eye,
    pub view: Mat4,
    pub projection: Mat4,
    pub light_pos_eye: Vec3,
    pub draws: Vec<DrawCommand>,
}

pub struct TreasureHunt {
    config: HuntConfig,
    rotation_axis: Vec3,
    rotation_step: f32,

    cube_transform: Mat4,
    /// Cube transform with the found model's scale, refreshed every frame
    obj_transform: Mat4,
    found_model_available: bool,
    floor_transform: Mat4,
    skybox_transform: Mat4,

    camera: Mat4,
    head_view: Mat4,

    model_position: Vec3,
    object_distance: f32,

    audio: Box<dyn SpatialAudio>,
    haptics: Box<dyn Haptics>,
    object_source: SourceId,
}

impl TreasureHunt {
    pub fn new(
        config: HuntConfig,
        audio: Box<dyn SpatialAudio>,
        haptics: Box<dyn Haptics>,
    ) -> Self {
        let object_distance = config.max_model_distance / 2.0;
        // Cube first appears directly in front of the user
        let model_position = Vec3::new(0.0, 0.0, -object_distance);

        let mut scene = Self {
            rotation_axis: config.rotation_axis.normalize(),
            rotation_step: config.rotation_step_deg.to_radians(),
            cube_transform: Mat4::IDENTITY,
            obj_transform: Mat4::IDENTITY,
            found_model_available: false,
            floor_transform: Mat4::from_translation(Vec3::new(0.0, -config.floor_depth, 0.0)),
            skybox_transform: Mat4::from_scale(Vec3::splat(config.skybox_scale)),
            camera: Mat4::IDENTITY,
            head_view: Mat4::IDENTITY,
            model_position,
            object_distance,
            audio,
            haptics,
            object_source: SourceId::INVALID,
            config,
        };
        scene.camera = scene.look_at_origin();
        scene.update_model_position();
        scene.update_obj_transform();
        scene
    }

    /// Whether the renderer holds a found model to draw.
    pub fn set_found_model_available(&mut self, available: bool) {
        self.found_model_available = available;
    }

    /// Starts the looping cube sound at the cube and preloads the success sound.
    pub fn start_audio(&mut self) {
        let object_file = self.config.object_sound_file.clone();
        self.audio.preload_sound_file(&object_file);
        self.object_source = self.audio.create_sound_object(&object_file);
        self.audio
            .set_sound_object_position(self.object_source, self.model_position);
        self.audio.play_sound(self.object_source, true);

        let success_file = self.config.success_sound_file.clone();
        self.audio.preload_sound_file(&success_file);
        info!("Audio started, object source {:?}", self.object_source);
    }

    pub fn pause_audio(&mut self) {
        self.audio.pause();
    }

    pub fn resume_audio(&mut self) {
        self.audio.resume();
    }

    /// Per-frame update, before any eye is drawn.
    pub fn new_frame(&mut self, head: &HeadTransform) {
        // Constant step per frame, so the spin speed follows the frame rate
        self.cube_transform *= Mat4::from_axis_angle(self.rotation_axis, self.rotation_step);
        self.update_obj_transform();

        self.camera = self.look_at_origin();
        self.head_view = head.head_view();

        self.audio.set_head_rotation(head.rotation());
        self.audio.update();
    }

    /// Transforms and draw list for one eye.
    pub fn draw_eye(&self, eye: &Eye) -> EyeFrame {
        let view = eye.view * self.camera;
        let light_pos_eye = view.transform_point3(self.config.light_pos_world);
        let projection = eye.perspective(self.config.z_near, self.config.z_far);

        let (cube_mesh, cube_model) = match self.cube_mode() {
            CubeMode::Found if self.found_model_available => {
                (MeshKind::FoundModel, self.obj_transform)
            }
            CubeMode::Found => (MeshKind::CubeFound, self.cube_transform),
            CubeMode::Normal => (MeshKind::Cube, self.cube_transform),
        };

        let draw = |mesh: MeshKind, model: Mat4| {
            let model_view = view * model;
            DrawCommand {
                mesh,
                uniforms: MeshUniforms {
                    light_pos: light_pos_eye,
                    model,
                    model_view,
                    model_view_projection: projection * model_view,
                },
            }
        };

        EyeFrame {
            eye: *eye,
            view,
            projection,
            light_pos_eye,
            draws: vec![
                draw(cube_mesh, cube_model),
                draw(MeshKind::Floor, self.floor_transform),
                draw(MeshKind::Skybox, self.skybox_transform),
            ],
        }
    }

    /// Whether the object's origin lies inside the gaze cone of the current head view.
    pub fn is_looking_at_object(&self, object_transform: &Mat4) -> bool {
        let position = (self.head_view * *object_transform).transform_point3(Vec3::ZERO);

        let pitch = position.y.atan2(-position.z);
        let yaw = position.x.atan2(-position.z);

        pitch.abs() < self.config.pitch_limit && yaw.abs() < self.config.yaw_limit
    }

    pub fn cube_mode(&self) -> CubeMode {
        if self.is_looking_at_object(&self.cube_transform) {
            CubeMode::Found
        } else {
            CubeMode::Normal
        }
    }

    /// Trigger pulled. Returns the mode the cube was in.
    pub fn on_trigger<R: Rng + ?Sized>(&mut self, rng: &mut R) -> CubeMode {
        let mode = self.cube_mode();
        debug!("Trigger, cube {:?}", mode);

        if mode == CubeMode::Found {
            let success = self
                .audio
                .create_stereo_sound(&self.config.success_sound_file);
            self.audio.play_sound(success, false);
            self.hide_object(rng);
        }

        // Always give user feedback
        self.haptics.vibrate(self.config.vibration);
        mode
    }

    /// Moves the cube to a random spot out of sight.
    ///
    /// Rotated 90-270 degrees around Y and rescaled to a new horizontal
    /// distance, then lifted or lowered by a random pitch of up to 40
    /// degrees. The elevation scales with distance, so positions are not
    /// uniform over the shell.
    pub fn hide_object<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let angle_xz = rng.gen_range(90.0f32..270.0).to_radians();

        let old_distance = self.object_distance;
        self.object_distance =
            rng.gen_range(self.config.min_model_distance..self.config.max_model_distance);
        let scale = self.object_distance / old_distance;

        let rotation = Mat4::from_rotation_y(angle_xz) * Mat4::from_scale(Vec3::splat(scale));
        let position = rotation.transform_point3(self.cube_transform.w_axis.truncate());

        let angle_y = rng.gen_range(-40.0f32..40.0).to_radians();
        let new_y = angle_y.tan() * self.object_distance;

        self.model_position = Vec3::new(position.x, new_y, position.z);
        debug!(
            "Cube moved to {:?}, distance {}",
            self.model_position, self.object_distance
        );
        self.update_model_position();
    }

    pub fn cube_transform(&self) -> Mat4 {
        self.cube_transform
    }

    pub fn obj_transform(&self) -> Mat4 {
        self.obj_transform
    }

    pub fn model_position(&self) -> Vec3 {
        self.model_position
    }

    pub fn object_distance(&self) -> f32 {
        self.object_distance
    }

    pub fn camera(&self) -> Mat4 {
        self.camera
    }

    fn update_obj_transform(&mut self) {
        self.obj_transform =
            self.cube_transform * Mat4::from_scale(Vec3::splat(self.config.found_model_scale));
    }

    fn look_at_origin(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, self.config.camera_z), Vec3::ZERO, Vec3::Y)
    }

    /// Resets the cube to a pure translation and moves its sound along.
    fn update_model_position(&mut self) {
        self.cube_transform = Mat4::from_translation(self.model_position);
        if self.object_source.is_valid() {
            self.audio
                .set_sound_object_position(self.object_source, self.model_position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{AudioCall, RecordingAudio};
    use crate::audio::NullAudio;
    use crate::haptics::testing::RecordingHaptics;
    use crate::haptics::NullHaptics;
    use crate::stereo::StereoRig;
    use glam::Quat;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f32::consts::{FRAC_PI_2, TAU};
    use std::time::Duration;

    fn scene() -> TreasureHunt {
        TreasureHunt::new(HuntConfig::default(), Box::new(NullAudio), Box::new(NullHaptics))
    }

    fn recording_scene() -> (TreasureHunt, RecordingAudio, RecordingHaptics) {
        let audio = RecordingAudio::default();
        let haptics = RecordingHaptics::default();
        let scene = TreasureHunt::new(
            HuntConfig::default(),
            Box::new(audio.clone()),
            Box::new(haptics.clone()),
        );
        (scene, audio, haptics)
    }

    fn azimuth(p: Vec3) -> f32 {
        p.x.atan2(p.z)
    }

    #[test]
    fn test_looking_straight_ahead() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let ahead = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        assert!(scene.is_looking_at_object(&ahead));
    }

    #[test]
    fn test_not_looking_45_degrees_off_axis() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let off_axis = Mat4::from_translation(Vec3::new(5.0, 0.0, -5.0));
        assert!(!scene.is_looking_at_object(&off_axis));
    }

    #[test]
    fn test_gaze_matches_angular_cone_for_axis_aligned_transforms() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);

        let offsets = [-2.0f32, -0.7, -0.55, -0.3, 0.0, 0.3, 0.55, 0.7, 2.0];
        for &z in &[-5.0f32, -2.0, 3.0] {
            for &x in &offsets {
                for &y in &offsets {
                    let m = Mat4::from_translation(Vec3::new(x, y, z));
                    let expected =
                        x.atan2(-z).abs() < 0.12 && y.atan2(-z).abs() < 0.12;
                    assert_eq!(scene.is_looking_at_object(&m), expected, "at ({x}, {y}, {z})");
                }
            }
        }
    }

    #[test]
    fn test_object_behind_is_never_looked_at() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let behind = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        assert!(!scene.is_looking_at_object(&behind));
    }

    #[test]
    fn test_gaze_ignores_object_rotation_and_distance() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let near = Mat4::from_translation(Vec3::new(0.1, 0.0, -1.0))
            * Mat4::from_rotation_x(1.0);
        let far = Mat4::from_translation(Vec3::new(5.0, 0.0, -50.0));
        assert!(scene.is_looking_at_object(&near));
        assert!(scene.is_looking_at_object(&far));
    }

    #[test]
    fn test_gaze_is_idempotent_within_frame() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::from_orientation(Quat::from_rotation_y(0.05)));
        let m = Mat4::from_translation(Vec3::new(0.2, 0.1, -4.0));
        let first = scene.is_looking_at_object(&m);
        assert_eq!(scene.is_looking_at_object(&m), first);
        assert_eq!(scene.cube_mode(), scene.cube_mode());
    }

    #[test]
    fn test_gaze_follows_head_rotation() {
        let mut scene = scene();
        // Head turned 90 degrees to the left looks down -X
        scene.new_frame(&HeadTransform::from_orientation(Quat::from_rotation_y(FRAC_PI_2)));
        let left = Mat4::from_translation(Vec3::new(-5.0, 0.0, 0.0));
        let ahead = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        assert!(scene.is_looking_at_object(&left));
        assert!(!scene.is_looking_at_object(&ahead));
    }

    #[test]
    fn test_rotation_steps_compose() {
        let mut scene = scene();
        let start = scene.cube_transform();
        let frames = 120;
        for _ in 0..frames {
            scene.new_frame(&HeadTransform::IDENTITY);
        }
        let axis = Vec3::new(0.5, 0.5, 1.0).normalize();
        let expected = start * Mat4::from_axis_angle(axis, (frames as f32 * 0.3).to_radians());
        assert!(scene.cube_transform().abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_rotation_keeps_translation() {
        let mut scene = scene();
        for _ in 0..10 {
            scene.new_frame(&HeadTransform::IDENTITY);
        }
        let translation = scene.cube_transform().w_axis.truncate();
        assert!(translation.abs_diff_eq(Vec3::new(0.0, 0.0, -3.5), 1e-6));
    }

    #[test]
    fn test_initial_cube_is_found() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        assert_eq!(scene.cube_mode(), CubeMode::Found);
        assert_eq!(scene.object_distance(), 3.5);
    }

    #[test]
    fn test_hide_object_distance_and_azimuth() {
        let mut scene = scene();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1000 {
            let before = scene.model_position();
            scene.hide_object(&mut rng);
            let after = scene.model_position();

            let distance = scene.object_distance();
            assert!((3.0..7.0).contains(&distance), "distance {distance}");
            let horizontal = Vec3::new(after.x, 0.0, after.z).length();
            assert!((horizontal - distance).abs() < 1e-3);

            let delta = (azimuth(after) - azimuth(before)).rem_euclid(TAU).to_degrees();
            assert!(delta >= 90.0 - 1e-2 && delta < 270.0 + 1e-2, "azimuth delta {delta}");
        }
    }

    #[test]
    fn test_hide_object_elevation_within_pitch_cone() {
        let mut scene = scene();
        let mut rng = StdRng::seed_from_u64(3);
        let limit = 40f32.to_radians().tan();

        for _ in 0..500 {
            scene.hide_object(&mut rng);
            let p = scene.model_position();
            assert!(p.y.abs() <= limit * scene.object_distance() + 1e-4);
        }
    }

    #[test]
    fn test_hide_object_resets_to_translation() {
        let mut scene = scene();
        let mut rng = StdRng::seed_from_u64(9);
        scene.new_frame(&HeadTransform::IDENTITY);
        scene.hide_object(&mut rng);
        let expected = Mat4::from_translation(scene.model_position());
        assert_eq!(scene.cube_transform(), expected);
    }

    #[test]
    fn test_hidden_object_leaves_gaze_cone() {
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 1000;
        let mut still_seen = 0;

        for _ in 0..trials {
            let mut scene = scene();
            scene.new_frame(&HeadTransform::IDENTITY);
            assert_eq!(scene.cube_mode(), CubeMode::Found);
            scene.hide_object(&mut rng);
            if scene.cube_mode() == CubeMode::Found {
                still_seen += 1;
            }
        }
        assert!(still_seen * 1000 <= trials, "{still_seen} of {trials} still in view");
    }

    #[test]
    fn test_draw_eye_composes_matrices() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let rig = StereoRig::new(0.063, 90.0, 0.0);
        let [left, _] = rig.eyes(&HeadTransform::IDENTITY, 1920, 1080);

        let frame = scene.draw_eye(&left);
        assert!(frame.view.abs_diff_eq(left.view * scene.camera(), 1e-6));
        assert!(frame.projection.abs_diff_eq(left.perspective(0.1, 100.0), 1e-6));

        let kinds: Vec<_> = frame.draws.iter().map(|d| d.mesh).collect();
        assert_eq!(kinds, vec![MeshKind::CubeFound, MeshKind::Floor, MeshKind::Skybox]);

        for draw in &frame.draws {
            let u = &draw.uniforms;
            assert!(u.model_view.abs_diff_eq(frame.view * u.model, 1e-5));
            assert!(u.model_view_projection.abs_diff_eq(frame.projection * u.model_view, 1e-4));
            assert_eq!(u.light_pos, frame.light_pos_eye);
        }

        let floor = &frame.draws[1].uniforms;
        assert_eq!(floor.model, Mat4::from_translation(Vec3::new(0.0, -20.0, 0.0)));
    }

    #[test]
    fn test_obj_transform_follows_cube_each_frame() {
        let mut scene = scene();
        for _ in 0..5 {
            scene.new_frame(&HeadTransform::IDENTITY);
        }
        let expected = scene.cube_transform() * Mat4::from_scale(Vec3::splat(0.005));
        assert!(scene.obj_transform().abs_diff_eq(expected, 1e-6));
        // Scale is applied in object space, so the position is the cube's
        assert!(scene
            .obj_transform()
            .w_axis
            .abs_diff_eq(scene.cube_transform().w_axis, 1e-6));
    }

    #[test]
    fn test_draw_eye_found_model_replaces_gold_cube() {
        let mut scene = scene();
        scene.set_found_model_available(true);
        scene.new_frame(&HeadTransform::IDENTITY);
        let eye = StereoRig::new(0.063, 90.0, 0.0).monocular(&HeadTransform::IDENTITY, 800, 600);

        let frame = scene.draw_eye(&eye);
        assert_eq!(frame.draws[0].mesh, MeshKind::FoundModel);
        assert_eq!(frame.draws[0].uniforms.model, scene.obj_transform());
        // The gaze test still uses the cube itself
        assert_eq!(scene.cube_mode(), CubeMode::Found);
    }

    #[test]
    fn test_draw_eye_looking_away_ignores_found_model() {
        let mut scene = scene();
        scene.set_found_model_available(true);
        let away = HeadTransform::from_orientation(Quat::from_rotation_y(1.0));
        scene.new_frame(&away);
        let eye = StereoRig::new(0.063, 90.0, 0.0).monocular(&away, 800, 600);

        let frame = scene.draw_eye(&eye);
        assert_eq!(frame.draws[0].mesh, MeshKind::Cube);
        assert_eq!(frame.draws[0].uniforms.model, scene.cube_transform());
    }

    #[test]
    fn test_light_position_in_eye_space() {
        let mut scene = scene();
        scene.new_frame(&HeadTransform::IDENTITY);
        let rig = StereoRig::new(0.0, 90.0, 0.0);
        let eye = rig.monocular(&HeadTransform::IDENTITY, 800, 600);

        let frame = scene.draw_eye(&eye);
        // Camera sits at z = 0.01 looking at the origin
        assert!(frame.light_pos_eye.abs_diff_eq(Vec3::new(0.0, 2.0, -0.01), 1e-6));
    }

    #[test]
    fn test_draw_eye_normal_cube_when_looking_away() {
        let mut scene = scene();
        let away = HeadTransform::from_orientation(Quat::from_rotation_y(1.0));
        scene.new_frame(&away);
        let eye = StereoRig::new(0.063, 90.0, 0.0).monocular(&away, 800, 600);
        let frame = scene.draw_eye(&eye);
        assert_eq!(frame.draws[0].mesh, MeshKind::Cube);
    }

    #[test]
    fn test_start_audio_places_looping_source() {
        let (mut scene, audio, _) = recording_scene();
        scene.start_audio();

        let calls = audio.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                AudioCall::Preload("cube_sound.wav".to_string()),
                AudioCall::CreateObject("cube_sound.wav".to_string()),
                AudioCall::SetPosition(SourceId(1), Vec3::new(0.0, 0.0, -3.5)),
                AudioCall::Play(SourceId(1), true),
                AudioCall::Preload("success.wav".to_string()),
            ]
        );
    }

    #[test]
    fn test_new_frame_updates_listener() {
        let (mut scene, audio, _) = recording_scene();
        let rotation = Quat::from_rotation_y(0.4);
        scene.new_frame(&HeadTransform::from_orientation(rotation));

        let calls = audio.calls.borrow();
        assert_eq!(calls.len(), 2);
        match calls[0] {
            AudioCall::HeadRotation(q) => assert!(q.abs_diff_eq(rotation, 1e-6)),
            ref other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(calls[1], AudioCall::Update);
    }

    #[test]
    fn test_trigger_on_found_cube() {
        let (mut scene, audio, haptics) = recording_scene();
        let mut rng = StdRng::seed_from_u64(11);
        scene.start_audio();
        scene.new_frame(&HeadTransform::IDENTITY);
        audio.calls.borrow_mut().clear();

        let before = scene.model_position();
        assert_eq!(scene.on_trigger(&mut rng), CubeMode::Found);
        assert_ne!(scene.model_position(), before);
        assert_eq!(scene.cube_mode(), CubeMode::Normal);

        let calls = audio.calls.borrow();
        assert_eq!(calls[0], AudioCall::CreateStereo("success.wav".to_string()));
        assert_eq!(calls[1], AudioCall::Play(SourceId(2), false));
        assert_eq!(calls[2], AudioCall::SetPosition(SourceId(1), scene.model_position()));
        assert_eq!(*haptics.pulses.borrow(), vec![Duration::from_millis(50)]);
    }

    #[test]
    fn test_trigger_on_normal_cube_only_vibrates() {
        let (mut scene, audio, haptics) = recording_scene();
        let mut rng = StdRng::seed_from_u64(5);
        scene.new_frame(&HeadTransform::from_orientation(Quat::from_rotation_y(2.0)));
        audio.calls.borrow_mut().clear();

        let before = scene.model_position();
        assert_eq!(scene.on_trigger(&mut rng), CubeMode::Normal);
        assert_eq!(scene.model_position(), before);
        assert!(audio.calls.borrow().is_empty());
        assert_eq!(*haptics.pulses.borrow(), vec![Duration::from_millis(50)]);
    }
}
