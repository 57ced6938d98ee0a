//! Head pose and per-eye transforms
//!
//! Stands in for the HMD runtime: the head transform comes from the
//! sensors once per frame, and the rig derives one [`Eye`] per half of
//! the surface from it.

use glam::{Mat4, Quat, Vec3, Vec4};

/// Head orientation for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTransform {
    /// World to head space
    head_view: Mat4,
    rotation: Quat,
}

impl HeadTransform {
    pub const IDENTITY: Self = Self {
        head_view: Mat4::IDENTITY,
        rotation: Quat::IDENTITY,
    };

    /// From the head orientation in world space
    pub fn from_orientation(orientation: Quat) -> Self {
        let rotation = orientation.normalize();
        Self {
            head_view: Mat4::from_quat(rotation.conjugate()),
            rotation,
        }
    }

    /// From a world-to-head matrix
    pub fn from_head_view(head_view: Mat4) -> Self {
        let (_, view_rotation, _) = head_view.to_scale_rotation_translation();
        Self {
            head_view,
            rotation: view_rotation.conjugate(),
        }
    }

    /// From 16 column-major floats, as handed over by a host runtime
    pub fn from_cols_array(m: &[f32; 16]) -> Self {
        Self::from_head_view(Mat4::from_cols_array(m))
    }

    pub fn head_view(&self) -> Mat4 {
        self.head_view
    }

    /// Head rotation, for the audio listener
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Direction the head looks at, in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

impl Default for HeadTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeKind {
    Left,
    Right,
    Monocular,
}

/// Pixel rectangle an eye renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// One eye of the current frame. Valid for a single draw only.
#[derive(Debug, Clone, Copy)]
pub struct Eye {
    pub kind: EyeKind,
    /// World to eye space, head rotation included
    pub view: Mat4,
    pub viewport: Viewport,
    pub fov_y: f32,
    /// Lens centre shift, signed per eye
    pub lens_offset: f32,
}

impl Eye {
    /// Asymmetric frustum: the lens offset slides the near plane window sideways.
    pub fn perspective(&self, near: f32, far: f32) -> Mat4 {
        let top = near * (self.fov_y / 2.0).tan();
        let bottom = -top;

        let half_width = top * self.viewport.aspect();
        let shift_near = self.lens_offset * half_width * 2.0;

        let left = -half_width - shift_near;
        let right = half_width - shift_near;

        let x_scale = 2.0 * near / (right - left);
        let y_scale = 2.0 * near / (top - bottom);
        let x_offset = (right + left) / (right - left);
        let y_offset = (top + bottom) / (top - bottom);
        let z_scale = far / (near - far);
        let z_offset = near * far / (near - far);

        Mat4::from_cols(
            Vec4::new(x_scale, 0.0, 0.0, 0.0),
            Vec4::new(0.0, y_scale, 0.0, 0.0),
            Vec4::new(x_offset, y_offset, z_scale, -1.0),
            Vec4::new(0.0, 0.0, z_offset, 0.0),
        )
    }
}

/// Side-by-side stereo on a single surface
#[derive(Debug, Clone, Copy)]
pub struct StereoRig {
    pub ipd: f32,
    pub fov_y: f32,
    pub lens_center_offset: f32,
}

impl StereoRig {
    pub fn new(ipd: f32, fov_y_deg: f32, lens_center_offset: f32) -> Self {
        Self {
            ipd,
            fov_y: fov_y_deg.to_radians(),
            lens_center_offset,
        }
    }

    /// Left eye on the left half, right eye on the right half.
    pub fn eyes(&self, head: &HeadTransform, width: u32, height: u32) -> [Eye; 2] {
        let half = width / 2;
        [
            self.eye(EyeKind::Left, head, Viewport { x: 0, y: 0, width: half, height }),
            self.eye(EyeKind::Right, head, Viewport { x: half, y: 0, width: half, height }),
        ]
    }

    /// Whole surface, no eye separation.
    pub fn monocular(&self, head: &HeadTransform, width: u32, height: u32) -> Eye {
        self.eye(EyeKind::Monocular, head, Viewport { x: 0, y: 0, width, height })
    }

    fn eye(&self, kind: EyeKind, head: &HeadTransform, viewport: Viewport) -> Eye {
        let (eye_x, lens_offset) = match kind {
            EyeKind::Left => (-self.ipd / 2.0, self.lens_center_offset),
            EyeKind::Right => (self.ipd / 2.0, -self.lens_center_offset),
            EyeKind::Monocular => (0.0, 0.0),
        };
        Eye {
            kind,
            view: Mat4::from_translation(Vec3::new(-eye_x, 0.0, 0.0)) * head.head_view(),
            viewport,
            fov_y: self.fov_y,
            lens_offset,
        }
    }
}
