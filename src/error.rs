//! Error types
//!
//! Every variant is fatal for the rendering session: nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// GL-compatible codes reported with GPU faults.
pub mod codes {
    pub const INVALID_OPERATION: u32 = 0x0502;
    pub const OUT_OF_MEMORY: u32 = 0x0505;
    pub const INTERNAL: u32 = 0x0500;
}

#[derive(Debug, Error)]
pub enum VrError {
    /// Reported by an error scope after a designated GPU call.
    #[error("{label}: gpu error {code:#06x}: {message}")]
    Gpu {
        label: String,
        code: u32,
        message: String,
    },

    #[error("can't read shader source {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't load model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("no suitable GPU adapter")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
}

impl VrError {
    /// Maps a wgpu error popped from an error scope to a labelled fault.
    pub fn from_gpu(label: &str, err: wgpu::Error) -> Self {
        let code = match &err {
            wgpu::Error::OutOfMemory { .. } => codes::OUT_OF_MEMORY,
            wgpu::Error::Validation { .. } => codes::INVALID_OPERATION,
            _ => codes::INTERNAL,
        };
        VrError::Gpu {
            label: label.to_string(),
            code,
            message: err.to_string(),
        }
    }

    /// Frame acquisition failure. Only running out of memory is fatal; the
    /// rest are cured by reconfiguring the surface.
    pub fn from_surface(label: &str, err: &wgpu::SurfaceError) -> Option<Self> {
        match err {
            wgpu::SurfaceError::OutOfMemory => Some(VrError::Gpu {
                label: label.to_string(),
                code: codes::OUT_OF_MEMORY,
                message: err.to_string(),
            }),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_error_message_carries_label_and_code() {
        let err = VrError::Gpu {
            label: "drawing floor".to_string(),
            code: codes::INVALID_OPERATION,
            message: "bad binding".to_string(),
        };
        assert_eq!(err.to_string(), "drawing floor: gpu error 0x0502: bad binding");
    }

    fn gpu_code(err: VrError) -> (String, u32) {
        match err {
            VrError::Gpu { label, code, .. } => (label, code),
            other => panic!("expected Gpu, got {other:?}"),
        }
    }

    #[test]
    fn test_from_gpu_validation_code() {
        let err = wgpu::Error::Validation {
            source: Box::new(std::io::Error::other("bad binding")),
            description: "bad binding".to_string(),
        };
        let (label, code) = gpu_code(VrError::from_gpu("mesh programs", err));
        assert_eq!(label, "mesh programs");
        assert_eq!(code, codes::INVALID_OPERATION);
    }

    #[test]
    fn test_from_gpu_out_of_memory_code() {
        let err = wgpu::Error::OutOfMemory {
            source: Box::new(std::io::Error::other("oom")),
        };
        let (label, code) = gpu_code(VrError::from_gpu("skybox texture", err));
        assert_eq!(label, "skybox texture");
        assert_eq!(code, codes::OUT_OF_MEMORY);
    }

    #[test]
    fn test_surface_out_of_memory_is_fatal() {
        let err = VrError::from_surface("acquiring frame", &wgpu::SurfaceError::OutOfMemory);
        let (label, code) = gpu_code(err.expect("fatal"));
        assert_eq!(label, "acquiring frame");
        assert_eq!(code, codes::OUT_OF_MEMORY);

        assert!(VrError::from_surface("acquiring frame", &wgpu::SurfaceError::Lost).is_none());
        assert!(VrError::from_surface("acquiring frame", &wgpu::SurfaceError::Outdated).is_none());
        assert!(VrError::from_surface("acquiring frame", &wgpu::SurfaceError::Timeout).is_none());
    }

    #[test]
    fn test_shader_load_error_names_path() {
        let err = VrError::ShaderLoad {
            path: PathBuf::from("shaders/grid.wgsl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let msg = err.to_string();
        assert!(msg.contains("shaders/grid.wgsl"));
        assert!(msg.contains("missing"));
    }
}
