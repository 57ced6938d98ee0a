//! Shader sources
//!
//! Embedded by default. A shader directory can replace them at start-up;
//! a file that can't be read there is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, VrError};

pub const LIGHT_SHADER_FILE: &str = "light.wgsl";
pub const SKYBOX_SHADER_FILE: &str = "skybox.wgsl";

#[derive(Debug, Clone)]
pub struct ShaderSet {
    /// Cube and floor programs
    pub light: String,
    pub skybox: String,
}

impl ShaderSet {
    pub fn embedded() -> Self {
        Self {
            light: include_str!("shaders/light.wgsl").to_string(),
            skybox: include_str!("shaders/skybox.wgsl").to_string(),
        }
    }

    pub fn load_dir(dir: &Path) -> Result<Self> {
        info!("Loading shaders from {}", dir.display());
        Ok(Self {
            light: read_text_file(dir.join(LIGHT_SHADER_FILE))?,
            skybox: read_text_file(dir.join(SKYBOX_SHADER_FILE))?,
        })
    }

    pub fn load(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::load_dir(dir),
            None => Ok(Self::embedded()),
        }
    }
}

fn read_text_file(path: PathBuf) -> Result<String> {
    fs::read_to_string(&path).map_err(|source| VrError::ShaderLoad { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_entry_points() {
        let shaders = ShaderSet::embedded();
        assert!(shaders.light.contains("fn vs_main"));
        assert!(shaders.light.contains("fn fs_passthrough"));
        assert!(shaders.light.contains("fn fs_grid"));
        assert!(shaders.skybox.contains("fn fs_main"));
    }

    #[test]
    fn test_load_dir_reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LIGHT_SHADER_FILE), "// light").unwrap();
        fs::write(dir.path().join(SKYBOX_SHADER_FILE), "// sky").unwrap();

        let shaders = ShaderSet::load(Some(dir.path())).unwrap();
        assert_eq!(shaders.light, "// light");
        assert_eq!(shaders.skybox, "// sky");
    }

    #[test]
    fn test_missing_shader_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LIGHT_SHADER_FILE), "// light").unwrap();

        match ShaderSet::load_dir(dir.path()) {
            Err(VrError::ShaderLoad { path, .. }) => {
                assert!(path.ends_with(SKYBOX_SHADER_FILE));
            }
            other => panic!("expected ShaderLoad, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_no_dir_uses_embedded() {
        let shaders = ShaderSet::load(None).unwrap();
        assert_eq!(shaders.light, ShaderSet::embedded().light);
    }
}
