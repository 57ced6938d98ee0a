//! Model shown in place of the cube while it is being looked at
//!
//! Loaded from an OBJ file, triangulated and single-indexed, and tinted
//! with the cube's found colour. Missing normals are rebuilt from faces.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::Vec3;
use log::info;

use crate::error::{Result, VrError};
use crate::world_layout::{MeshData, CUBE_FOUND_COLOR};

/// Vertex attributes plus a triangle list into them
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    pub mesh: MeshData,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub fn load_file(path: &Path) -> Result<IndexedMesh> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|_| VrError::ModelLoad {
        name: name.clone(),
        source: tobj::LoadError::OpenFileFailed,
    })?;
    load_reader(&name, &mut BufReader::new(file))
}

/// Parses OBJ text. Materials are ignored; the model is drawn in one colour.
pub fn load_reader<R: BufRead>(name: &str, reader: &mut R) -> Result<IndexedMesh> {
    let (models, _) = tobj::load_obj_buf(reader, &tobj::GPU_LOAD_OPTIONS, |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|source| VrError::ModelLoad {
        name: name.to_string(),
        source,
    })?;

    let mut out = IndexedMesh::default();
    for model in models {
        let mesh = model.mesh;
        let base = out.mesh.vertex_count() as u32;
        let count = mesh.positions.len() / 3;

        out.mesh
            .positions
            .extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
        if mesh.normals.len() == mesh.positions.len() {
            out.mesh
                .normals
                .extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
        } else {
            let positions = &out.mesh.positions[base as usize..];
            out.mesh.normals.extend(face_normals(positions, &mesh.indices));
        }
        out.mesh.colors.extend(std::iter::repeat(CUBE_FOUND_COLOR).take(count));
        out.indices.extend(mesh.indices.iter().map(|i| i + base));
    }

    info!(
        "Loaded model {}: {} vertices, {} triangles",
        name,
        out.mesh.vertex_count(),
        out.indices.len() / 3
    );
    Ok(out)
}

/// Area-weighted vertex normals from the triangle list
fn face_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
        let p = |i: usize| Vec3::from_array(positions[i]);
        let n = (p(b) - p(a)).cross(p(c) - p(a));
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| n.normalize_or(Vec3::Y).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
o quad
v -1.0 0.0 1.0
v 1.0 0.0 1.0
v 1.0 0.0 -1.0
v -1.0 0.0 -1.0
f 1 2 3 4
";

    #[test]
    fn test_quad_is_triangulated() {
        let model = load_reader("quad", &mut Cursor::new(QUAD)).unwrap();
        assert_eq!(model.mesh.vertex_count(), 4);
        assert_eq!(model.indices.len(), 6);
        assert!(model.indices.iter().all(|&i| i < 4));
        assert_eq!(model.mesh.colors, vec![CUBE_FOUND_COLOR; 4]);
    }

    #[test]
    fn test_missing_normals_are_rebuilt() {
        let model = load_reader("quad", &mut Cursor::new(QUAD)).unwrap();
        // Counter-clockwise seen from above
        for n in &model.mesh.normals {
            assert!(Vec3::from_array(*n).abs_diff_eq(Vec3::Y, 1e-5));
        }
    }

    #[test]
    fn test_objects_are_merged() {
        let two = format!("{QUAD}{}", QUAD.replace("o quad", "o other").replace("f 1 2 3 4", "f 5 6 7 8"));
        let model = load_reader("two", &mut Cursor::new(two)).unwrap();
        assert_eq!(model.indices.len(), 12);
        assert!(model.indices.iter().all(|&i| (i as usize) < model.mesh.vertex_count()));
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helicopter.obj");
        std::fs::write(&path, QUAD).unwrap();
        assert!(!load_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        match load_file(&dir.path().join("nope.obj")) {
            Err(VrError::ModelLoad { name, .. }) => assert!(name.ends_with("nope.obj")),
            other => panic!("expected ModelLoad, got {:?}", other.map(|_| ())),
        }
    }
}
