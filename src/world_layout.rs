//! Static mesh data for the cube and the floor

use glam::{Vec2, Vec3};

pub const CUBE_VERTEX_COUNT: usize = 36;
pub const FLOOR_VERTEX_COUNT: usize = 24;

const CUBE_FRONT_BACK_COLOR: [f32; 4] = [0.0, 0.5273, 0.2656, 1.0];
const CUBE_SIDE_COLOR: [f32; 4] = [0.0, 0.3398, 0.9023, 1.0];
const CUBE_TOP_BOTTOM_COLOR: [f32; 4] = [0.8359375, 0.17578125, 0.125, 1.0];
pub const CUBE_FOUND_COLOR: [f32; 4] = [1.0, 0.6523, 0.0, 1.0];
const FLOOR_COLOR: [f32; 4] = [0.0, 0.3398, 0.9023, 1.0];

const FLOOR_EXTENT: f32 = 200.0;

/// Corners of a unit quad, two counter-clockwise triangles
const QUAD_CORNERS: [(f32, f32); 6] = [
    (-1.0, 1.0),
    (-1.0, -1.0),
    (1.0, 1.0),
    (-1.0, -1.0),
    (1.0, -1.0),
    (1.0, 1.0),
];

/// Per face: outward normal and in-plane axes with `u x v == normal`
const CUBE_FACES: [(Vec3, Vec3, Vec3, [f32; 4]); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y, CUBE_FRONT_BACK_COLOR),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y, CUBE_SIDE_COLOR),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y, CUBE_FRONT_BACK_COLOR),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y, CUBE_SIDE_COLOR),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z, CUBE_TOP_BOTTOM_COLOR),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z, CUBE_TOP_BOTTOM_COLOR),
];

/// Per-attribute arrays, one entry per vertex
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Cube spanning [-1, 1] on every axis, in its normal colours
pub fn cube() -> MeshData {
    let mut mesh = MeshData::default();
    for (normal, u, v, color) in CUBE_FACES {
        for (a, b) in QUAD_CORNERS {
            mesh.positions.push((normal + u * a + v * b).to_array());
            mesh.normals.push(normal.to_array());
            mesh.colors.push(color);
        }
    }
    mesh
}

/// Colours for the cube while it is being looked at
pub fn cube_found_colors() -> Vec<[f32; 4]> {
    vec![CUBE_FOUND_COLOR; CUBE_VERTEX_COUNT]
}

/// Planar texture coordinates for the cube, projected per face.
pub fn cube_tex_coords(mesh: &MeshData) -> Vec<[f32; 2]> {
    mesh.positions
        .iter()
        .zip(&mesh.normals)
        .map(|(p, n)| {
            let coord = Vec3::from_array(*p);
            let normal = Vec3::from_array(*n);
            let tangent = if normal.z.abs() > 0.9 { Vec3::X } else { Vec3::Z };
            let binormal = normal.cross(tangent).normalize();
            let uv = Vec2::new(coord.dot(tangent), coord.dot(binormal)) * 0.5 + Vec2::splat(0.5);
            uv.to_array()
        })
        .collect()
}

/// Ground plane at y = 0, tiled 2x2
pub fn floor() -> MeshData {
    let mut mesh = MeshData::default();
    let half = FLOOR_EXTENT / 2.0;
    for tile_x in [-half, half] {
        for tile_z in [-half, half] {
            for (a, b) in QUAD_CORNERS {
                // u = +X, v = -Z keeps the winding facing up
                mesh.positions.push([tile_x + a * half, 0.0, tile_z - b * half]);
                mesh.normals.push(Vec3::Y.to_array());
                mesh.colors.push(FLOOR_COLOR);
            }
        }
    }
    mesh
}
