use glam::Vec3;
use shared::{Color, PartSpec, MODEL_NAME, PARTS};

use crate::scene::{Material, MeshData, Model, Node, Transform};

/// Axis-aligned box centered on the origin, flat-shaded (4 vertices per face)
pub fn cuboid(w: f32, h: f32, d: f32) -> MeshData {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let hd = d * 0.5;

    let faces: [([Vec3; 4], Vec3); 6] = [
        // Front (+Z)
        ([Vec3::new(-hw, -hh, hd), Vec3::new(hw, -hh, hd), Vec3::new(hw, hh, hd), Vec3::new(-hw, hh, hd)], Vec3::Z),
        // Back (-Z)
        ([Vec3::new(hw, -hh, -hd), Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, hh, -hd), Vec3::new(hw, hh, -hd)], Vec3::NEG_Z),
        // Right (+X)
        ([Vec3::new(hw, -hh, hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, hh, -hd), Vec3::new(hw, hh, hd)], Vec3::X),
        // Left (-X)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, -hh, hd), Vec3::new(-hw, hh, hd), Vec3::new(-hw, hh, -hd)], Vec3::NEG_X),
        // Top (+Y)
        ([Vec3::new(-hw, hh, hd), Vec3::new(hw, hh, hd), Vec3::new(hw, hh, -hd), Vec3::new(-hw, hh, -hd)], Vec3::Y),
        // Bottom (-Y)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, -hh, hd), Vec3::new(-hw, -hh, hd)], Vec3::NEG_Y),
    ];

    let mut mesh = MeshData {
        positions: Vec::with_capacity(24),
        normals: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };

    for (quad, normal) in &faces {
        let base = mesh.positions.len() as u32;
        for v in quad {
            mesh.positions.push(v.to_array());
            mesh.normals.push(normal.to_array());
        }
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

fn material(color: Color) -> Material {
    Material {
        name: format!("flat_{:06x}", color.0),
        color,
    }
}

/// Leaf node for one part: box of the part's size at its fixed offset
pub fn part_node(spec: &PartSpec) -> Node {
    let [w, h, d] = spec.size;
    Node::new(spec.name)
        .with_mesh(cuboid(w, h, d), material(spec.color))
        .with_transform(Transform::from_translation(Vec3::from_array(spec.offset)))
}

/// Build the robot from the fixed part table.
///
/// Pure: every call returns a fresh, independently owned model.
pub fn build() -> Model {
    let mut root = Node::new(MODEL_NAME);
    for spec in PARTS.iter() {
        root.add_child(part_node(spec));
    }
    Model::new(root)
}
