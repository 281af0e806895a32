//! Minimal scene graph: named nodes with a local transform, an optional box
//! mesh and children.

use glam::{Mat4, Quat, Vec3};
use shared::{Color, PLACEMENT_SCALE};

/// Local TRS transform of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose an affine matrix into TRS
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// Indexed triangle mesh with per-vertex normals
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Axis-aligned bounds (min, max) of the positions
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        (min, max)
    }

    /// Width, height and depth of the bounds
    pub fn extent(&self) -> [f32; 3] {
        let (min, max) = self.bounds();
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }
}

/// Flat, untextured material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub data: MeshData,
    pub material: Material,
}

/// Scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, data: MeshData, material: Material) -> Self {
        self.mesh = Some(Mesh { data, material });
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// This node plus all descendants
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Nodes without children, depth-first
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        if self.children.is_empty() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some() || self.children.iter().any(Node::has_mesh)
    }
}

/// The placeable robot: root node plus visibility.
///
/// Only the root transform and `visible` change after construction; geometry
/// and materials are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub root: Node,
    pub visible: bool,
}

impl Model {
    /// Wraps `root`, applies the placement scale and hides it until placed
    pub fn new(mut root: Node) -> Self {
        root.transform.scale = Vec3::splat(PLACEMENT_SCALE);
        Self {
            root,
            visible: false,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.root.transform
    }

    /// Move the model to `translation`/`rotation`, keeping the placement scale
    pub fn place(&mut self, translation: Vec3, rotation: Quat) {
        self.root.transform = Transform {
            translation,
            rotation,
            scale: Vec3::splat(PLACEMENT_SCALE),
        };
        self.visible = true;
    }

    /// World matrix of the root, column-major, for the render path
    pub fn world_matrix(&self) -> Mat4 {
        self.root.transform.to_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Node {
        Node::new(name).with_mesh(
            MeshData {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [0.5, -1.0, 0.0]],
                normals: vec![[0.0, 0.0, 1.0]; 3],
                indices: vec![0, 1, 2],
            },
            Material {
                name: "m".into(),
                color: Color::RED,
            },
        )
    }

    #[test]
    fn test_node_count_and_leaves() {
        let mut root = Node::new("root");
        let mut group = Node::new("group");
        group.add_child(leaf("a"));
        group.add_child(leaf("b"));
        root.add_child(group);
        root.add_child(leaf("c"));

        assert_eq!(root.node_count(), 5);
        let names: Vec<&str> = root.leaves().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(root.find("b").is_some());
        assert!(root.find("zzz").is_none());
        assert!(root.has_mesh());
        assert!(!Node::new("empty").has_mesh());
    }

    #[test]
    fn test_mesh_bounds() {
        let node = leaf("a");
        let mesh = &node.mesh.as_ref().unwrap().data;
        assert_eq!(mesh.bounds(), ([0.0, -1.0, 0.0], [1.0, 2.0, 3.0]));
        assert_eq!(mesh.extent(), [1.0, 3.0, 3.0]);
        assert!(!mesh.is_empty());
        assert!(MeshData::default().is_empty());
    }

    #[test]
    fn test_transform_matrix_roundtrip() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };
        let back = Transform::from_matrix(&t.to_matrix());
        assert!(back.translation.abs_diff_eq(t.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(t.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(t.scale, 1e-5));
    }

    #[test]
    fn test_model_starts_hidden_at_placement_scale() {
        let model = Model::new(Node::new("root"));
        assert!(!model.visible);
        assert_eq!(model.transform().scale, Vec3::splat(PLACEMENT_SCALE));
        assert_eq!(model.transform().translation, Vec3::ZERO);
    }

    #[test]
    fn test_model_place_keeps_scale() {
        let mut model = Model::new(Node::new("root"));
        model.place(Vec3::new(0.0, -1.0, -2.0), Quat::from_rotation_y(1.0));
        assert!(model.visible);
        assert_eq!(model.transform().scale, Vec3::splat(PLACEMENT_SCALE));
        assert_eq!(model.transform().translation, Vec3::new(0.0, -1.0, -2.0));
    }
}
