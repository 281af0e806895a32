use glam::{Quat, Vec3};
use shared::GLB_MIME;

use crate::error::ExportError;
use crate::gltf::{self, ARRAY_BUFFER, ELEMENT_ARRAY_BUFFER, FLOAT, UNSIGNED_INT};
use crate::scene::{Material, MeshData, Node};

/// GLB magic number: "glTF"
pub const GLB_MAGIC: u32 = 0x46546C67;
/// GLB version 2
pub const GLB_VERSION: u32 = 2;
/// JSON chunk type
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F534A;
/// BIN chunk type
pub const CHUNK_TYPE_BIN: u32 = 0x004E4942;

/// Destination for exported bytes, e.g. a Blob behind an object URL
pub trait ResourceSink {
    type Handle;

    fn publish(&self, bytes: Vec<u8>, mime: &str) -> Result<Self::Handle, ExportError>;
}

/// Binary glTF writer. Output is always a single self-contained GLB.
#[derive(Debug, Clone)]
pub struct GlbExporter {
    generator: String,
}

impl Default for GlbExporter {
    fn default() -> Self {
        Self::new(shared::ExportConfig::default().generator)
    }
}

impl GlbExporter {
    pub fn new(generator: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
        }
    }

    /// Encode `node` and hand the bytes to `sink`.
    ///
    /// Nothing is published when encoding fails.
    pub async fn export<S: ResourceSink>(&self, node: &Node, sink: &S) -> Result<S::Handle, ExportError> {
        let bytes = self.encode(node)?;
        let size = bytes.len();
        let handle = sink.publish(bytes, GLB_MIME)?;
        tracing::info!("Exported '{}' as GLB ({} bytes)", node.name, size);
        Ok(handle)
    }

    /// Encode the full hierarchy under `node` into GLB bytes
    pub fn encode(&self, node: &Node) -> Result<Vec<u8>, ExportError> {
        if !node.has_mesh() {
            return Err(ExportError::EmptyScene(node.name.clone()));
        }

        let mut builder = DocumentBuilder::default();
        let root = builder.add_node(node)?;

        let mut bin_data = builder.bin;
        pad_to_4(&mut bin_data, 0);

        let document = gltf::Root {
            asset: gltf::Asset {
                version: "2.0".to_string(),
                generator: Some(self.generator.clone()),
            },
            scene: Some(0),
            scenes: vec![gltf::Scene {
                name: Some("Scene".to_string()),
                nodes: vec![root],
            }],
            nodes: builder.nodes,
            meshes: builder.meshes,
            materials: builder.materials,
            accessors: builder.accessors,
            buffer_views: builder.buffer_views,
            buffers: vec![gltf::Buffer {
                byte_length: bin_data.len(),
            }],
        };

        let mut json_bytes = serde_json::to_vec(&document)?;

        // JSON padded with spaces, BIN with zeros
        pad_to_4(&mut json_bytes, b' ');

        assemble(&json_bytes, &bin_data)
    }
}

fn assemble(json: &[u8], bin: &[u8]) -> Result<Vec<u8>, ExportError> {
    let total = 12 + 8 + json.len() + 8 + bin.len();
    let total_length = u32::try_from(total).map_err(|_| ExportError::TooLarge(total))?;

    let mut glb = Vec::with_capacity(total);

    // Header
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_length.to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
    glb.extend_from_slice(json);

    // BIN chunk
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
    glb.extend_from_slice(bin);

    Ok(glb)
}

fn pad_to_4(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

/// Flattens a node tree into glTF arrays plus one binary buffer
#[derive(Default)]
struct DocumentBuilder<'a> {
    bin: Vec<u8>,
    nodes: Vec<gltf::Node>,
    meshes: Vec<gltf::Mesh>,
    materials: Vec<gltf::Material>,
    accessors: Vec<gltf::Accessor>,
    buffer_views: Vec<gltf::BufferView>,
    /// (geometry, material index) -> mesh index, for reuse of identical meshes
    written_meshes: Vec<(&'a MeshData, usize, usize)>,
    written_materials: Vec<&'a Material>,
}

impl<'a> DocumentBuilder<'a> {
    fn add_node(&mut self, node: &'a Node) -> Result<usize, ExportError> {
        let t = &node.transform;
        if !(t.translation.is_finite() && t.rotation.is_finite() && t.scale.is_finite()) {
            return Err(ExportError::NonFinite(node.name.clone()));
        }

        let index = self.nodes.len();
        self.nodes.push(gltf::Node::default());

        let mesh = match &node.mesh {
            Some(m) => Some(self.add_mesh(&node.name, &m.data, &m.material)?),
            None => None,
        };

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(self.add_node(child)?);
        }

        self.nodes[index] = gltf::Node {
            name: Some(node.name.clone()),
            mesh,
            children,
            translation: (t.translation != Vec3::ZERO).then(|| t.translation.to_array()),
            rotation: (t.rotation != Quat::IDENTITY).then(|| t.rotation.to_array()),
            scale: (t.scale != Vec3::ONE).then(|| t.scale.to_array()),
        };
        Ok(index)
    }

    fn add_material(&mut self, material: &'a Material) -> usize {
        if let Some(i) = self.written_materials.iter().position(|m| *m == material) {
            return i;
        }
        self.written_materials.push(material);
        self.materials.push(gltf::Material {
            name: Some(material.name.clone()),
            pbr_metallic_roughness: gltf::PbrMetallicRoughness {
                base_color_factor: material.color.to_linear_rgba(),
                metallic_factor: 0.0,
                roughness_factor: 1.0,
            },
        });
        self.materials.len() - 1
    }

    fn add_mesh(&mut self, name: &str, data: &'a MeshData, material: &'a Material) -> Result<usize, ExportError> {
        let material_index = self.add_material(material);
        if let Some(&(_, _, mesh_index)) = self
            .written_meshes
            .iter()
            .find(|(d, m, _)| *d == data && *m == material_index)
        {
            return Ok(mesh_index);
        }

        validate(name, data)?;
        let (min, max) = data.bounds();
        let vertex_count = data.vertex_count();

        let positions = self.push_view(&flatten(&data.positions), ARRAY_BUFFER);
        let normals = if data.normals.len() == vertex_count {
            Some(self.push_view(&flatten(&data.normals), ARRAY_BUFFER))
        } else {
            None
        };
        let indices = self.push_view(&u32s_to_bytes(&data.indices), ELEMENT_ARRAY_BUFFER);

        let position_accessor = self.push_accessor(gltf::Accessor {
            buffer_view: positions,
            byte_offset: 0,
            component_type: FLOAT,
            count: vertex_count,
            kind: "VEC3".to_string(),
            min: Some(min.to_vec()),
            max: Some(max.to_vec()),
        });
        let normal_accessor = normals.map(|view| {
            self.push_accessor(gltf::Accessor {
                buffer_view: view,
                byte_offset: 0,
                component_type: FLOAT,
                count: vertex_count,
                kind: "VEC3".to_string(),
                min: None,
                max: None,
            })
        });
        let index_accessor = self.push_accessor(gltf::Accessor {
            buffer_view: indices,
            byte_offset: 0,
            component_type: UNSIGNED_INT,
            count: data.indices.len(),
            kind: "SCALAR".to_string(),
            min: None,
            max: None,
        });

        self.meshes.push(gltf::Mesh {
            name: Some(name.to_string()),
            primitives: vec![gltf::Primitive {
                attributes: gltf::Attributes {
                    position: position_accessor,
                    normal: normal_accessor,
                },
                indices: Some(index_accessor),
                material: Some(material_index),
            }],
        });
        let mesh_index = self.meshes.len() - 1;
        self.written_meshes.push((data, material_index, mesh_index));
        Ok(mesh_index)
    }

    fn push_view(&mut self, bytes: &[u8], target: u32) -> usize {
        let byte_offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        pad_to_4(&mut self.bin, 0);
        self.buffer_views.push(gltf::BufferView {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            target: Some(target),
        });
        self.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, accessor: gltf::Accessor) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }
}

fn validate(name: &str, data: &MeshData) -> Result<(), ExportError> {
    if data.is_empty() {
        return Err(ExportError::EmptyScene(name.to_string()));
    }
    let finite = data
        .positions
        .iter()
        .chain(&data.normals)
        .all(|v| v.iter().all(|c| c.is_finite()));
    if !finite {
        return Err(ExportError::NonFinite(name.to_string()));
    }
    if let Some(&index) = data.indices.iter().find(|&&i| i as usize >= data.vertex_count()) {
        return Err(ExportError::IndexOutOfRange {
            name: name.to_string(),
            index,
            vertex_count: data.vertex_count(),
        });
    }
    Ok(())
}

fn flatten(data: &[[f32; 3]]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 12);
    for v in data {
        for f in v {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
    }
    bytes
}

fn u32s_to_bytes(data: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::geometry::{build, cuboid};
    use crate::glb;
    use shared::Color;

    /// In-memory sink handing out fresh URIs, like object URLs
    #[derive(Default)]
    struct MemorySink {
        next: Cell<u32>,
        published: RefCell<Vec<(String, Vec<u8>)>>,
    }

    impl ResourceSink for MemorySink {
        type Handle = String;

        fn publish(&self, bytes: Vec<u8>, mime: &str) -> Result<String, ExportError> {
            let id = self.next.get() + 1;
            self.next.set(id);
            let uri = format!("mem://{}/{}", mime, id);
            self.published.borrow_mut().push((uri.clone(), bytes));
            Ok(uri)
        }
    }

    struct FailingSink;

    impl ResourceSink for FailingSink {
        type Handle = String;

        fn publish(&self, _bytes: Vec<u8>, _mime: &str) -> Result<String, ExportError> {
            Err(ExportError::Publish("quota exceeded".into()))
        }
    }

    fn red() -> Material {
        Material {
            name: "red".into(),
            color: Color::RED,
        }
    }

    #[test]
    fn test_header_and_chunks() {
        let bytes = GlbExporter::default().encode(&build().root).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), GLB_VERSION);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize, bytes.len());
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), CHUNK_TYPE_JSON);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_model_document_contents() {
        let model = build();
        let bytes = GlbExporter::new("test-gen").encode(&model.root).unwrap();
        let doc = glb::parse(&bytes).unwrap();
        assert_eq!(doc.root.asset.generator.as_deref(), Some("test-gen"));
        assert_eq!(doc.root.nodes.len(), 10);
        // 9 parts collapse to 4 distinct box meshes: body, eye, leg, arm
        assert_eq!(doc.root.meshes.len(), 4);
        assert_eq!(doc.root.materials.len(), 2);
        assert_eq!(doc.root.scenes[0].nodes, vec![0]);
        assert_eq!(doc.root.nodes[0].children.len(), 9);
        assert_eq!(doc.root.nodes[0].scale, Some([0.2, 0.2, 0.2]));
        assert!(doc.root.nodes[0].translation.is_none());
    }

    #[test]
    fn test_material_colors_are_linear_flat() {
        let bytes = GlbExporter::default().encode(&build().root).unwrap();
        let summary = glb::parse(&bytes).unwrap().summary();
        assert_eq!(summary.material_colors, vec![[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]]);
        let doc = glb::parse(&bytes).unwrap();
        for m in &doc.root.materials {
            assert_eq!(m.pbr_metallic_roughness.metallic_factor, 0.0);
            assert_eq!(m.pbr_metallic_roughness.roughness_factor, 1.0);
        }
    }

    #[test]
    fn test_part_dimensions_survive_export() {
        let bytes = GlbExporter::default().encode(&build().root).unwrap();
        let summary = glb::parse(&bytes).unwrap().summary();
        for spec in shared::PARTS.iter() {
            let node = summary.nodes.iter().find(|n| n.name == spec.name).unwrap();
            let extent = node.extent.expect("part has a mesh");
            for axis in 0..3 {
                assert!((extent[axis] - spec.size[axis]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_empty_scene_is_error() {
        let err = GlbExporter::default().encode(&Node::new("nothing")).unwrap_err();
        assert!(matches!(err, ExportError::EmptyScene(ref n) if n == "nothing"));
    }

    #[test]
    fn test_non_finite_vertex_is_error() {
        let mut data = cuboid(1.0, 1.0, 1.0);
        data.positions[3][1] = f32::NAN;
        let node = Node::new("bad").with_mesh(data, red());
        let err = GlbExporter::default().encode(&node).unwrap_err();
        assert!(matches!(err, ExportError::NonFinite(ref n) if n == "bad"));
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_non_finite_transform_is_error() {
        let mut model = build();
        model.root.transform.rotation = Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0);
        let err = GlbExporter::default().encode(&model.root).unwrap_err();
        assert!(matches!(err, ExportError::NonFinite(ref n) if n == "clawd"));

        let mut model = build();
        model.root.children[3].transform.translation.x = f32::INFINITY;
        let err = GlbExporter::default().encode(&model.root).unwrap_err();
        assert!(matches!(err, ExportError::NonFinite(ref n) if n == "leg_0"));
    }

    #[tokio::test]
    async fn test_non_finite_transform_publishes_nothing() {
        let sink = MemorySink::default();
        let mut model = build();
        model.root.transform.scale = Vec3::splat(f32::NAN);
        assert!(GlbExporter::default().export(&model.root, &sink).await.is_err());
        assert!(sink.published.borrow().is_empty());
    }

    #[test]
    fn test_index_out_of_range_is_error() {
        let mut data = cuboid(1.0, 1.0, 1.0);
        data.indices.push(99);
        let node = Node::new("bad").with_mesh(data, red());
        let err = GlbExporter::default().encode(&node).unwrap_err();
        assert!(matches!(err, ExportError::IndexOutOfRange { index: 99, vertex_count: 24, .. }));
    }

    #[tokio::test]
    async fn test_export_publishes_glb() {
        let sink = MemorySink::default();
        let model = build();
        let uri = GlbExporter::default().export(&model.root, &sink).await.unwrap();
        assert_eq!(uri, "mem://model/gltf-binary/1");
        let published = sink.published.borrow();
        assert_eq!(published.len(), 1);
        assert!(glb::parse(&published[0].1).is_ok());
    }

    #[tokio::test]
    async fn test_export_is_idempotent() {
        let sink = MemorySink::default();
        let model = build();
        let exporter = GlbExporter::default();
        let first = exporter.export(&model.root, &sink).await.unwrap();
        let second = exporter.export(&model.root, &sink).await.unwrap();
        assert_ne!(first, second);

        let published = sink.published.borrow();
        let a = glb::parse(&published[0].1).unwrap().summary();
        let b = glb::parse(&published[1].1).unwrap().summary();
        assert_eq!(a, b);
        assert_eq!(a.node_count, 10);
        assert_eq!(published[0].1, published[1].1);
    }

    #[tokio::test]
    async fn test_failed_export_publishes_nothing() {
        let sink = MemorySink::default();
        let result = GlbExporter::default().export(&Node::new("empty"), &sink).await;
        assert!(result.is_err());
        assert!(sink.published.borrow().is_empty());
        assert_eq!(sink.next.get(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_surfaces() {
        let err = GlbExporter::default()
            .export(&build().root, &FailingSink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "publishing resource failed: quota exceeded");
    }
}
