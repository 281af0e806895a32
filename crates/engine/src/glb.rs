//! GLB reader: validates the container produced by [`crate::export`] (or any
//! conforming writer using float positions) and summarizes its contents.

use serde::Serialize;

use crate::error::GlbError;
use crate::export::{CHUNK_TYPE_BIN, CHUNK_TYPE_JSON, GLB_MAGIC, GLB_VERSION};
use crate::gltf::{self, FLOAT};

/// Decoded GLB: the JSON document plus the BIN chunk
#[derive(Debug, Clone)]
pub struct GlbDocument {
    pub root: gltf::Root,
    pub bin: Vec<u8>,
}

/// What a model looks like after a round trip through the binary format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlbSummary {
    pub generator: Option<String>,
    pub node_count: usize,
    pub mesh_count: usize,
    pub nodes: Vec<NodeSummary>,
    pub material_colors: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub children: usize,
    /// Extent of the node's mesh in local space
    pub extent: Option<[f32; 3]>,
    pub material: Option<usize>,
}

/// `a + b` for offsets read from the input; overflow means a corrupt file
fn offset_add(a: usize, b: usize) -> Result<usize, GlbError> {
    a.checked_add(b)
        .ok_or_else(|| GlbError::Invalid(format!("offset {a} + {b} overflows")))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, GlbError> {
    let end = offset_add(offset, 4)?;
    let slice = bytes.get(offset..end).ok_or(GlbError::Truncated {
        needed: end,
        available: bytes.len(),
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn chunk(bytes: &[u8], offset: usize) -> Result<(u32, &[u8]), GlbError> {
    let length = read_u32(bytes, offset)? as usize;
    let kind = read_u32(bytes, offset_add(offset, 4)?)?;
    let start = offset_add(offset, 8)?;
    let end = offset_add(start, length)?;
    let data = bytes.get(start..end).ok_or(GlbError::Truncated {
        needed: end,
        available: bytes.len(),
    })?;
    Ok((kind, data))
}

/// Parse and validate a GLB container
pub fn parse(bytes: &[u8]) -> Result<GlbDocument, GlbError> {
    let magic = read_u32(bytes, 0)?;
    if magic != GLB_MAGIC {
        return Err(GlbError::BadMagic(magic));
    }
    let version = read_u32(bytes, 4)?;
    if version != GLB_VERSION {
        return Err(GlbError::BadVersion(version));
    }
    let length = read_u32(bytes, 8)? as usize;
    if length != bytes.len() {
        return Err(GlbError::LengthMismatch {
            header: length,
            actual: bytes.len(),
        });
    }

    let (kind, json) = chunk(bytes, 12)?;
    if kind != CHUNK_TYPE_JSON {
        return Err(GlbError::MissingJson(kind));
    }
    let root: gltf::Root = serde_json::from_slice(json)?;

    let bin_offset = 12 + 8 + json.len();
    let bin = if bin_offset < bytes.len() {
        let (kind, data) = chunk(bytes, bin_offset)?;
        if kind != CHUNK_TYPE_BIN {
            return Err(GlbError::Invalid(format!("unexpected chunk type 0x{kind:08x}")));
        }
        data.to_vec()
    } else {
        Vec::new()
    };

    let doc = GlbDocument { root, bin };
    doc.validate()?;
    Ok(doc)
}

impl GlbDocument {
    fn validate(&self) -> Result<(), GlbError> {
        let root = &self.root;
        if root.asset.version != "2.0" {
            return Err(GlbError::Invalid(format!("asset version {}", root.asset.version)));
        }
        if let Some(buffer) = root.buffers.first() {
            if buffer.byte_length > self.bin.len() {
                return Err(GlbError::Invalid(format!(
                    "buffer of {} bytes but BIN chunk has {}",
                    buffer.byte_length,
                    self.bin.len()
                )));
            }
        }
        for (i, view) in root.buffer_views.iter().enumerate() {
            let buffer = root
                .buffers
                .get(view.buffer)
                .ok_or_else(|| GlbError::Invalid(format!("bufferView {i} references missing buffer")))?;
            if offset_add(view.byte_offset, view.byte_length)? > buffer.byte_length {
                return Err(GlbError::Invalid(format!("bufferView {i} out of bounds")));
            }
        }
        for (i, accessor) in root.accessors.iter().enumerate() {
            if accessor.buffer_view >= root.buffer_views.len() {
                return Err(GlbError::Invalid(format!("accessor {i} references missing bufferView")));
            }
        }
        for (i, mesh) in root.meshes.iter().enumerate() {
            for p in &mesh.primitives {
                let refs = [Some(p.attributes.position), p.attributes.normal, p.indices];
                if refs.iter().flatten().any(|&a| a >= root.accessors.len()) {
                    return Err(GlbError::Invalid(format!("mesh {i} references missing accessor")));
                }
                if p.material.is_some_and(|m| m >= root.materials.len()) {
                    return Err(GlbError::Invalid(format!("mesh {i} references missing material")));
                }
            }
        }
        for (i, node) in root.nodes.iter().enumerate() {
            if node.mesh.is_some_and(|m| m >= root.meshes.len()) {
                return Err(GlbError::Invalid(format!("node {i} references missing mesh")));
            }
            if node.children.iter().any(|&c| c >= root.nodes.len() || c == i) {
                return Err(GlbError::Invalid(format!("node {i} has invalid children")));
            }
        }
        for scene in &root.scenes {
            if scene.nodes.iter().any(|&n| n >= root.nodes.len()) {
                return Err(GlbError::Invalid("scene references missing node".into()));
            }
        }
        Ok(())
    }

    /// Read a float VEC3 accessor from the BIN chunk
    pub fn read_vec3(&self, accessor: usize) -> Result<Vec<[f32; 3]>, GlbError> {
        let acc = self
            .root
            .accessors
            .get(accessor)
            .ok_or_else(|| GlbError::Invalid(format!("missing accessor {accessor}")))?;
        if acc.component_type != FLOAT || acc.kind != "VEC3" {
            return Err(GlbError::Invalid(format!("accessor {accessor} is not a float VEC3")));
        }
        let view = &self.root.buffer_views[acc.buffer_view];
        let start = offset_add(view.byte_offset, acc.byte_offset)?;
        let size = acc
            .count
            .checked_mul(12)
            .ok_or_else(|| GlbError::Invalid(format!("accessor {accessor} count {} overflows", acc.count)))?;
        let end = offset_add(start, size)?;
        if end > offset_add(view.byte_offset, view.byte_length)? {
            return Err(GlbError::Invalid(format!("accessor {accessor} overruns its bufferView")));
        }
        let data = self.bin.get(start..end).ok_or(GlbError::Truncated {
            needed: end,
            available: self.bin.len(),
        })?;
        Ok(data
            .chunks_exact(12)
            .map(|c| {
                let f = |i: usize| f32::from_le_bytes([c[i], c[i + 1], c[i + 2], c[i + 3]]);
                [f(0), f(4), f(8)]
            })
            .collect())
    }

    fn mesh_extent(&self, mesh: usize) -> Result<Option<[f32; 3]>, GlbError> {
        let Some(primitive) = self.root.meshes[mesh].primitives.first() else {
            return Ok(None);
        };
        let positions = self.read_vec3(primitive.attributes.position)?;
        if positions.is_empty() {
            return Ok(None);
        }
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Ok(Some([max[0] - min[0], max[1] - min[1], max[2] - min[2]]))
    }

    /// Node names, mesh extents and material colors, decoded from the binary data
    pub fn summary(&self) -> GlbSummary {
        let nodes = self
            .root
            .nodes
            .iter()
            .map(|node| {
                let extent = node.mesh.and_then(|m| self.mesh_extent(m).ok().flatten());
                let material = node
                    .mesh
                    .and_then(|m| self.root.meshes[m].primitives.first())
                    .and_then(|p| p.material);
                NodeSummary {
                    name: node.name.clone().unwrap_or_default(),
                    children: node.children.len(),
                    extent,
                    material,
                }
            })
            .collect();

        GlbSummary {
            generator: self.root.asset.generator.clone(),
            node_count: self.root.nodes.len(),
            mesh_count: self.root.meshes.len(),
            nodes,
            material_colors: self
                .root
                .materials
                .iter()
                .map(|m| m.pbr_metallic_roughness.base_color_factor)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::GlbExporter;
    use crate::geometry::build;

    fn model_glb() -> Vec<u8> {
        GlbExporter::default().encode(&build().root).unwrap()
    }

    #[test]
    fn test_parse_model() {
        let doc = parse(&model_glb()).unwrap();
        let summary = doc.summary();
        assert_eq!(summary.node_count, 10);
        assert_eq!(summary.mesh_count, 4);
        assert_eq!(summary.nodes[0].name, "clawd");
        assert_eq!(summary.nodes[0].children, 9);
        assert!(summary.nodes[0].extent.is_none());
        assert_eq!(summary.nodes.iter().filter(|n| n.extent.is_some()).count(), 9);
    }

    #[test]
    fn test_eyes_use_black_material() {
        let summary = parse(&model_glb()).unwrap().summary();
        let eye = summary.nodes.iter().find(|n| n.name == "eye_left").unwrap();
        let color = summary.material_colors[eye.material.unwrap()];
        assert_eq!(color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_read_vec3_matches_geometry() {
        let doc = parse(&model_glb()).unwrap();
        let positions = doc.read_vec3(0).unwrap();
        assert_eq!(positions, crate::geometry::cuboid(1.2, 0.8, 0.4).positions);
    }

    #[test]
    fn test_read_vec3_rejects_index_accessor() {
        let doc = parse(&model_glb()).unwrap();
        // accessor 2 holds body indices
        assert!(matches!(doc.read_vec3(2), Err(GlbError::Invalid(_))));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = model_glb();
        bytes[0] = b'x';
        assert!(matches!(parse(&bytes), Err(GlbError::BadMagic(_))));
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = model_glb();
        bytes[4..8].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(parse(&bytes), Err(GlbError::BadVersion(1))));
    }

    #[test]
    fn test_truncated() {
        let bytes = model_glb();
        assert!(matches!(parse(&bytes[..6]), Err(GlbError::Truncated { .. })));
        assert!(matches!(
            parse(&bytes[..bytes.len() - 4]),
            Err(GlbError::LengthMismatch { .. })
        ));
    }

    /// Wraps a hand-written glTF JSON document and BIN payload in a GLB container
    fn container(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut bytes = Vec::with_capacity(total);
        for word in [GLB_MAGIC, GLB_VERSION, total as u32, json.len() as u32, CHUNK_TYPE_JSON] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.extend_from_slice(&json);
        bytes.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
        bytes.extend_from_slice(bin);
        bytes
    }

    #[test]
    fn test_huge_buffer_view_offset_is_error() {
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"buffers":[{{"byteLength":4}}],"bufferViews":[{{"buffer":0,"byteOffset":{},"byteLength":1}}]}}"#,
            usize::MAX
        );
        let err = parse(&container(&json, &[0; 4])).unwrap_err();
        assert!(matches!(err, GlbError::Invalid(_)));
    }

    #[test]
    fn test_huge_accessor_count_is_error() {
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"buffers":[{{"byteLength":12}}],"bufferViews":[{{"buffer":0,"byteLength":12}}],"accessors":[{{"bufferView":0,"componentType":5126,"count":{},"type":"VEC3"}}]}}"#,
            usize::MAX / 4
        );
        let doc = parse(&container(&json, &[0; 12])).unwrap();
        assert!(matches!(doc.read_vec3(0), Err(GlbError::Invalid(_))));
    }

    #[test]
    fn test_chunk_length_past_end_is_truncated() {
        let mut bytes = model_glb();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(parse(&bytes), Err(GlbError::Truncated { .. })));
    }

    #[test]
    fn test_corrupt_json() {
        let mut bytes = model_glb();
        bytes[20] = b'#';
        assert!(matches!(parse(&bytes), Err(GlbError::Json(_))));
    }
}
