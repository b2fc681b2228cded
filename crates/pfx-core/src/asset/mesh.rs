// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::renderer::api::{DataType, IndexFormat, PrimitiveTopology};

/// Where and how one vertex attribute is stored in a mesh's vertex data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttributeData {
    /// The semantic name (`POSITION`, `NORMAL`, `UV0`, ...).
    pub semantic: String,
    /// The scalar type of each component.
    pub data_type: DataType,
    /// The number of components.
    pub width: u32,
    /// The offset of the attribute inside a vertex of its data block.
    pub offset: u32,
    /// The index of the [`VertexData`] block holding the attribute.
    pub data_index: usize,
}

/// An interleaved block of vertex data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexData {
    /// The raw bytes.
    pub bytes: Vec<u8>,
    /// The distance between two vertices, in bytes.
    pub stride: u32,
}

/// Triangle index data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceData {
    /// The raw index bytes.
    pub bytes: Vec<u8>,
    /// The index format.
    pub format: IndexFormat,
}

/// The bones a skinned mesh can reference in one draw.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoneBatch {
    /// Indices into the mesh skeleton's bone list.
    pub bones: Vec<usize>,
}

/// Geometry: vertex attributes, vertex data, optional faces and bone batches.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    attributes: Vec<VertexAttributeData>,
    vertex_data: Vec<VertexData>,
    faces: Option<FaceData>,
    num_vertices: u32,
    num_faces: u32,
    topology: PrimitiveTopology,
    skeleton: Option<usize>,
    bone_batches: Vec<BoneBatch>,
}

impl Mesh {
    /// Creates an empty mesh of `num_vertices` vertices.
    pub fn new(num_vertices: u32, topology: PrimitiveTopology) -> Self {
        Self {
            num_vertices,
            topology,
            ..Default::default()
        }
    }

    /// Adds an interleaved vertex data block and returns its index.
    pub fn add_vertex_data(&mut self, bytes: Vec<u8>, stride: u32) -> usize {
        self.vertex_data.push(VertexData { bytes, stride });
        self.vertex_data.len() - 1
    }

    /// Declares a vertex attribute stored in block `data_index`.
    pub fn add_attribute(
        &mut self,
        semantic: impl Into<String>,
        data_type: DataType,
        width: u32,
        offset: u32,
        data_index: usize,
    ) -> &mut Self {
        self.attributes.push(VertexAttributeData {
            semantic: semantic.into(),
            data_type,
            width,
            offset,
            data_index,
        });
        self
    }

    /// Sets triangle indices. The face count is the number of indices divided by 3.
    pub fn set_faces(&mut self, bytes: Vec<u8>, format: IndexFormat) -> &mut Self {
        self.num_faces = bytes.len() as u32 / format.size() / 3;
        self.faces = Some(FaceData { bytes, format });
        self
    }

    /// Attaches the mesh to a skeleton of the owning model, with its bone batches.
    pub fn set_skinning(&mut self, skeleton: usize, batches: Vec<BoneBatch>) -> &mut Self {
        self.skeleton = Some(skeleton);
        self.bone_batches = batches;
        self
    }

    /// Looks up an attribute by semantic (case-insensitive).
    pub fn attribute(&self, semantic: &str) -> Option<&VertexAttributeData> {
        self.attributes
            .iter()
            .find(|a| a.semantic.eq_ignore_ascii_case(semantic))
    }

    /// Returns `true` if the mesh stores the given attribute.
    pub fn has_attribute(&self, semantic: &str) -> bool {
        self.attribute(semantic).is_some()
    }

    /// All declared attributes.
    pub fn attributes(&self) -> &[VertexAttributeData] {
        &self.attributes
    }

    /// All vertex data blocks.
    pub fn vertex_data(&self) -> &[VertexData] {
        &self.vertex_data
    }

    /// The index data, if the mesh is indexed.
    pub fn faces(&self) -> Option<&FaceData> {
        self.faces.as_ref()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    /// Number of triangles of the index data.
    pub fn num_faces(&self) -> u32 {
        self.num_faces
    }

    /// The primitive topology.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// The skeleton of a skinned mesh.
    pub fn skeleton(&self) -> Option<usize> {
        self.skeleton
    }

    /// Bone batches of a skinned mesh.
    pub fn bone_batches(&self) -> &[BoneBatch] {
        &self.bone_batches
    }

    /// Number of draws the mesh is split into: one per bone batch, at least one.
    pub fn num_bone_batches(&self) -> u32 {
        (self.bone_batches.len() as u32).max(1)
    }
}
