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

//! Defines data structures for describing render pipelines and vertex input.

use super::util::DataType;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// An opaque handle to a compiled render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a pipeline layout created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineLayoutId(pub usize);

/// An opaque handle to the fixed-function state template (shaders, blending,
/// depth, rasterization) a pipeline is created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineStateId(pub usize);

/// Defines how vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    /// Each vertex is a separate point.
    PointList,
    /// Each pair of vertices forms a line.
    LineList,
    /// Consecutive vertices form a connected line strip.
    LineStrip,
    /// Each triplet of vertices forms a triangle.
    #[default]
    TriangleList,
    /// Consecutive vertices form a connected triangle strip.
    TriangleStrip,
}

/// How often the vertex buffer is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VertexStepMode {
    /// Advance once per vertex.
    #[default]
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// The in-memory format of a vertex attribute: a scalar type repeated
/// `components` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexFormat {
    /// The scalar type of each component.
    pub data_type: DataType,
    /// The number of components.
    pub components: u32,
}

impl VertexFormat {
    /// Size of one attribute value in bytes.
    pub const fn size(&self) -> u32 {
        self.data_type.size() * self.components
    }
}

/// Describes a single vertex attribute within a vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttributeDescriptor {
    /// The shader location of the attribute.
    pub location: u32,
    /// The format of the attribute.
    pub format: VertexFormat,
    /// The offset of the attribute from the start of a vertex, in bytes.
    pub offset: u32,
}

/// Describes the memory layout of one vertex buffer binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayoutDescriptor {
    /// The binding index.
    pub binding: u32,
    /// The stride, in bytes, between consecutive vertices.
    pub array_stride: u32,
    /// How often this buffer is advanced.
    pub step_mode: VertexStepMode,
    /// The attributes read from this buffer.
    pub attributes: Vec<VertexAttributeDescriptor>,
}

/// A complete description of a render pipeline to build.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The fixed-function state template the pipeline derives from.
    pub state: PipelineStateId,
    /// The pipeline layout (descriptor set layouts and push constant ranges).
    pub layout: PipelineLayoutId,
    /// The vertex buffer layouts the pipeline reads.
    pub vertex_buffers: Vec<VertexBufferLayoutDescriptor>,
    /// The primitive topology of the meshes drawn with the pipeline.
    pub topology: PrimitiveTopology,
}
