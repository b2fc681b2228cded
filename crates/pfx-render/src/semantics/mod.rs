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

//! Automatic semantics: values the render manager derives from the scene every
//! frame (transforms, bones, cameras, lights) and writes into buffer entries and
//! uniform mirrors.
//!
//! Semantic names are resolved once, at compile time, into [`SemanticProducer`]s.
//! Each resolved slot becomes a binding holding the producer, the destination and
//! a scratch value, so the per-frame update does no string lookups and no
//! allocation.

mod automatic;
mod producers;
mod registry;

pub(crate) use self::automatic::{
    begin_buffer_updates, begin_effect_updates, create_automatic_semantics, end_buffer_updates,
    end_effect_updates, update_automatic_semantics,
};
pub use self::producers::{ModelContext, NodeContext};
pub use self::registry::SemanticRegistry;

use crate::structure::{BufferIndex, ModelId};
use pfx_core::renderer::api::{GpuDatatype, TypedMem};

/// A value computed per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSemantic {
    /// The node's world matrix (mat4).
    WorldMatrix,
    /// Inverse transpose of the world matrix's upper 3x3 (mat3).
    WorldMatrixIT,
    /// View of camera 0 times world (mat4).
    ModelView,
    /// View-projection of camera 0 times world (mat4).
    ModelViewProjection,
    /// Number of bones in the node's batch (int).
    BoneCount,
    /// World matrices of every bone of the node's batch (mat4 array).
    BoneMatrices,
    /// Inverse transposes of the batch's bone matrices (mat3 array).
    BoneMatricesIT,
    /// World matrix of one bone of the batch (mat4).
    BoneMatrix(u32),
    /// Inverse transpose of one bone matrix (mat3).
    BoneMatrixIT(u32),
}

impl NodeSemantic {
    /// The shader type the semantic produces.
    pub fn datatype(&self) -> GpuDatatype {
        match self {
            NodeSemantic::WorldMatrix
            | NodeSemantic::ModelView
            | NodeSemantic::ModelViewProjection
            | NodeSemantic::BoneMatrices
            | NodeSemantic::BoneMatrix(_) => GpuDatatype::Mat4x4,
            NodeSemantic::WorldMatrixIT
            | NodeSemantic::BoneMatricesIT
            | NodeSemantic::BoneMatrixIT(_) => GpuDatatype::Mat3x3,
            NodeSemantic::BoneCount => GpuDatatype::Int32,
        }
    }
}

/// A value computed per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSemantic {
    /// Projection matrix of camera `n` (mat4).
    Projection(u32),
    /// View matrix of camera `n` (mat4).
    View(u32),
    /// Projection times view of camera `n` (mat4).
    ViewProjection(u32),
    /// World position of light `n` (vec3).
    LightPosition(u32),
    /// World direction of light `n` (vec3).
    LightDirection(u32),
    /// Colour of light `n` (vec3).
    LightColor(u32),
}

impl ModelSemantic {
    /// The shader type the semantic produces.
    pub fn datatype(&self) -> GpuDatatype {
        match self {
            ModelSemantic::Projection(_) | ModelSemantic::View(_) | ModelSemantic::ViewProjection(_) => {
                GpuDatatype::Mat4x4
            }
            ModelSemantic::LightPosition(_)
            | ModelSemantic::LightDirection(_)
            | ModelSemantic::LightColor(_) => GpuDatatype::Vec3,
        }
    }
}

/// Where the value of an automatic binding comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticProducer {
    /// A fixed value, taken from the node's material.
    Constant(TypedMem),
    /// Computed from the node.
    Node(NodeSemantic),
    /// Computed from the model.
    Model(ModelSemantic),
}

impl SemanticProducer {
    /// The shader type of the produced value.
    pub fn datatype(&self) -> GpuDatatype {
        match self {
            SemanticProducer::Constant(mem) => mem.datatype(),
            SemanticProducer::Node(s) => s.datatype(),
            SemanticProducer::Model(s) => s.datatype(),
        }
    }
}

/// A node-scope (or bone-batch-scope) buffer entry refreshed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBufferBinding {
    pub(crate) producer: SemanticProducer,
    pub(crate) buffer: BufferIndex,
    pub(crate) entry: usize,
    pub(crate) client: u32,
    pub(crate) scratch: TypedMem,
}

impl NodeBufferBinding {
    /// What computes the value.
    pub fn producer(&self) -> &SemanticProducer {
        &self.producer
    }

    /// The buffer written.
    pub fn buffer(&self) -> BufferIndex {
        self.buffer
    }

    /// The entry written.
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// The client slice written.
    pub fn client(&self) -> u32 {
        self.client
    }
}

/// A model-scope buffer entry refreshed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBufferBinding {
    pub(crate) producer: ModelSemantic,
    pub(crate) model: ModelId,
    pub(crate) buffer: BufferIndex,
    pub(crate) entry: usize,
    pub(crate) client: u32,
    pub(crate) scratch: TypedMem,
}

impl ModelBufferBinding {
    /// What computes the value.
    pub fn producer(&self) -> ModelSemantic {
        self.producer
    }

    /// The model the value is computed from.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The buffer written.
    pub fn buffer(&self) -> BufferIndex {
        self.buffer
    }

    /// The entry written.
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// The client slice written.
    pub fn client(&self) -> u32 {
        self.client
    }
}

/// A node-scope uniform mirror refreshed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUniformBinding {
    pub(crate) producer: SemanticProducer,
    pub(crate) uniform: usize,
}

impl NodeUniformBinding {
    /// What computes the value.
    pub fn producer(&self) -> &SemanticProducer {
        &self.producer
    }
}

/// A model-scope uniform mirror refreshed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUniformBinding {
    pub(crate) producer: ModelSemantic,
    pub(crate) model: ModelId,
    pub(crate) uniform: usize,
}

impl ModelUniformBinding {
    /// What computes the value.
    pub fn producer(&self) -> ModelSemantic {
        self.producer
    }

    /// The model the value is computed from.
    pub fn model(&self) -> ModelId {
        self.model
    }
}
