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

//! The declarative rendering graph an effect compiles from.
//!
//! An [`EffectDescription`] is a tree of passes, subpasses and subpass groups.
//! Each group lists, in order of precedence, the pipelines a mesh may be drawn
//! with; each pipeline declares its selection conditions and the semantic slots
//! (vertex attributes, buffer entries, uniforms, textures) it consumes. Parsing
//! the textual effect format is the host's business.

mod buffer;
mod pipeline;

pub use self::buffer::{BufferDescription, BufferEntryDescription, VariableScope};
pub use self::pipeline::{
    AttributeSemantic, BufferRef, DescriptorSetSlot, InputAttachmentRef, PipelineCondition,
    PipelineDescription, TextureRef, UniformDescription, MAX_DESCRIPTOR_SETS,
};

use crate::renderer::api::{FramebufferId, RenderPassId};
use serde::{Deserialize, Serialize};

/// A named group of pipelines inside a subpass, in precedence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubpassGroupDescription {
    /// The group name.
    pub name: String,
    /// Pipeline names; the first compatible one is selected for a mesh.
    pub pipelines: Vec<String>,
}

/// A subpass of a render pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubpassDescription {
    /// Groups recorded in order.
    pub groups: Vec<SubpassGroupDescription>,
}

/// A render pass and the framebuffer it targets on each swap image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassDescription {
    /// The pass name.
    pub name: String,
    /// The render pass object.
    pub render_pass: RenderPassId,
    /// One framebuffer per swap image. A single entry is reused for every image.
    pub framebuffers: Vec<FramebufferId>,
    /// Subpasses recorded in order.
    pub subpasses: Vec<SubpassDescription>,
}

impl PassDescription {
    /// The framebuffer to render into for swap image `swap`.
    pub fn framebuffer(&self, swap: u32) -> Option<FramebufferId> {
        match self.framebuffers.len() {
            0 => None,
            1 => Some(self.framebuffers[0]),
            _ => self.framebuffers.get(swap as usize).copied(),
        }
    }
}

/// A complete effect: the pass tree plus the pipelines and buffers it references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectDescription {
    /// The effect name.
    pub name: String,
    /// Passes recorded in order.
    pub passes: Vec<PassDescription>,
    /// Every pipeline a group may reference.
    pub pipelines: Vec<PipelineDescription>,
    /// Every buffer a pipeline may reference.
    pub buffers: Vec<BufferDescription>,
}

impl EffectDescription {
    /// Creates an empty effect.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Index of the pipeline called `name`.
    pub fn pipeline_index(&self, name: &str) -> Option<usize> {
        self.pipelines.iter().position(|p| p.name == name)
    }

    /// The pipeline called `name`.
    pub fn pipeline(&self, name: &str) -> Option<&PipelineDescription> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Index of the buffer called `name`.
    pub fn buffer_index(&self, name: &str) -> Option<usize> {
        self.buffers.iter().position(|b| b.name == name)
    }
}
