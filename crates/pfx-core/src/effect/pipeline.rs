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

use super::buffer::VariableScope;
use crate::renderer::api::{
    DescriptorSetId, DescriptorSetLayoutId, DescriptorType, GpuDatatype, PipelineLayoutId,
    PipelineStateId, SamplerId, ShaderStageFlags, TextureViewId,
};
use serde::{Deserialize, Serialize};

/// Number of descriptor set slots a pipeline layout can use.
pub const MAX_DESCRIPTOR_SETS: usize = 4;

/// A condition a mesh/material pair must satisfy for a pipeline to be selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineCondition {
    /// The mesh must have the vertex attribute.
    AttributeRequired(String),
    /// The mesh must not have the vertex attribute.
    AttributeRequiredNo(String),
    /// The material must define the semantic.
    UniformRequired(String),
    /// The material must not define the semantic.
    UniformRequiredNo(String),
}

/// A vertex input the pipeline's vertex shader reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSemantic {
    /// The mesh semantic feeding the input.
    pub semantic: String,
    /// The shader variable name.
    pub variable_name: String,
    /// The shader type.
    pub datatype: GpuDatatype,
    /// The shader location.
    pub location: u32,
    /// The vertex buffer binding the input is read from.
    pub vbo_binding: u32,
}

/// How a descriptor set slot of the pipeline layout is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSetSlot {
    /// The layout of the set.
    pub layout: DescriptorSetLayoutId,
    /// One set per swap image when `true`.
    pub multi_buffered: bool,
    /// Sets shared by every material; empty when the render manager allocates
    /// the sets itself. One entry per swap image, or a single one.
    pub fixed_sets: Vec<DescriptorSetId>,
}

impl DescriptorSetSlot {
    /// A slot the render manager allocates sets for.
    pub fn new(layout: DescriptorSetLayoutId) -> Self {
        Self {
            layout,
            multi_buffered: false,
            fixed_sets: Vec::new(),
        }
    }

    /// Allocates one set per swap image.
    pub fn multi_buffered(mut self) -> Self {
        self.multi_buffered = true;
        self
    }

    /// Uses pre-built sets instead of allocating.
    pub fn fixed(mut self, sets: Vec<DescriptorSetId>) -> Self {
        self.fixed_sets = sets;
        self
    }

    /// Returns `true` when the slot uses pre-built sets.
    pub fn is_fixed(&self) -> bool {
        !self.fixed_sets.is_empty()
    }
}

/// A buffer bound at a descriptor binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRef {
    /// The name of the effect buffer.
    pub buffer: String,
    /// The set index.
    pub set: u32,
    /// The binding index within the set.
    pub binding: u32,
    /// How the buffer is bound.
    pub descriptor_type: DescriptorType,
}

/// A material texture bound at a descriptor binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    /// The material texture semantic.
    pub semantic: String,
    /// The set index.
    pub set: u32,
    /// The binding index within the set.
    pub binding: u32,
    /// The sampler paired with the view.
    pub sampler: Option<SamplerId>,
}

/// A subpass input attachment, one view per swap image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAttachmentRef {
    /// The set index.
    pub set: u32,
    /// The binding index within the set.
    pub binding: u32,
    /// One view per swap image.
    pub views: Vec<TextureViewId>,
}

/// A loose uniform (push constant or CPU-side value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformDescription {
    /// The semantic the uniform is bound to.
    pub semantic: String,
    /// The shader variable name.
    pub variable_name: String,
    /// The shader type.
    pub datatype: GpuDatatype,
    /// Number of array elements.
    pub array_elements: u32,
    /// The scope of the value.
    pub scope: VariableScope,
    /// Byte offset in the push constant range, when the uniform is a push constant.
    pub push_constant_offset: Option<u32>,
    /// Stages reading the push constant.
    pub stages: ShaderStageFlags,
}

/// A pipeline a subpass group can select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescription {
    /// The pipeline name groups refer to.
    pub name: String,
    /// The fixed-function state template.
    pub state: PipelineStateId,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// The descriptor set slots the layout declares.
    pub descriptor_sets: [Option<DescriptorSetSlot>; MAX_DESCRIPTOR_SETS],
    /// Vertex inputs.
    pub attributes: Vec<AttributeSemantic>,
    /// Selection conditions; all must hold.
    pub conditions: Vec<PipelineCondition>,
    /// Buffer bindings.
    pub buffers: Vec<BufferRef>,
    /// Texture bindings.
    pub textures: Vec<TextureRef>,
    /// Input attachment bindings.
    pub input_attachments: Vec<InputAttachmentRef>,
    /// Loose uniforms.
    pub uniforms: Vec<UniformDescription>,
}

impl PipelineDescription {
    /// Creates a pipeline with no inputs.
    pub fn new(name: impl Into<String>, state: PipelineStateId, layout: PipelineLayoutId) -> Self {
        Self {
            name: name.into(),
            state,
            layout,
            descriptor_sets: Default::default(),
            attributes: Vec::new(),
            conditions: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            input_attachments: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    /// Declares descriptor set slot `set`. Indices past the last slot are ignored.
    pub fn with_descriptor_set(mut self, set: u32, slot: DescriptorSetSlot) -> Self {
        if let Some(s) = self.descriptor_sets.get_mut(set as usize) {
            *s = Some(slot);
        }
        self
    }

    /// Declares a vertex input.
    pub fn with_attribute(
        mut self,
        semantic: impl Into<String>,
        datatype: GpuDatatype,
        location: u32,
        vbo_binding: u32,
    ) -> Self {
        let semantic = semantic.into();
        self.attributes.push(AttributeSemantic {
            variable_name: semantic.to_ascii_lowercase(),
            semantic,
            datatype,
            location,
            vbo_binding,
        });
        self
    }

    /// Adds a selection condition.
    pub fn with_condition(mut self, condition: PipelineCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Binds an effect buffer.
    pub fn with_buffer(
        mut self,
        buffer: impl Into<String>,
        set: u32,
        binding: u32,
        descriptor_type: DescriptorType,
    ) -> Self {
        self.buffers.push(BufferRef {
            buffer: buffer.into(),
            set,
            binding,
            descriptor_type,
        });
        self
    }

    /// Binds a material texture.
    pub fn with_texture(
        mut self,
        semantic: impl Into<String>,
        set: u32,
        binding: u32,
        sampler: Option<SamplerId>,
    ) -> Self {
        self.textures.push(TextureRef {
            semantic: semantic.into(),
            set,
            binding,
            sampler,
        });
        self
    }

    /// Binds an input attachment.
    pub fn with_input_attachment(mut self, set: u32, binding: u32, views: Vec<TextureViewId>) -> Self {
        self.input_attachments.push(InputAttachmentRef {
            set,
            binding,
            views,
        });
        self
    }

    /// Declares a loose uniform.
    pub fn with_uniform(mut self, uniform: UniformDescription) -> Self {
        self.uniforms.push(uniform);
        self
    }

    /// One past the highest set index any texture, buffer or input attachment uses.
    pub fn set_count(&self) -> usize {
        let textures = self.textures.iter().map(|t| t.set);
        let buffers = self.buffers.iter().map(|b| b.set);
        let attachments = self.input_attachments.iter().map(|a| a.set);
        textures
            .chain(buffers)
            .chain(attachments)
            .map(|s| s as usize + 1)
            .max()
            .unwrap_or(0)
            .min(MAX_DESCRIPTOR_SETS)
    }

    /// The attribute fed by `semantic`.
    pub fn attribute(&self, semantic: &str) -> Option<&AttributeSemantic> {
        self.attributes
            .iter()
            .find(|a| a.semantic.eq_ignore_ascii_case(semantic))
    }
}

impl UniformDescription {
    /// A CPU-side uniform with no push constant range.
    pub fn new(semantic: impl Into<String>, datatype: GpuDatatype, scope: VariableScope) -> Self {
        let semantic = semantic.into();
        Self {
            variable_name: semantic.to_ascii_lowercase(),
            semantic,
            datatype,
            array_elements: 1,
            scope,
            push_constant_offset: None,
            stages: ShaderStageFlags::VERTEX_FRAGMENT,
        }
    }

    /// Pushes the uniform as a push constant at `offset`.
    pub fn push_constant(mut self, offset: u32, stages: ShaderStageFlags) -> Self {
        self.push_constant_offset = Some(offset);
        self.stages = stages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_count_covers_every_reference_kind() {
        let pipe = PipelineDescription::new("p", PipelineStateId(0), PipelineLayoutId(0))
            .with_buffer("b", 0, 0, DescriptorType::UniformBufferDynamic)
            .with_texture("DIFFUSETEXTURE", 2, 0, None);
        assert_eq!(pipe.set_count(), 3);
        let empty = PipelineDescription::new("e", PipelineStateId(0), PipelineLayoutId(0));
        assert_eq!(empty.set_count(), 0);
    }

    #[test]
    fn test_descriptor_set_slot_out_of_range_is_ignored() {
        let pipe = PipelineDescription::new("p", PipelineStateId(0), PipelineLayoutId(0))
            .with_descriptor_set(7, DescriptorSetSlot::new(DescriptorSetLayoutId(1)));
        assert!(pipe.descriptor_sets.iter().all(Option::is_none));
    }
}
