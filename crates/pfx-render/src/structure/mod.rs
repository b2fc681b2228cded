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

//! The compiled render structure.
//!
//! Effects compile into flat arenas addressed by typed indices instead of a tree
//! of back-pointers: every element stores the index of its owner and the indices
//! of its children. The tree is
//! effect → pass → subpass → group → group model → node, with pipelines and
//! material pipelines hanging off groups and group models.

mod ids;

pub use self::ids::*;

use crate::attributes::AttributeLayout;
use crate::buffers::BufferDefinition;
use crate::semantics::{ModelBufferBinding, ModelUniformBinding, NodeBufferBinding, NodeUniformBinding};
use pfx_core::asset::Model;
use pfx_core::effect::{
    EffectDescription, PipelineDescription, UniformDescription, VariableScope, MAX_DESCRIPTOR_SETS,
};
use pfx_core::renderer::api::{
    BufferId, DescriptorSetId, IndexFormat, PrimitiveTopology, RenderPipelineId, ShaderStageFlags,
    TypedMem,
};
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// The sorted set of pipelines (by effect and name) that draw a mesh. Meshes
/// sharing the same set share one vertex layout.
pub type PipelineSet = BTreeSet<(EffectId, String)>;

/// A buffer entry addressed by buffer and entry position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEntryLocation {
    /// The buffer definition.
    pub buffer: BufferIndex,
    /// The entry position within the buffer's structure.
    pub entry: usize,
}

/// A buffer entry semantic visible to a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineBufferEntry {
    /// Where the entry lives.
    pub location: BufferEntryLocation,
    /// The scope of the owning buffer.
    pub scope: VariableScope,
    /// The set the buffer is bound at.
    pub set: u32,
    /// The binding the buffer is bound at.
    pub binding: u32,
    /// Whether the buffer is bound with a dynamic offset.
    pub dynamic: bool,
}

/// A CPU mirror of a loose uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSemantic {
    /// The upper-cased semantic.
    pub semantic: String,
    /// The current value.
    pub memory: TypedMem,
    /// The scope of the uniform.
    pub scope: VariableScope,
    /// Where the value is pushed, if it is a push constant.
    pub push_constant_offset: Option<u32>,
    /// Stages reading the push constant.
    pub stages: ShaderStageFlags,
}

impl UniformSemantic {
    pub(crate) fn new(description: &UniformDescription) -> Self {
        Self {
            semantic: description.semantic.to_ascii_uppercase(),
            memory: TypedMem::new(description.datatype, description.array_elements),
            scope: description.scope,
            push_constant_offset: description.push_constant_offset,
            stages: description.stages,
        }
    }
}

/// Position of the mirror for `semantic`, compared case-insensitively.
pub(crate) fn find_uniform(mirrors: &[UniformSemantic], semantic: &str) -> Option<usize> {
    mirrors
        .iter()
        .position(|u| u.semantic.eq_ignore_ascii_case(semantic))
}

/// Adds a mirror for `description` unless one with the same semantic exists.
pub(crate) fn add_uniform(mirrors: &mut Vec<UniformSemantic>, description: &UniformDescription) {
    if find_uniform(mirrors, &description.semantic).is_none() {
        mirrors.push(UniformSemantic::new(description));
    }
}

/// A dynamic buffer binding of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicClient {
    /// The buffer bound.
    pub buffer: BufferIndex,
    /// The binding within the set.
    pub binding: u32,
    /// The client slot of the node within the buffer.
    pub client: u32,
}

/// A compiled effect.
#[derive(Debug)]
pub struct RenderEffect {
    pub(crate) description: EffectDescription,
    pub(crate) passes: Vec<PassIndex>,
    /// Parallel to `description.buffers`.
    pub(crate) buffers: Vec<BufferIndex>,
    /// Effect-scope buffer entries, by upper-cased semantic.
    pub(crate) buffer_entry_semantics: AHashMap<String, BufferEntryLocation>,
    /// Effect-scope uniforms.
    pub(crate) uniform_semantics: Vec<UniformSemantic>,
    /// Vertex layout of each pipeline, by description index.
    pub(crate) pipeline_layouts: AHashMap<usize, Arc<AttributeLayout>>,
    /// Whether a buffer update batch is open, per swap image.
    pub(crate) is_updating: Vec<bool>,
}

impl RenderEffect {
    /// The description the effect was compiled from.
    pub fn description(&self) -> &EffectDescription {
        &self.description
    }

    /// The passes of the effect.
    pub fn passes(&self) -> &[PassIndex] {
        &self.passes
    }

    /// The buffer definitions of the effect, in description order.
    pub fn buffers(&self) -> &[BufferIndex] {
        &self.buffers
    }

    /// An effect-scope uniform mirror.
    pub fn uniform(&self, semantic: &str) -> Option<&UniformSemantic> {
        find_uniform(&self.uniform_semantics, semantic).map(|i| &self.uniform_semantics[i])
    }

    /// Every uniform mirror.
    pub fn uniforms(&self) -> &[UniformSemantic] {
        &self.uniform_semantics
    }
}

/// A compiled render pass.
#[derive(Debug)]
pub struct RenderPass {
    pub(crate) effect: EffectId,
    pub(crate) description: usize,
    pub(crate) subpasses: Vec<SubpassIndex>,
}

impl RenderPass {
    /// The subpasses of the pass.
    pub fn subpasses(&self) -> &[SubpassIndex] {
        &self.subpasses
    }
}

/// A compiled subpass.
#[derive(Debug)]
pub struct RenderSubpass {
    pub(crate) pass: PassIndex,
    pub(crate) groups: Vec<GroupIndex>,
}

impl RenderSubpass {
    /// The groups of the subpass.
    pub fn groups(&self) -> &[GroupIndex] {
        &self.groups
    }
}

/// A compiled subpass group.
#[derive(Debug)]
pub struct RenderSubpassGroup {
    pub(crate) subpass: SubpassIndex,
    pub(crate) name: String,
    /// Pipeline names in precedence order.
    pub(crate) pipeline_names: Vec<String>,
    /// Models added for rendering, in order of addition.
    pub(crate) models: Vec<ModelId>,
    pub(crate) pipelines: Vec<PipelineIndex>,
    pub(crate) group_models: Vec<GroupModelIndex>,
}

impl RenderSubpassGroup {
    /// The group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Models drawn by the group.
    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    /// Pipelines instantiated in the group.
    pub fn pipelines(&self) -> &[PipelineIndex] {
        &self.pipelines
    }

    /// The (group, model) pairs of the group.
    pub fn group_models(&self) -> &[GroupModelIndex] {
        &self.group_models
    }
}

/// The nodes one model contributes to one group.
#[derive(Debug)]
pub struct SubpassGroupModel {
    pub(crate) group: GroupIndex,
    pub(crate) model: ModelId,
    pub(crate) nodes: Vec<NodeIndex>,
    pub(crate) material_pipelines: Vec<MaterialPipelineIndex>,
}

impl SubpassGroupModel {
    /// The model.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The nodes drawn, in recording order.
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }
}

/// A pipeline instantiated in a group.
#[derive(Debug)]
pub struct RenderPipeline {
    pub(crate) effect: EffectId,
    pub(crate) group: GroupIndex,
    pub(crate) name: String,
    pub(crate) description: usize,
    pub(crate) api_pipeline: Option<RenderPipelineId>,
    pub(crate) topology: PrimitiveTopology,
    /// Model and node scope buffer entries, by upper-cased semantic.
    pub(crate) buffer_entry_semantics: AHashMap<String, PipelineBufferEntry>,
    /// Model-scope uniform mirrors.
    pub(crate) uniform_semantics: Vec<UniformSemantic>,
    pub(crate) model_buffer_bindings: Vec<ModelBufferBinding>,
    pub(crate) model_uniform_bindings: Vec<ModelUniformBinding>,
    pub(crate) material_pipelines: Vec<MaterialPipelineIndex>,
}

impl RenderPipeline {
    /// The pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend pipeline, once built.
    pub fn api_pipeline(&self) -> Option<RenderPipelineId> {
        self.api_pipeline
    }

    /// The topology stamped from the meshes selecting this pipeline.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Automatic model-scope buffer bindings.
    pub fn model_buffer_bindings(&self) -> &[ModelBufferBinding] {
        &self.model_buffer_bindings
    }

    /// Automatic model-scope uniform bindings.
    pub fn model_uniform_bindings(&self) -> &[ModelUniformBinding] {
        &self.model_uniform_bindings
    }

    /// A model-scope uniform mirror.
    pub fn uniform(&self, semantic: &str) -> Option<&UniformSemantic> {
        find_uniform(&self.uniform_semantics, semantic).map(|i| &self.uniform_semantics[i])
    }

    /// Every uniform mirror.
    pub fn uniforms(&self) -> &[UniformSemantic] {
        &self.uniform_semantics
    }
}

/// The descriptor sets a pipeline uses for one material of one model.
#[derive(Debug)]
pub struct MaterialPipeline {
    pub(crate) group_model: GroupModelIndex,
    pub(crate) pipeline: PipelineIndex,
    pub(crate) material: usize,
    /// Per set slot: one set per swap image, a single set, or none.
    pub(crate) sets: [Vec<DescriptorSetId>; MAX_DESCRIPTOR_SETS],
}

impl MaterialPipeline {
    /// The set bound at `set` for swap image `swap`.
    pub fn set(&self, set: usize, swap: u32) -> Option<DescriptorSetId> {
        let sets = self.sets.get(set)?;
        match sets.len() {
            0 => None,
            1 => Some(sets[0]),
            _ => sets.get(swap as usize).copied(),
        }
    }
}

/// A drawable unit: one bone batch of one mesh node, drawn with one pipeline.
#[derive(Debug)]
pub struct RenderNode {
    pub(crate) group_model: GroupModelIndex,
    pub(crate) pipeline: PipelineIndex,
    pub(crate) material_pipeline: MaterialPipelineIndex,
    pub(crate) mesh: MeshIndex,
    pub(crate) model: ModelId,
    pub(crate) asset_node: usize,
    pub(crate) batch: u32,
    /// Per set slot, dynamic bindings ordered by binding.
    pub(crate) dynamic_clients: [Vec<DynamicClient>; MAX_DESCRIPTOR_SETS],
    /// Per set slot, per swap image, the dynamic offsets to bind.
    pub(crate) dynamic_offsets: [Vec<Vec<u32>>; MAX_DESCRIPTOR_SETS],
    /// Node-scope uniform mirrors.
    pub(crate) uniform_semantics: Vec<UniformSemantic>,
    pub(crate) buffer_bindings: Vec<NodeBufferBinding>,
    pub(crate) uniform_bindings: Vec<NodeUniformBinding>,
}

impl RenderNode {
    /// The pipeline the node is drawn with.
    pub fn pipeline(&self) -> PipelineIndex {
        self.pipeline
    }

    /// The mesh drawn.
    pub fn mesh(&self) -> MeshIndex {
        self.mesh
    }

    /// The model the node belongs to.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The scene node index within the model.
    pub fn asset_node(&self) -> usize {
        self.asset_node
    }

    /// The bone batch drawn.
    pub fn batch(&self) -> u32 {
        self.batch
    }

    /// Dynamic bindings of set slot `set`, ordered by binding.
    pub fn dynamic_clients(&self, set: usize) -> &[DynamicClient] {
        self.dynamic_clients.get(set).map_or(&[], Vec::as_slice)
    }

    /// Dynamic offsets of set slot `set` for swap image `swap`.
    pub fn dynamic_offsets(&self, set: usize, swap: u32) -> &[u32] {
        self.dynamic_offsets
            .get(set)
            .and_then(|per_swap| per_swap.get(swap as usize))
            .map_or(&[], Vec::as_slice)
    }

    /// Automatic node-scope buffer bindings, ordered by entry.
    pub fn buffer_bindings(&self) -> &[NodeBufferBinding] {
        &self.buffer_bindings
    }

    /// Automatic node-scope uniform bindings.
    pub fn uniform_bindings(&self) -> &[NodeUniformBinding] {
        &self.uniform_bindings
    }

    /// A node-scope uniform mirror.
    pub fn uniform(&self, semantic: &str) -> Option<&UniformSemantic> {
        find_uniform(&self.uniform_semantics, semantic).map(|i| &self.uniform_semantics[i])
    }

    /// Every uniform mirror.
    pub fn uniforms(&self) -> &[UniformSemantic] {
        &self.uniform_semantics
    }
}

/// A model registered with the manager.
#[derive(Debug)]
pub struct RenderModel {
    pub(crate) model: Model,
    /// Parallel to the model's meshes.
    pub(crate) meshes: Vec<MeshIndex>,
}

impl RenderModel {
    /// The scene asset.
    pub fn model(&self) -> &Model {
        &self.model
    }
}

/// GPU-side state of a model mesh.
#[derive(Debug)]
pub struct RenderMesh {
    pub(crate) model: ModelId,
    pub(crate) asset_mesh: usize,
    pub(crate) pipelines: PipelineSet,
    pub(crate) layout: Option<Arc<AttributeLayout>>,
    /// One vertex buffer per layout binding.
    pub(crate) vbos: Vec<Option<BufferId>>,
    pub(crate) ibo: Option<(BufferId, IndexFormat)>,
}

impl RenderMesh {
    /// The pipelines drawing the mesh.
    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    /// The merged vertex layout.
    pub fn layout(&self) -> Option<&Arc<AttributeLayout>> {
        self.layout.as_ref()
    }

    /// The vertex buffers, one per binding.
    pub fn vbos(&self) -> &[Option<BufferId>] {
        &self.vbos
    }

    /// The index buffer.
    pub fn ibo(&self) -> Option<(BufferId, IndexFormat)> {
        self.ibo
    }
}

/// Flat arenas holding every compiled object.
#[derive(Debug, Default)]
pub struct RenderStructure {
    pub(crate) effects: Vec<RenderEffect>,
    pub(crate) passes: Vec<RenderPass>,
    pub(crate) subpasses: Vec<RenderSubpass>,
    pub(crate) groups: Vec<RenderSubpassGroup>,
    pub(crate) group_models: Vec<SubpassGroupModel>,
    pub(crate) pipelines: Vec<RenderPipeline>,
    pub(crate) material_pipelines: Vec<MaterialPipeline>,
    pub(crate) nodes: Vec<RenderNode>,
    pub(crate) models: Vec<RenderModel>,
    pub(crate) meshes: Vec<RenderMesh>,
    pub(crate) buffers: Vec<BufferDefinition>,
}

impl RenderStructure {
    /// Number of effects.
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Number of drawable nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of registered models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Iterates over every node index, in recording order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        crate::iterator::RenderNodeIter::new(self).map(|entry| entry.node)
    }

    /// The effect, if the ID exists.
    pub fn effect(&self, id: EffectId) -> Option<&RenderEffect> {
        self.effects.get(id.0)
    }

    /// The model, if the ID exists.
    pub fn model(&self, id: ModelId) -> Option<&RenderModel> {
        self.models.get(id.0)
    }

    /// The description of a compiled pipeline.
    pub fn pipeline_description(&self, pipeline: PipelineIndex) -> &PipelineDescription {
        let p = &self[pipeline];
        &self[p.effect].description.pipelines[p.description]
    }

    /// The group a node is drawn in.
    pub fn node_group(&self, node: NodeIndex) -> GroupIndex {
        self[self[node].group_model].group
    }

    /// Finds a compiled pipeline by name in a group.
    pub fn find_pipeline(&self, group: GroupIndex, name: &str) -> Option<PipelineIndex> {
        self[group]
            .pipelines
            .iter()
            .copied()
            .find(|&p| self[p].name == name)
    }

    /// Finds a buffer definition of an effect by name.
    pub fn find_buffer(&self, effect: EffectId, name: &str) -> Option<BufferIndex> {
        let e = self.effect(effect)?;
        e.description
            .buffer_index(name)
            .and_then(|i| e.buffers.get(i).copied())
    }

    /// The group at `(pass, subpass, group)` of an effect.
    pub fn group_at(
        &self,
        effect: EffectId,
        pass: usize,
        subpass: usize,
        group: usize,
    ) -> Option<GroupIndex> {
        let pass = *self.effect(effect)?.passes.get(pass)?;
        let subpass = *self[pass].subpasses.get(subpass)?;
        self[subpass].groups.get(group).copied()
    }
}

macro_rules! arena_access {
    ($($index:ty => $field:ident : $item:ty),* $(,)?) => {
        $(
            impl Index<$index> for RenderStructure {
                type Output = $item;
                #[inline]
                fn index(&self, index: $index) -> &$item {
                    &self.$field[index.0]
                }
            }

            impl IndexMut<$index> for RenderStructure {
                #[inline]
                fn index_mut(&mut self, index: $index) -> &mut $item {
                    &mut self.$field[index.0]
                }
            }
        )*
    };
}

arena_access! {
    EffectId => effects: RenderEffect,
    ModelId => models: RenderModel,
    PassIndex => passes: RenderPass,
    SubpassIndex => subpasses: RenderSubpass,
    GroupIndex => groups: RenderSubpassGroup,
    GroupModelIndex => group_models: SubpassGroupModel,
    PipelineIndex => pipelines: RenderPipeline,
    MaterialPipelineIndex => material_pipelines: MaterialPipeline,
    NodeIndex => nodes: RenderNode,
    MeshIndex => meshes: RenderMesh,
    BufferIndex => buffers: BufferDefinition,
}
