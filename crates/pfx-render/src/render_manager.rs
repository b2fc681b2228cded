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

//! The render manager: compiles PFX effects against models and drives the
//! result every frame.
//!
//! A manager goes through three phases:
//! - registration: [`RenderManager::add_effect`], [`RenderManager::add_model`]
//!   and the `add_model_for_*` family attach models to subpass groups;
//! - compilation: [`RenderManager::build_render_objects`] selects pipelines,
//!   allocates every GPU object and writes descriptor sets, then
//!   [`RenderManager::create_automatic_semantics`] binds buffer entries and
//!   uniforms to the values they are fed from;
//! - per frame: [`RenderManager::update_automatic_semantics`], manual updates
//!   and the `record_*` family.

use crate::attributes::{create_attribute_configurations, create_vbos};
use crate::buffers::{
    add_node_dynamic_clients, create_buffers, BufferDefinition, DynamicSlice, RuntimeClient,
};
use crate::descriptors::{check_layouts, create_descriptor_sets};
use crate::error::{RenderManagerError, Result};
use crate::iterator::RenderNodeIter;
use crate::recording::{NodeCommands, Recording};
use crate::selection::select_pipeline;
use crate::semantics;
use crate::settings::RenderManagerSettings;
use crate::structure::{
    add_uniform, find_uniform, BufferEntryLocation, BufferIndex, EffectId, GroupIndex,
    GroupModelIndex, MaterialPipeline, MaterialPipelineIndex, MeshIndex, ModelId, NodeIndex,
    PassIndex, PipelineBufferEntry, PipelineIndex, PipelineSet, RenderEffect, RenderMesh,
    RenderModel, RenderNode, RenderPass, RenderPipeline, RenderStructure, RenderSubpass,
    RenderSubpassGroup, SubpassGroupModel, SubpassIndex, UniformSemantic,
};
use ahash::AHashMap;
use pfx_core::asset::{Material, Model, NodeObject};
use pfx_core::effect::{EffectDescription, VariableScope};
use pfx_core::renderer::api::{PrimitiveTopology, RenderPipelineDescriptor, TypedMem};
use pfx_core::renderer::{CommandRecorder, GraphicsDevice, TextureSource};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Compiles PFX effects against models and keeps them rendering.
///
/// Effects and models are registered first; `build_render_objects` then
/// compiles everything once. Afterwards the structure is fixed: only values
/// (model transforms, buffer entries, uniforms) change.
///
/// # Performance Characteristics
/// - Every GPU object is allocated during compilation; frames allocate nothing
///   on the device.
/// - Automatic semantics are resolved once, so a frame update walks flat
///   binding lists without looking up names.
/// - Recording only reads the compiled structure.
pub struct RenderManager {
    device: Arc<dyn GraphicsDevice>,
    textures: Option<Box<dyn TextureSource + Send + Sync>>,
    settings: RenderManagerSettings,
    structure: RenderStructure,
    built: bool,
}

impl fmt::Debug for RenderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderManager")
            .field("device", &self.device)
            .field("settings", &self.settings)
            .field("effects", &self.structure.effect_count())
            .field("nodes", &self.structure.node_count())
            .field("built", &self.built)
            .finish_non_exhaustive()
    }
}

impl RenderManager {
    /// Creates an empty manager rendering through `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>, settings: RenderManagerSettings) -> Self {
        Self {
            device,
            textures: None,
            settings: settings.sanitized(),
            structure: RenderStructure::default(),
            built: false,
        }
    }

    /// Sets the source material textures are resolved from. Without one,
    /// texture bindings are left unwritten.
    pub fn with_texture_source(mut self, textures: impl TextureSource + Send + Sync + 'static) -> Self {
        self.textures = Some(Box::new(textures));
        self
    }

    /// The settings in use.
    pub fn settings(&self) -> &RenderManagerSettings {
        &self.settings
    }

    /// Changes the screen size projection semantics are computed for.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.settings.screen_width = width;
        self.settings.screen_height = height;
    }

    /// The compiled structure.
    pub fn structure(&self) -> &RenderStructure {
        &self.structure
    }

    /// Whether `build_render_objects` has run.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of registered effects.
    pub fn effect_count(&self) -> usize {
        self.structure.effect_count()
    }

    /// Number of drawable nodes. Zero before compilation.
    pub fn node_count(&self) -> usize {
        self.structure.node_count()
    }

    /// A registered model.
    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.structure.model(id).map(RenderModel::model)
    }

    /// Mutable access to a registered model, to animate it between frames.
    /// Call [`Model::commit`] before the next semantic update.
    pub fn model_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.structure.models.get_mut(id.0).map(|m| &mut m.model)
    }

    /// Iterates over every node in recording order.
    pub fn render_nodes(&self) -> RenderNodeIter<'_> {
        RenderNodeIter::new(&self.structure)
    }

    // --- Registration ---

    /// Registers an effect.
    ///
    /// # Arguments
    ///
    /// * `description` - The parsed effect.
    ///
    /// # Returns
    ///
    /// The ID the effect is addressed by.
    ///
    /// # Errors
    ///
    /// * `UnknownPipeline` when a group names a pipeline the effect lacks.
    /// * `UnknownBuffer` when a pipeline references a buffer the effect lacks.
    /// * `MissingDescriptorSetLayout` when a pipeline binds into an undeclared set.
    /// * `AlreadyBuilt` after compilation.
    pub fn add_effect(&mut self, description: EffectDescription) -> Result<EffectId> {
        if self.built {
            return Err(RenderManagerError::AlreadyBuilt);
        }
        validate_effect(&description)?;

        let s = &mut self.structure;
        let effect = EffectId(s.effects.len());

        let buffers: Vec<BufferIndex> = description
            .buffers
            .iter()
            .map(|buffer| {
                s.buffers.push(BufferDefinition::new(effect, buffer));
                BufferIndex(s.buffers.len() - 1)
            })
            .collect();

        let mut buffer_entry_semantics = AHashMap::new();
        for &buffer in &buffers {
            let definition = &s[buffer];
            if definition.scope != VariableScope::Effect {
                continue;
            }
            for (entry, e) in definition.memory.entries().iter().enumerate() {
                buffer_entry_semantics.insert(e.semantic.clone(), BufferEntryLocation { buffer, entry });
            }
        }

        let mut uniform_semantics = Vec::new();
        for uniform in description
            .pipelines
            .iter()
            .flat_map(|p| &p.uniforms)
            .filter(|u| u.scope == VariableScope::Effect)
        {
            add_uniform(&mut uniform_semantics, uniform);
        }

        let mut passes = Vec::with_capacity(description.passes.len());
        for (pass_description, pass_desc) in description.passes.iter().enumerate() {
            let pass = PassIndex(s.passes.len());
            s.passes.push(RenderPass {
                effect,
                description: pass_description,
                subpasses: Vec::new(),
            });
            for subpass_desc in &pass_desc.subpasses {
                let subpass = SubpassIndex(s.subpasses.len());
                s.subpasses.push(RenderSubpass {
                    pass,
                    groups: Vec::new(),
                });
                for group_desc in &subpass_desc.groups {
                    let group = GroupIndex(s.groups.len());
                    s.groups.push(RenderSubpassGroup {
                        subpass,
                        name: group_desc.name.clone(),
                        pipeline_names: group_desc.pipelines.clone(),
                        models: Vec::new(),
                        pipelines: Vec::new(),
                        group_models: Vec::new(),
                    });
                    s[subpass].groups.push(group);
                }
                s[pass].subpasses.push(subpass);
            }
            passes.push(pass);
        }

        log::info!(
            "Added effect '{}': {} passes, {} pipelines, {} buffers",
            description.name,
            description.passes.len(),
            description.pipelines.len(),
            description.buffers.len()
        );
        s.effects.push(RenderEffect {
            description,
            passes,
            buffers,
            buffer_entry_semantics,
            uniform_semantics,
            pipeline_layouts: AHashMap::new(),
            is_updating: vec![false; self.settings.swapchain_length as usize],
        });
        Ok(effect)
    }

    /// Registers a model. It is drawn once attached to subpass groups.
    ///
    /// # Errors
    ///
    /// `AlreadyBuilt` after compilation.
    pub fn add_model(&mut self, model: Model) -> Result<ModelId> {
        if self.built {
            return Err(RenderManagerError::AlreadyBuilt);
        }
        let s = &mut self.structure;
        let id = ModelId(s.models.len());
        let meshes = (0..model.meshes().len())
            .map(|asset_mesh| {
                s.meshes.push(RenderMesh {
                    model: id,
                    asset_mesh,
                    pipelines: PipelineSet::new(),
                    layout: None,
                    vbos: Vec::new(),
                    ibo: None,
                });
                MeshIndex(s.meshes.len() - 1)
            })
            .collect();
        s.models.push(RenderModel { model, meshes });
        Ok(id)
    }

    /// Attaches a model to one subpass group. Attaching it twice is a no-op.
    ///
    /// # Errors
    ///
    /// * `UnknownModel` / `UnknownEffect` for IDs that do not exist.
    /// * `InvalidPath` when the pass, subpass or group is out of range.
    /// * `AlreadyBuilt` after compilation.
    pub fn add_model_for_subpass_group(
        &mut self,
        model: ModelId,
        effect: EffectId,
        pass: usize,
        subpass: usize,
        group: usize,
    ) -> Result<()> {
        self.check_registering(model)?;
        let group = self.group_index(effect, pass, subpass, group)?;
        let models = &mut self.structure[group].models;
        if !models.contains(&model) {
            models.push(model);
        }
        Ok(())
    }

    /// Attaches a model to every group of a subpass.
    pub fn add_model_for_all_subpass_groups(
        &mut self,
        model: ModelId,
        effect: EffectId,
        pass: usize,
        subpass: usize,
    ) -> Result<()> {
        self.check_registering(model)?;
        let subpass_index = self.subpass_index(effect, pass, subpass)?;
        for group in 0..self.structure[subpass_index].groups.len() {
            self.add_model_for_subpass_group(model, effect, pass, subpass, group)?;
        }
        Ok(())
    }

    /// Attaches a model to every group of every subpass of a pass.
    pub fn add_model_for_all_subpasses(&mut self, model: ModelId, effect: EffectId, pass: usize) -> Result<()> {
        self.check_registering(model)?;
        let pass_index = self.pass_index(effect, pass)?;
        for subpass in 0..self.structure[pass_index].subpasses.len() {
            self.add_model_for_all_subpass_groups(model, effect, pass, subpass)?;
        }
        Ok(())
    }

    /// Attaches a model to every group of an effect.
    pub fn add_model_for_all_passes(&mut self, model: ModelId, effect: EffectId) -> Result<()> {
        self.check_registering(model)?;
        for pass in 0..self.effect_ref(effect)?.passes.len() {
            self.add_model_for_all_subpasses(model, effect, pass)?;
        }
        Ok(())
    }

    fn check_registering(&self, model: ModelId) -> Result<()> {
        if self.built {
            return Err(RenderManagerError::AlreadyBuilt);
        }
        if self.structure.model(model).is_none() {
            return Err(RenderManagerError::UnknownModel(model));
        }
        Ok(())
    }

    // --- Compilation ---

    /// Compiles every registered effect and model into GPU objects.
    ///
    /// Selects a pipeline for every mesh node of every attached model, creates
    /// one node per bone batch, assigns dynamic clients, allocates effect
    /// buffers, merges vertex layouts, creates pipelines and vertex/index
    /// buffers, and writes descriptor sets. Runs at most once; a failure leaves
    /// the manager unusable.
    ///
    /// # Errors
    ///
    /// * `AlreadyBuilt` on a second call.
    /// * `ResourceCreation` when the device refuses an object.
    pub fn build_render_objects(&mut self) -> Result<()> {
        if self.built {
            return Err(RenderManagerError::AlreadyBuilt);
        }
        self.built = true;

        let device: &dyn GraphicsDevice = self.device.as_ref();
        let s = &mut self.structure;
        for group in 0..s.groups.len() {
            instantiate_group(s, GroupIndex(group))?;
        }
        create_buffers(s, device, &self.settings)?;
        create_attribute_configurations(s, self.settings.datatypes_from_model);
        create_api_pipelines(s, device)?;
        create_vbos(s, device, self.settings.log_buffer_creation)?;
        let textures = self.textures.as_deref().map(|t| t as &dyn TextureSource);
        create_descriptor_sets(s, device, textures, self.settings.swapchain_length)?;

        log::info!(
            "Built render objects: {} effects, {} pipelines, {} nodes, {} buffers",
            s.effects.len(),
            s.pipelines.len(),
            s.nodes.len(),
            s.buffers.len()
        );
        Ok(())
    }

    /// Binds every buffer entry and uniform of every pipeline and node to the
    /// value it is fed from. Calling it again rebuilds the same bindings.
    ///
    /// # Errors
    ///
    /// `NotBuilt` before compilation.
    pub fn create_automatic_semantics(&mut self) -> Result<()> {
        if !self.built {
            return Err(RenderManagerError::NotBuilt);
        }
        semantics::create_automatic_semantics(&mut self.structure);
        Ok(())
    }

    // --- Per-frame updates ---

    fn check_frame(&self, swap: u32) -> Result<()> {
        if !self.built {
            return Err(RenderManagerError::NotBuilt);
        }
        if swap >= self.settings.swapchain_length {
            return Err(RenderManagerError::InvalidSwapIndex {
                swap,
                length: self.settings.swapchain_length,
            });
        }
        Ok(())
    }

    /// Evaluates every automatic binding and writes the values for swap image
    /// `swap`. Opens and closes its own update batch unless one is open.
    pub fn update_automatic_semantics(&mut self, swap: u32) -> Result<()> {
        self.check_frame(swap)?;
        semantics::update_automatic_semantics(
            &mut self.structure,
            self.device.as_ref(),
            (self.settings.screen_width, self.settings.screen_height),
            swap,
        )
    }

    /// Opens an update batch for swap image `swap`: buffers are mapped once
    /// and stay mapped until [`Self::end_buffer_updates`].
    pub fn begin_buffer_updates(&mut self, swap: u32) -> Result<()> {
        self.check_frame(swap)?;
        semantics::begin_buffer_updates(&mut self.structure, self.device.as_ref(), swap)?;
        Ok(())
    }

    /// Closes the update batch of swap image `swap`, flushing non-coherent
    /// memory.
    pub fn end_buffer_updates(&mut self, swap: u32) -> Result<()> {
        self.check_frame(swap)?;
        semantics::end_buffer_updates(&mut self.structure, self.device.as_ref(), swap)
    }

    /// Writes an effect-scope buffer entry.
    ///
    /// # Returns
    ///
    /// `false` when the effect has no such entry or the value does not fit it.
    pub fn update_buffer_entry_effect_semantic(
        &mut self,
        effect: EffectId,
        semantic: &str,
        value: &TypedMem,
        swap: u32,
    ) -> Result<bool> {
        self.update_buffer_entry_effect_semantics(effect, &[(semantic, value)], swap)
    }

    /// Writes several effect-scope buffer entries in one batch. Returns `true`
    /// if every value was written.
    pub fn update_buffer_entry_effect_semantics(
        &mut self,
        effect: EffectId,
        values: &[(&str, &TypedMem)],
        swap: u32,
    ) -> Result<bool> {
        self.check_frame(swap)?;
        let render_effect = self.effect_ref(effect)?;
        let mut writes = Vec::with_capacity(values.len());
        let mut all = true;
        for &(semantic, value) in values {
            let location = render_effect
                .buffer_entry_semantics
                .get(&semantic.to_ascii_uppercase())
                .copied();
            match location {
                Some(location) if self.entry_accepts(location, semantic, value) => {
                    writes.push((location, 0, value));
                }
                found => {
                    if found.is_none() {
                        log::debug!("Effect {} has no buffer entry '{}'", effect.0, semantic);
                    }
                    all = false;
                }
            }
        }
        self.write_entries(effect, swap, &writes)?;
        Ok(all)
    }

    /// Writes a model-scope buffer entry of a pipeline, in the slice of
    /// `model` when the buffer is bound dynamically.
    pub fn update_buffer_entry_model_semantic(
        &mut self,
        pipeline: PipelineIndex,
        model: ModelId,
        semantic: &str,
        value: &TypedMem,
        swap: u32,
    ) -> Result<bool> {
        self.update_buffer_entry_model_semantics(pipeline, model, &[(semantic, value)], swap)
    }

    /// Writes several model-scope buffer entries in one batch.
    pub fn update_buffer_entry_model_semantics(
        &mut self,
        pipeline: PipelineIndex,
        model: ModelId,
        values: &[(&str, &TypedMem)],
        swap: u32,
    ) -> Result<bool> {
        self.check_frame(swap)?;
        let p = self.pipeline_ref(pipeline)?;
        let mut writes = Vec::with_capacity(values.len());
        let mut all = true;
        for &(semantic, value) in values {
            let target = p
                .buffer_entry_semantics
                .get(&semantic.to_ascii_uppercase())
                .filter(|e| e.scope == VariableScope::Model)
                .and_then(|e| {
                    let client = if e.dynamic {
                        self.structure[e.location.buffer].model_client(model)?
                    } else {
                        0
                    };
                    Some((e.location, client))
                });
            match target {
                Some((location, client)) if self.entry_accepts(location, semantic, value) => {
                    writes.push((location, client, value));
                }
                _ => all = false,
            }
        }
        let effect = p.effect;
        self.write_entries(effect, swap, &writes)?;
        Ok(all)
    }

    /// Writes a node-scope or bone-batch-scope buffer entry in the slice of
    /// `node`.
    pub fn update_buffer_entry_node_semantic(
        &mut self,
        node: NodeIndex,
        semantic: &str,
        value: &TypedMem,
        swap: u32,
    ) -> Result<bool> {
        self.update_buffer_entry_node_semantics(node, &[(semantic, value)], swap)
    }

    /// Writes several node-scope buffer entries of one node in one batch.
    pub fn update_buffer_entry_node_semantics(
        &mut self,
        node: NodeIndex,
        values: &[(&str, &TypedMem)],
        swap: u32,
    ) -> Result<bool> {
        self.check_frame(swap)?;
        let n = self.node_ref(node)?;
        let p = &self.structure[n.pipeline];
        let mut writes = Vec::with_capacity(values.len());
        let mut all = true;
        for &(semantic, value) in values {
            let target = p
                .buffer_entry_semantics
                .get(&semantic.to_ascii_uppercase())
                .filter(|e| matches!(e.scope, VariableScope::Node | VariableScope::BoneBatch))
                .and_then(|e| node_client(n, e).map(|client| (e.location, client)));
            match target {
                Some((location, client)) if self.entry_accepts(location, semantic, value) => {
                    writes.push((location, client, value));
                }
                _ => all = false,
            }
        }
        let effect = p.effect;
        self.write_entries(effect, swap, &writes)?;
        Ok(all)
    }

    /// Sets an effect-scope uniform mirror.
    ///
    /// # Returns
    ///
    /// `false` when the effect has no such uniform or the value's type and
    /// element count differ from it.
    pub fn update_uniform_effect_semantic(
        &mut self,
        effect: EffectId,
        semantic: &str,
        value: &TypedMem,
    ) -> Result<bool> {
        let e = self
            .structure
            .effects
            .get_mut(effect.0)
            .ok_or(RenderManagerError::UnknownEffect(effect))?;
        Ok(copy_uniform(&mut e.uniform_semantics, semantic, value))
    }

    /// Sets a model-scope uniform mirror of a pipeline.
    pub fn update_uniform_model_semantic(
        &mut self,
        pipeline: PipelineIndex,
        semantic: &str,
        value: &TypedMem,
    ) -> Result<bool> {
        let p = self
            .structure
            .pipelines
            .get_mut(pipeline.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "pipeline",
                index: pipeline.0,
            })?;
        Ok(copy_uniform(&mut p.uniform_semantics, semantic, value))
    }

    /// Sets a node-scope uniform mirror.
    pub fn update_uniform_node_semantic(
        &mut self,
        node: NodeIndex,
        semantic: &str,
        value: &TypedMem,
    ) -> Result<bool> {
        let n = self
            .structure
            .nodes
            .get_mut(node.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "node",
                index: node.0,
            })?;
        Ok(copy_uniform(&mut n.uniform_semantics, semantic, value))
    }

    fn entry_accepts(&self, location: BufferEntryLocation, semantic: &str, value: &TypedMem) -> bool {
        let definition = &self.structure[location.buffer];
        let Some(entry) = definition.memory.entry(location.entry) else {
            return false;
        };
        let accepted = entry.accepts(value);
        if !accepted {
            log::warn!(
                "Value for '{}' in buffer '{}' is {:?}[{}]; the entry holds {:?}[{}]",
                semantic,
                definition.name,
                value.datatype(),
                value.array_elements(),
                entry.datatype,
                entry.array_elements
            );
        }
        accepted
    }

    /// Writes entries of one effect's buffers, inside the open update batch of
    /// `swap` or a batch of its own.
    fn write_entries(
        &mut self,
        effect: EffectId,
        swap: u32,
        writes: &[(BufferEntryLocation, u32, &TypedMem)],
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let device: &dyn GraphicsDevice = self.device.as_ref();
        let s = &mut self.structure;
        let opened = !s[effect].is_updating[swap as usize];
        if opened {
            semantics::begin_effect_updates(s, device, effect, swap)?;
        }
        let mut bytes = Vec::new();
        let written = writes.iter().try_for_each(|&(location, client, value)| {
            s[location.buffer]
                .write_entry(device, swap, client, location.entry, value, &mut bytes)
                .map_err(|source| RenderManagerError::BufferUpdate {
                    buffer: location.buffer,
                    source,
                })
        });
        let closed = if opened {
            semantics::end_effect_updates(s, device, effect, swap)
        } else {
            Ok(())
        };
        written.and(closed)
    }

    // --- Runtime clients ---

    /// Hands out one of the reserved dynamic slices of an effect buffer.
    ///
    /// # Errors
    ///
    /// * `Allocation(Exhausted)` when every reserved slice is in use.
    /// * `UnknownBuffer` when the effect has no such buffer.
    /// * `NotBuilt` before compilation.
    pub fn acquire_dynamic_client(&mut self, effect: EffectId, buffer: &str) -> Result<RuntimeClient> {
        if !self.built {
            return Err(RenderManagerError::NotBuilt);
        }
        let index = self.find_buffer(effect, buffer)?;
        let client = self.structure[index].pool.acquire()?;
        log::trace!("Acquired dynamic client {} of buffer '{}'", client, buffer);
        Ok(RuntimeClient {
            buffer: index,
            client,
        })
    }

    /// Returns a reserved slice to its buffer.
    ///
    /// # Errors
    ///
    /// `Allocation(NotAcquired)` when the client is not currently handed out.
    pub fn release_dynamic_client(&mut self, client: RuntimeClient) -> Result<()> {
        let definition = self
            .structure
            .buffers
            .get_mut(client.buffer.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "buffer",
                index: client.buffer.0,
            })?;
        definition.pool.release(client.client)?;
        Ok(())
    }

    /// The slice a runtime client writes for swap image `swap`; its offset is
    /// the dynamic offset to bind.
    pub fn dynamic_client_slice(&self, client: RuntimeClient, swap: u32) -> Result<DynamicSlice> {
        self.check_frame(swap)?;
        let definition = self.buffer(client.buffer)?;
        Ok(definition.slice(swap, client.client))
    }

    /// Writes entries of a buffer in the slice of a runtime client.
    pub fn update_buffer_entry_client_semantics(
        &mut self,
        client: RuntimeClient,
        values: &[(&str, &TypedMem)],
        swap: u32,
    ) -> Result<bool> {
        self.check_frame(swap)?;
        let definition = self.buffer(client.buffer)?;
        let effect = definition.effect;
        let mut writes = Vec::with_capacity(values.len());
        let mut all = true;
        for &(semantic, value) in values {
            let location = definition
                .memory
                .entry_index(semantic)
                .map(|entry| BufferEntryLocation {
                    buffer: client.buffer,
                    entry,
                });
            match location {
                Some(location) if self.entry_accepts(location, semantic, value) => {
                    writes.push((location, client.client, value));
                }
                _ => all = false,
            }
        }
        self.write_entries(effect, swap, &writes)?;
        Ok(all)
    }

    // --- Recording ---

    fn recording(&self, swap: u32) -> Result<Recording<'_>> {
        self.check_frame(swap)?;
        Ok(Recording {
            structure: &self.structure,
            swap,
            log_commands: self.settings.log_rendering_commands,
        })
    }

    /// Records every pass of every effect for swap image `swap`.
    ///
    /// # Arguments
    ///
    /// * `recorder` - Receives the commands.
    /// * `swap` - The swap image recorded for.
    /// * `begin_end_render_pass` - Wrap each pass in begin/end render pass.
    /// * `push_uniforms` - Push the uniforms declared as push constants.
    pub fn record_all_rendering_commands(
        &self,
        recorder: &mut dyn CommandRecorder,
        swap: u32,
        begin_end_render_pass: bool,
        push_uniforms: bool,
    ) -> Result<()> {
        self.recording(swap)?
            .record_all(recorder, begin_end_render_pass, push_uniforms);
        Ok(())
    }

    /// Records one pass of an effect.
    pub fn record_pass_commands(
        &self,
        recorder: &mut dyn CommandRecorder,
        effect: EffectId,
        pass: usize,
        swap: u32,
        begin_end_render_pass: bool,
        push_uniforms: bool,
    ) -> Result<()> {
        let pass = self.pass_index(effect, pass)?;
        self.recording(swap)?
            .record_pass(recorder, pass, begin_end_render_pass, push_uniforms);
        Ok(())
    }

    /// Records one subpass group. Render pass begin/end and subpass changes are
    /// the caller's business.
    pub fn record_subpass_group_commands(
        &self,
        recorder: &mut dyn CommandRecorder,
        effect: EffectId,
        pass: usize,
        subpass: usize,
        group: usize,
        swap: u32,
        push_uniforms: bool,
    ) -> Result<()> {
        let group = self.group_index(effect, pass, subpass, group)?;
        self.recording(swap)?
            .record_group(recorder, group, push_uniforms);
        Ok(())
    }

    /// Records the commands of a single node, choosing which to emit.
    pub fn record_node_commands(
        &self,
        recorder: &mut dyn CommandRecorder,
        node: NodeIndex,
        swap: u32,
        commands: NodeCommands,
    ) -> Result<()> {
        self.node_ref(node)?;
        self.recording(swap)?.record_node(recorder, node, commands);
        Ok(())
    }

    // --- Lookups ---

    fn effect_ref(&self, effect: EffectId) -> Result<&RenderEffect> {
        self.structure
            .effect(effect)
            .ok_or(RenderManagerError::UnknownEffect(effect))
    }

    fn pipeline_ref(&self, pipeline: PipelineIndex) -> Result<&RenderPipeline> {
        self.structure
            .pipelines
            .get(pipeline.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "pipeline",
                index: pipeline.0,
            })
    }

    fn node_ref(&self, node: NodeIndex) -> Result<&RenderNode> {
        self.structure
            .nodes
            .get(node.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "node",
                index: node.0,
            })
    }

    /// A buffer definition.
    pub fn buffer(&self, index: BufferIndex) -> Result<&BufferDefinition> {
        self.structure
            .buffers
            .get(index.0)
            .ok_or(RenderManagerError::InvalidIndex {
                kind: "buffer",
                index: index.0,
            })
    }

    /// Finds an effect buffer by name.
    pub fn find_buffer(&self, effect: EffectId, name: &str) -> Result<BufferIndex> {
        let e = self.effect_ref(effect)?;
        self.structure
            .find_buffer(effect, name)
            .ok_or_else(|| RenderManagerError::UnknownBuffer {
                effect: e.description.name.clone(),
                buffer: name.to_string(),
            })
    }

    /// Finds the pipeline `name` instantiated in a subpass group. Pipelines are
    /// instantiated by compilation, for groups that draw at least one node
    /// with them.
    pub fn find_pipeline(
        &self,
        effect: EffectId,
        pass: usize,
        subpass: usize,
        group: usize,
        name: &str,
    ) -> Result<PipelineIndex> {
        let group = self.group_index(effect, pass, subpass, group)?;
        self.structure
            .find_pipeline(group, name)
            .ok_or_else(|| RenderManagerError::UnknownPipeline {
                effect: self.structure[effect].description.name.clone(),
                pipeline: name.to_string(),
            })
    }

    fn invalid_path(&self, effect: EffectId, what: &'static str, index: usize) -> RenderManagerError {
        RenderManagerError::InvalidPath {
            effect: self.structure[effect].description.name.clone(),
            what,
            index,
        }
    }

    fn pass_index(&self, effect: EffectId, pass: usize) -> Result<PassIndex> {
        self.effect_ref(effect)?
            .passes
            .get(pass)
            .copied()
            .ok_or_else(|| self.invalid_path(effect, "pass", pass))
    }

    fn subpass_index(&self, effect: EffectId, pass: usize, subpass: usize) -> Result<SubpassIndex> {
        let pass = self.pass_index(effect, pass)?;
        self.structure[pass]
            .subpasses
            .get(subpass)
            .copied()
            .ok_or_else(|| self.invalid_path(effect, "subpass", subpass))
    }

    fn group_index(&self, effect: EffectId, pass: usize, subpass: usize, group: usize) -> Result<GroupIndex> {
        let subpass = self.subpass_index(effect, pass, subpass)?;
        self.structure[subpass]
            .groups
            .get(group)
            .copied()
            .ok_or_else(|| self.invalid_path(effect, "subpass group", group))
    }
}

impl Drop for RenderManager {
    fn drop(&mut self) {
        let device = self.device.as_ref();
        for pipeline in self.structure.pipelines.iter().filter_map(|p| p.api_pipeline) {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to destroy pipeline {:?}: {}", pipeline, e);
            }
        }
        let effect_buffers = self.structure.buffers.iter().filter_map(BufferDefinition::buffer);
        let mesh_buffers = self.structure.meshes.iter().flat_map(|mesh| {
            mesh.vbos
                .iter()
                .flatten()
                .copied()
                .chain(mesh.ibo.map(|(id, _)| id))
        });
        for buffer in effect_buffers.chain(mesh_buffers) {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy buffer {:?}: {}", buffer, e);
            }
        }
    }
}

// --- Compilation helpers ---

fn validate_effect(description: &EffectDescription) -> Result<()> {
    let groups = description
        .passes
        .iter()
        .flat_map(|p| &p.subpasses)
        .flat_map(|s| &s.groups);
    for group in groups {
        for name in &group.pipelines {
            if description.pipeline_index(name).is_none() {
                return Err(RenderManagerError::UnknownPipeline {
                    effect: description.name.clone(),
                    pipeline: name.clone(),
                });
            }
        }
    }
    for pipeline in &description.pipelines {
        for buffer_ref in &pipeline.buffers {
            if description.buffer_index(&buffer_ref.buffer).is_none() {
                return Err(RenderManagerError::UnknownBuffer {
                    effect: description.name.clone(),
                    buffer: buffer_ref.buffer.clone(),
                });
            }
        }
        check_layouts(pipeline)?;
    }
    Ok(())
}

fn instantiate_group(s: &mut RenderStructure, group: GroupIndex) -> Result<()> {
    let models = s[group].models.clone();
    for model in models {
        let mesh_nodes = s[model].model.mesh_nodes().to_vec();
        for asset_node in mesh_nodes {
            instantiate_mesh_node(s, group, model, asset_node)?;
        }
    }
    Ok(())
}

/// Selects the pipeline a mesh node is drawn with in `group` and creates its
/// render nodes, one per bone batch.
fn instantiate_mesh_node(
    s: &mut RenderStructure,
    group: GroupIndex,
    model: ModelId,
    asset_node: usize,
) -> Result<()> {
    let effect = s[s[s[group].subpass].pass].effect;
    let Some(NodeObject::Mesh {
        mesh: asset_mesh,
        material,
    }) = s[model].model.node(asset_node).map(|n| n.object)
    else {
        return Ok(());
    };

    let selected = {
        let m = &s[model].model;
        let Some(mesh) = m.mesh(asset_mesh) else {
            log::warn!("Node {} of model {} references missing mesh {}", asset_node, model.0, asset_mesh);
            return Ok(());
        };
        let fallback;
        let mat = match m.material(material) {
            Some(mat) => mat,
            None => {
                fallback = Material::new("");
                &fallback
            }
        };
        select_pipeline(&s[effect].description, &s[group].pipeline_names, mesh, mat).map(
            |(description, pipeline)| {
                (
                    description,
                    pipeline.name.clone(),
                    mesh.topology(),
                    mesh.num_bone_batches().max(1),
                )
            },
        )
    };
    let Some((description, name, topology, batches)) = selected else {
        log::info!(
            "No pipeline of group '{}' can draw node {} of model {}",
            s[group].name,
            asset_node,
            model.0
        );
        return Ok(());
    };

    let pipeline = instantiate_pipeline(s, group, description, &name);
    s[pipeline].topology = topology;
    let group_model = group_model_for(s, group, model);
    let material_pipeline = material_pipeline_for(s, group_model, pipeline, material);
    let mesh = s[model].meshes[asset_mesh];
    s[mesh].pipelines.insert((effect, name));

    let mut node_uniforms = Vec::new();
    for uniform in s
        .pipeline_description(pipeline)
        .uniforms
        .iter()
        .filter(|u| matches!(u.scope, VariableScope::Node | VariableScope::BoneBatch))
    {
        add_uniform(&mut node_uniforms, uniform);
    }

    for batch in 0..batches {
        let node = NodeIndex(s.nodes.len());
        s.nodes.push(RenderNode {
            group_model,
            pipeline,
            material_pipeline,
            mesh,
            model,
            asset_node,
            batch,
            dynamic_clients: Default::default(),
            dynamic_offsets: Default::default(),
            uniform_semantics: node_uniforms.clone(),
            buffer_bindings: Vec::new(),
            uniform_bindings: Vec::new(),
        });
        s[group_model].nodes.push(node);
        add_node_dynamic_clients(s, node)?;
    }
    Ok(())
}

/// The pipeline `name` of `group`, instantiated on first use.
fn instantiate_pipeline(
    s: &mut RenderStructure,
    group: GroupIndex,
    description: usize,
    name: &str,
) -> PipelineIndex {
    if let Some(pipeline) = s.find_pipeline(group, name) {
        return pipeline;
    }
    let effect = s[s[s[group].subpass].pass].effect;
    let desc = &s[effect].description.pipelines[description];

    let mut buffer_entry_semantics = AHashMap::new();
    for buffer_ref in &desc.buffers {
        let Some(buffer) = s.find_buffer(effect, &buffer_ref.buffer) else {
            continue;
        };
        let definition = &s[buffer];
        if definition.scope == VariableScope::Effect {
            continue;
        }
        for (entry, e) in definition.memory.entries().iter().enumerate() {
            buffer_entry_semantics.insert(
                e.semantic.clone(),
                PipelineBufferEntry {
                    location: BufferEntryLocation { buffer, entry },
                    scope: definition.scope,
                    set: buffer_ref.set,
                    binding: buffer_ref.binding,
                    dynamic: buffer_ref.descriptor_type.is_dynamic(),
                },
            );
        }
    }
    let mut uniform_semantics: Vec<UniformSemantic> = Vec::new();
    for uniform in desc.uniforms.iter().filter(|u| u.scope == VariableScope::Model) {
        add_uniform(&mut uniform_semantics, uniform);
    }

    let pipeline = PipelineIndex(s.pipelines.len());
    s.pipelines.push(RenderPipeline {
        effect,
        group,
        name: name.to_string(),
        description,
        api_pipeline: None,
        topology: PrimitiveTopology::default(),
        buffer_entry_semantics,
        uniform_semantics,
        model_buffer_bindings: Vec::new(),
        model_uniform_bindings: Vec::new(),
        material_pipelines: Vec::new(),
    });
    s[group].pipelines.push(pipeline);
    log::debug!("Instantiated pipeline '{}' in group '{}'", name, s[group].name);
    pipeline
}

fn group_model_for(s: &mut RenderStructure, group: GroupIndex, model: ModelId) -> GroupModelIndex {
    if let Some(&existing) = s[group].group_models.iter().find(|&&gm| s[gm].model == model) {
        return existing;
    }
    let group_model = GroupModelIndex(s.group_models.len());
    s.group_models.push(SubpassGroupModel {
        group,
        model,
        nodes: Vec::new(),
        material_pipelines: Vec::new(),
    });
    s[group].group_models.push(group_model);
    group_model
}

fn material_pipeline_for(
    s: &mut RenderStructure,
    group_model: GroupModelIndex,
    pipeline: PipelineIndex,
    material: usize,
) -> MaterialPipelineIndex {
    let existing = s[group_model]
        .material_pipelines
        .iter()
        .copied()
        .find(|&mp| s[mp].pipeline == pipeline && s[mp].material == material);
    if let Some(existing) = existing {
        return existing;
    }
    let material_pipeline = MaterialPipelineIndex(s.material_pipelines.len());
    s.material_pipelines.push(MaterialPipeline {
        group_model,
        pipeline,
        material,
        sets: Default::default(),
    });
    s[group_model].material_pipelines.push(material_pipeline);
    s[pipeline].material_pipelines.push(material_pipeline);
    material_pipeline
}

fn create_api_pipelines(s: &mut RenderStructure, device: &dyn GraphicsDevice) -> Result<()> {
    let RenderStructure {
        effects, pipelines, ..
    } = s;
    for pipeline in pipelines.iter_mut() {
        let effect = &effects[pipeline.effect.0];
        let desc = &effect.description.pipelines[pipeline.description];
        let vertex_buffers = effect
            .pipeline_layouts
            .get(&pipeline.description)
            .map(|layout| layout.vertex_buffer_layouts(desc))
            .unwrap_or_default();
        let id = device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(Cow::Borrowed(pipeline.name.as_str())),
                state: desc.state,
                layout: desc.layout,
                vertex_buffers,
                topology: pipeline.topology,
            })
            .map_err(|e| RenderManagerError::creation(format!("pipeline '{}'", pipeline.name), e))?;
        pipeline.api_pipeline = Some(id);
    }
    Ok(())
}

/// The client of `node` in the buffer holding `entry`: its dynamic client for
/// dynamically bound buffers, the only client otherwise.
fn node_client(node: &RenderNode, entry: &PipelineBufferEntry) -> Option<u32> {
    if !entry.dynamic {
        return Some(0);
    }
    node.dynamic_clients(entry.set as usize)
        .iter()
        .find(|c| c.buffer == entry.location.buffer && c.binding == entry.binding)
        .map(|c| c.client)
}

fn copy_uniform(mirrors: &mut [UniformSemantic], semantic: &str, value: &TypedMem) -> bool {
    let Some(index) = find_uniform(mirrors, semantic) else {
        return false;
    };
    let mirror = &mut mirrors[index];
    let copied = mirror.memory.copy_from(value);
    if !copied {
        log::warn!(
            "Value for uniform '{}' is {:?}[{}]; the uniform holds {:?}[{}]",
            mirror.semantic,
            value.datatype(),
            value.array_elements(),
            mirror.memory.datatype(),
            mirror.memory.array_elements()
        );
    }
    copied
}
