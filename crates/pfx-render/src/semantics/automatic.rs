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

//! Compile-time resolution of automatic semantics and the per-frame update.

use super::producers::{ModelContext, NodeContext};
use super::{
    ModelBufferBinding, ModelUniformBinding, NodeBufferBinding, NodeUniformBinding,
    SemanticProducer, SemanticRegistry,
};
use crate::buffers::BufferDefinition;
use crate::error::{RenderManagerError, Result};
use crate::structure::{
    BufferIndex, EffectId, NodeIndex, PipelineBufferEntry, PipelineIndex, RenderStructure,
};
use pfx_core::asset::Material;
use pfx_core::effect::VariableScope;
use pfx_core::renderer::api::{GpuDatatype, TypedMem};
use pfx_core::renderer::GraphicsDevice;

/// Resolves a name used by a node-scope slot: a node semantic first, then a
/// model semantic, then a constant from the node's material.
pub(crate) fn resolve_node_producer(
    semantic: &str,
    material: Option<&Material>,
) -> Option<SemanticProducer> {
    let registry = SemanticRegistry::global();
    registry
        .node_producer(semantic)
        .map(SemanticProducer::Node)
        .or_else(|| registry.model_producer(semantic).map(SemanticProducer::Model))
        .or_else(|| {
            material
                .and_then(|m| m.semantic(semantic))
                .cloned()
                .map(SemanticProducer::Constant)
        })
}

fn datatype_matches(semantic: &str, produced: GpuDatatype, declared: GpuDatatype) -> bool {
    if produced != declared {
        log::warn!(
            "Semantic '{semantic}' produces {produced:?} but the slot is declared as {declared:?}; skipping it"
        );
        return false;
    }
    true
}

/// Entries of `scopes` visible to a pipeline, ordered by buffer then entry.
fn sorted_entries(
    structure: &RenderStructure,
    pipeline: PipelineIndex,
    scopes: &[VariableScope],
) -> Vec<(String, PipelineBufferEntry)> {
    let mut entries: Vec<_> = structure[pipeline]
        .buffer_entry_semantics
        .iter()
        .filter(|(_, e)| scopes.contains(&e.scope))
        .map(|(name, e)| (name.clone(), *e))
        .collect();
    entries.sort_by_key(|(_, e)| (e.location.buffer, e.location.entry));
    entries
}

fn declared_datatype(structure: &RenderStructure, entry: &PipelineBufferEntry) -> Option<GpuDatatype> {
    structure[entry.location.buffer]
        .memory
        .entry(entry.location.entry)
        .map(|e| e.datatype)
}

/// Builds every automatic binding from scratch. Running it again yields the same
/// binding lists.
pub(crate) fn create_automatic_semantics(structure: &mut RenderStructure) {
    for pipeline in 0..structure.pipelines.len() {
        create_model_bindings(structure, PipelineIndex(pipeline));
    }
    for node in 0..structure.nodes.len() {
        create_node_bindings(structure, NodeIndex(node));
    }
}

fn create_model_bindings(structure: &mut RenderStructure, pipeline: PipelineIndex) {
    let registry = SemanticRegistry::global();
    let group = structure[pipeline].group;
    let models = structure[group].models.clone();

    let mut buffer_bindings = Vec::new();
    for (semantic, entry) in sorted_entries(structure, pipeline, &[VariableScope::Model]) {
        let Some(producer) = registry.model_producer(&semantic) else {
            log::info!(
                "Model semantic '{semantic}' of pipeline '{}' is not automatic; the application must set it",
                structure[pipeline].name
            );
            continue;
        };
        let Some(declared) = declared_datatype(structure, &entry) else {
            continue;
        };
        if !datatype_matches(&semantic, producer.datatype(), declared) {
            continue;
        }
        let definition = &structure[entry.location.buffer];
        let targets: Vec<_> = if entry.dynamic {
            models
                .iter()
                .filter_map(|&m| definition.model_client(m).map(|client| (m, client)))
                .collect()
        } else {
            models.first().map(|&m| (m, 0)).into_iter().collect()
        };
        for (model, client) in targets {
            buffer_bindings.push(ModelBufferBinding {
                producer,
                model,
                buffer: entry.location.buffer,
                entry: entry.location.entry,
                client,
                scratch: TypedMem::new(declared, 1),
            });
        }
    }

    let mut uniform_bindings = Vec::new();
    if let Some(&model) = models.first() {
        for (uniform, mirror) in structure[pipeline].uniform_semantics.iter().enumerate() {
            let Some(producer) = registry.model_producer(&mirror.semantic) else {
                log::info!(
                    "Model uniform '{}' is not automatic; the application must set it",
                    mirror.semantic
                );
                continue;
            };
            if datatype_matches(&mirror.semantic, producer.datatype(), mirror.memory.datatype()) {
                uniform_bindings.push(ModelUniformBinding {
                    producer,
                    model,
                    uniform,
                });
            }
        }
    }

    let p = &mut structure[pipeline];
    p.model_buffer_bindings = buffer_bindings;
    p.model_uniform_bindings = uniform_bindings;
}

fn create_node_bindings(structure: &mut RenderStructure, node: NodeIndex) {
    let n = &structure[node];
    let material_index = structure[n.material_pipeline].material;
    let material = structure[n.model].model.material(material_index);
    let client_of = |buffer: BufferIndex| {
        n.dynamic_clients
            .iter()
            .flatten()
            .find(|c| c.buffer == buffer)
            .map_or(0, |c| c.client)
    };

    let mut buffer_bindings = Vec::new();
    let scopes = [VariableScope::Node, VariableScope::BoneBatch];
    for (semantic, entry) in sorted_entries(structure, n.pipeline, &scopes) {
        let Some(producer) = resolve_node_producer(&semantic, material) else {
            log::info!(
                "Semantic '{semantic}' was not found for node {node:?}; the application must set it"
            );
            continue;
        };
        let Some(declared) = declared_datatype(structure, &entry) else {
            continue;
        };
        if !datatype_matches(&semantic, producer.datatype(), declared) {
            continue;
        }
        buffer_bindings.push(NodeBufferBinding {
            producer,
            buffer: entry.location.buffer,
            entry: entry.location.entry,
            client: client_of(entry.location.buffer),
            scratch: TypedMem::new(declared, 1),
        });
    }

    let mut uniform_bindings = Vec::new();
    for (uniform, mirror) in n.uniform_semantics.iter().enumerate() {
        let Some(producer) = resolve_node_producer(&mirror.semantic, material) else {
            log::info!(
                "Uniform '{}' was not found for node {node:?}; the application must set it",
                mirror.semantic
            );
            continue;
        };
        if datatype_matches(&mirror.semantic, producer.datatype(), mirror.memory.datatype()) {
            uniform_bindings.push(NodeUniformBinding { producer, uniform });
        }
    }

    let n = &mut structure[node];
    n.buffer_bindings = buffer_bindings;
    n.uniform_bindings = uniform_bindings;
}

fn update_error(buffer: BufferIndex) -> impl FnOnce(pfx_core::renderer::ResourceError) -> RenderManagerError {
    move |source| RenderManagerError::BufferUpdate { buffer, source }
}

/// Maps the buffers of one effect for writing to swap image `swap`.
///
/// A mapping made here is shared by every swap image whose batch is open and
/// released when the last of them closes.
pub(crate) fn begin_effect_updates(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    effect: EffectId,
    swap: u32,
) -> Result<()> {
    let buffers = &structure.effects[effect.0].buffers;
    for (mapped, &index) in buffers.iter().enumerate() {
        let definition = &mut structure.buffers[index.0];
        let Some(id) = definition.buffer else {
            continue;
        };
        if definition.update_maps > 0 {
            definition.update_maps += 1;
        } else if !device.is_buffer_mapped(id) {
            if let Err(source) = device.map_buffer(id) {
                let _ = release_update_maps(&mut structure.buffers, device, &buffers[..mapped]);
                return Err(update_error(index)(source));
            }
            definition.update_maps = 1;
        }
    }
    structure.effects[effect.0].is_updating[swap as usize] = true;
    Ok(())
}

/// Drops one batch's hold on the mappings of `buffers`, unmapping those no
/// other batch still holds.
fn release_update_maps(
    definitions: &mut [BufferDefinition],
    device: &dyn GraphicsDevice,
    buffers: &[BufferIndex],
) -> Result<()> {
    let mut result = Ok(());
    for &index in buffers {
        let definition = &mut definitions[index.0];
        let Some(id) = definition.buffer else {
            continue;
        };
        if definition.update_maps == 0 {
            continue;
        }
        definition.update_maps -= 1;
        if definition.update_maps == 0 {
            let unmapped = device.unmap_buffer(id).map_err(update_error(index));
            result = result.and(unmapped);
        }
    }
    result
}

/// Flushes the writes of one effect to swap image `swap` and releases what
/// `begin_effect_updates` mapped.
///
/// The batch is closed even when a flush fails; the first error is returned.
pub(crate) fn end_effect_updates(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    effect: EffectId,
    swap: u32,
) -> Result<()> {
    let buffers = &structure.effects[effect.0].buffers;
    let mut result = Ok(());
    for &index in buffers {
        let definition = &structure.buffers[index.0];
        let Some(id) = definition.buffer else {
            continue;
        };
        let flushed = device
            .buffer_memory_properties(id)
            .and_then(|properties| {
                if properties.host_coherent {
                    return Ok(());
                }
                let (offset, size) = if definition.multi_buffered {
                    (
                        definition.slice(swap, 0).offset,
                        definition.aligned_slice_size * definition.total_clients() as u64,
                    )
                } else {
                    (0, definition.total_size())
                };
                device.flush_buffer_range(id, offset, size)
            })
            .map_err(update_error(index));
        result = result.and(flushed);
    }
    let released = release_update_maps(&mut structure.buffers, device, buffers);
    structure.effects[effect.0].is_updating[swap as usize] = false;
    result.and(released)
}

/// Opens an update batch on every effect that is not already updating `swap`.
/// Returns the effects it opened. On failure nothing stays open.
pub(crate) fn begin_buffer_updates(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    swap: u32,
) -> Result<Vec<EffectId>> {
    let mut opened = Vec::new();
    for effect in 0..structure.effects.len() {
        if structure.effects[effect].is_updating[swap as usize] {
            continue;
        }
        if let Err(err) = begin_effect_updates(structure, device, EffectId(effect), swap) {
            // The original failure is the one worth reporting.
            let _ = end_opened(structure, device, &opened, swap);
            return Err(err);
        }
        opened.push(EffectId(effect));
    }
    Ok(opened)
}

fn end_opened(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    opened: &[EffectId],
    swap: u32,
) -> Result<()> {
    opened.iter().fold(Ok(()), |result, &effect| {
        let closed = end_effect_updates(structure, device, effect, swap);
        result.and(closed)
    })
}

/// Closes the update batch of every effect updating `swap`.
pub(crate) fn end_buffer_updates(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    swap: u32,
) -> Result<()> {
    for effect in 0..structure.effects.len() {
        if structure.effects[effect].is_updating[swap as usize] {
            end_effect_updates(structure, device, EffectId(effect), swap)?;
        }
    }
    Ok(())
}

/// Evaluates every automatic binding and writes it for swap image `swap`.
pub(crate) fn update_automatic_semantics(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    screen: (u32, u32),
    swap: u32,
) -> Result<()> {
    for (i, model) in structure.models.iter().enumerate() {
        if model.model.is_dirty() {
            log::warn!(
                "Model {i} has uncommitted transform changes; call commit() before updating semantics"
            );
        }
    }

    let opened = begin_buffer_updates(structure, device, swap)?;
    let written = write_bindings(structure, device, screen, swap);
    let closed = end_opened(structure, device, &opened, swap);
    written.and(closed)
}

fn write_bindings(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    (width, height): (u32, u32),
    swap: u32,
) -> Result<()> {
    let RenderStructure {
        pipelines,
        nodes,
        models,
        meshes,
        buffers,
        ..
    } = structure;
    let mut bytes = Vec::new();

    for pipeline in pipelines.iter_mut() {
        for binding in &mut pipeline.model_buffer_bindings {
            let ctx = ModelContext::new(&models[binding.model.0].model, width, height);
            if !ctx.evaluate(binding.producer, &mut binding.scratch) {
                continue;
            }
            buffers[binding.buffer.0]
                .write_entry(device, swap, binding.client, binding.entry, &binding.scratch, &mut bytes)
                .map_err(update_error(binding.buffer))?;
        }
        for binding in &pipeline.model_uniform_bindings {
            let ctx = ModelContext::new(&models[binding.model.0].model, width, height);
            ctx.evaluate(
                binding.producer,
                &mut pipeline.uniform_semantics[binding.uniform].memory,
            );
        }
    }

    for node in nodes.iter_mut() {
        let model = &models[node.model.0].model;
        let Some(mesh) = model.mesh(meshes[node.mesh.0].asset_mesh) else {
            continue;
        };
        let ctx = NodeContext {
            model: ModelContext::new(model, width, height),
            mesh,
            asset_node: node.asset_node,
            batch: node.batch,
        };
        for binding in &mut node.buffer_bindings {
            if !ctx.produce(&binding.producer, &mut binding.scratch) {
                continue;
            }
            buffers[binding.buffer.0]
                .write_entry(device, swap, binding.client, binding.entry, &binding.scratch, &mut bytes)
                .map_err(update_error(binding.buffer))?;
        }
        for binding in &node.uniform_bindings {
            ctx.produce(
                &binding.producer,
                &mut node.uniform_semantics[binding.uniform].memory,
            );
        }
    }
    Ok(())
}
