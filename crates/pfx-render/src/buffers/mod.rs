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

//! Effect buffers and their dynamic slices.
//!
//! A buffer holds `multi_buffers × clients` slices of one std140 block. Each
//! consumer of a dynamically bound buffer (a node, a bone batch, a model, the
//! effect itself, or a runtime client) owns one slice per swap image, addressed
//! as `slice = (multi_buffered ? swap : 0) * clients + client`.

mod slice_pool;
mod structured;

pub use self::slice_pool::DynamicSlicePool;
pub use self::structured::{
    aligned_slice_size, dynamic_alignment, StructuredEntry, StructuredMemory,
};

use crate::error::{RenderManagerError, Result};
use crate::settings::RenderManagerSettings;
use crate::structure::{
    BufferIndex, DynamicClient, EffectId, ModelId, NodeIndex, RenderStructure,
};
use pfx_core::effect::{BufferDescription, BufferRef, VariableScope, MAX_DESCRIPTOR_SETS};
use pfx_core::renderer::api::{
    BufferDescriptor, BufferId, BufferUsage, MemoryLocation, TypedMem,
};
use pfx_core::renderer::{GraphicsDevice, ResourceError};
use std::borrow::Cow;

/// A dynamic slice: the region of a buffer one client writes for one swap image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicSlice {
    /// The slice index within the buffer.
    pub slice: u32,
    /// The byte offset of the slice.
    pub offset: u64,
}

/// A runtime client acquired with `RenderManager::acquire_dynamic_client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeClient {
    /// The buffer the client writes.
    pub buffer: BufferIndex,
    /// The client slot.
    pub client: u32,
}

/// A buffer an effect allocates, with its layout and slicing.
#[derive(Debug)]
pub struct BufferDefinition {
    pub(crate) effect: EffectId,
    pub(crate) name: String,
    pub(crate) scope: VariableScope,
    pub(crate) usage: BufferUsage,
    pub(crate) multi_buffered: bool,
    pub(crate) reserved_clients: u32,
    pub(crate) memory: StructuredMemory,
    pub(crate) num_multi_buffers: u32,
    pub(crate) num_dynamic_clients: u32,
    pub(crate) model_clients: Vec<ModelId>,
    pub(crate) aligned_slice_size: u64,
    pub(crate) buffer: Option<BufferId>,
    pub(crate) pool: DynamicSlicePool,
    /// Open update batches sharing a mapping the manager made.
    pub(crate) update_maps: u32,
}

impl BufferDefinition {
    pub(crate) fn new(effect: EffectId, description: &BufferDescription) -> Self {
        Self {
            effect,
            name: description.name.clone(),
            scope: description.scope,
            usage: description.usage,
            multi_buffered: description.multi_buffered,
            reserved_clients: description.reserved_clients,
            memory: StructuredMemory::from_description(description),
            num_multi_buffers: 1,
            num_dynamic_clients: 0,
            model_clients: Vec::new(),
            aligned_slice_size: 0,
            buffer: None,
            pool: DynamicSlicePool::default(),
            update_maps: 0,
        }
    }

    /// The buffer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope of the buffer's entries.
    pub fn scope(&self) -> VariableScope {
        self.scope
    }

    /// The std140 layout of one slice.
    pub fn memory(&self) -> &StructuredMemory {
        &self.memory
    }

    /// The backend buffer, once created.
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Size of one slice, rounded up to the dynamic offset alignment.
    pub fn aligned_slice_size(&self) -> u64 {
        self.aligned_slice_size
    }

    /// Number of copies kept (the swapchain length, or 1).
    pub fn num_multi_buffers(&self) -> u32 {
        self.num_multi_buffers
    }

    /// Clients assigned while compiling.
    pub fn num_dynamic_clients(&self) -> u32 {
        self.num_dynamic_clients
    }

    /// Slices per copy: compile-time clients plus reserved runtime clients, at
    /// least one.
    pub fn total_clients(&self) -> u32 {
        (self.num_dynamic_clients + self.reserved_clients).max(1)
    }

    /// Total size of the backend buffer.
    pub fn total_size(&self) -> u64 {
        self.aligned_slice_size * self.num_multi_buffers as u64 * self.total_clients() as u64
    }

    /// The slice `client` writes for swap image `swap`.
    pub fn slice(&self, swap: u32, client: u32) -> DynamicSlice {
        let copy = if self.multi_buffered { swap } else { 0 };
        let slice = copy * self.total_clients() + client;
        DynamicSlice {
            slice,
            offset: slice as u64 * self.aligned_slice_size,
        }
    }

    /// Assigns the next node client.
    pub(crate) fn register_node_client(&mut self) -> u32 {
        let client = self.num_dynamic_clients;
        self.num_dynamic_clients += 1;
        client
    }

    /// Bone batches share a slice per batch index across nodes.
    pub(crate) fn register_batch_client(&mut self, batch: u32) -> u32 {
        self.num_dynamic_clients = self.num_dynamic_clients.max(batch + 1);
        batch
    }

    pub(crate) fn register_effect_client(&mut self) -> u32 {
        self.num_dynamic_clients = self.num_dynamic_clients.max(1);
        0
    }

    /// One client per model, in order of first reference.
    pub(crate) fn register_model_client(&mut self, model: ModelId) -> u32 {
        match self.model_clients.iter().position(|&m| m == model) {
            Some(i) => i as u32,
            None => {
                self.model_clients.push(model);
                self.num_dynamic_clients = self.num_dynamic_clients.max(self.model_clients.len() as u32);
                self.model_clients.len() as u32 - 1
            }
        }
    }

    /// The client of a model, if the model references the buffer.
    pub fn model_client(&self, model: ModelId) -> Option<u32> {
        self.model_clients
            .iter()
            .position(|&m| m == model)
            .map(|i| i as u32)
    }

    /// Writes `value` to member `entry` of the slice `(swap, client)`.
    ///
    /// The buffer must be mapped (see `RenderManager::begin_buffer_updates`).
    pub(crate) fn write_entry(
        &self,
        device: &dyn GraphicsDevice,
        swap: u32,
        client: u32,
        entry: usize,
        value: &TypedMem,
        scratch: &mut Vec<u8>,
    ) -> std::result::Result<(), ResourceError> {
        let buffer = self.buffer.ok_or(ResourceError::InvalidHandle)?;
        let entry = self.memory.entry(entry).ok_or(ResourceError::OutOfBounds)?;
        value.write_std140(entry.array_elements, scratch);
        let offset = self.slice(swap, client).offset + entry.offset;
        device.write_buffer(buffer, offset, scratch)
    }
}

/// Assigns the dynamic clients of a freshly created node.
///
/// The pipeline's dynamic buffer bindings are visited in (set, binding) order.
pub(crate) fn add_node_dynamic_clients(
    structure: &mut RenderStructure,
    node: NodeIndex,
) -> Result<()> {
    let (effect, model, batch) = {
        let n = &structure[node];
        (structure[n.pipeline].effect, n.model, n.batch)
    };
    let mut refs: Vec<BufferRef> = structure
        .pipeline_description(structure[node].pipeline)
        .buffers
        .iter()
        .filter(|b| b.descriptor_type.is_dynamic())
        .cloned()
        .collect();
    refs.sort_by_key(|b| (b.set, b.binding));

    let mut clients: [Vec<DynamicClient>; MAX_DESCRIPTOR_SETS] = Default::default();
    for buffer_ref in &refs {
        let set = buffer_ref.set as usize;
        if set >= MAX_DESCRIPTOR_SETS {
            continue;
        }
        let buffer = structure.find_buffer(effect, &buffer_ref.buffer).ok_or_else(|| {
            RenderManagerError::UnknownBuffer {
                effect: structure[effect].description.name.clone(),
                buffer: buffer_ref.buffer.clone(),
            }
        })?;
        let definition = &mut structure[buffer];
        let client = match definition.scope {
            VariableScope::Node => definition.register_node_client(),
            VariableScope::BoneBatch => definition.register_batch_client(batch),
            VariableScope::Effect => definition.register_effect_client(),
            VariableScope::Model => definition.register_model_client(model),
        };
        clients[set].push(DynamicClient {
            buffer,
            binding: buffer_ref.binding,
            client,
        });
    }
    structure[node].dynamic_clients = clients;
    Ok(())
}

/// Allocates every effect buffer, then caches the dynamic offsets of every node.
pub(crate) fn create_buffers(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    settings: &RenderManagerSettings,
) -> Result<()> {
    let limits = device.limits();
    for definition in &mut structure.buffers {
        definition.num_multi_buffers = if definition.multi_buffered {
            settings.swapchain_length
        } else {
            1
        };
        definition.aligned_slice_size =
            aligned_slice_size(definition.memory.size(), definition.usage, &limits);
        definition.pool = DynamicSlicePool::new(
            definition.name.clone(),
            definition.num_dynamic_clients,
            definition.reserved_clients,
        );

        let size = definition.total_size();
        let id = device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed(definition.name.as_str())),
                size,
                usage: definition.usage | BufferUsage::COPY_DST,
                location: MemoryLocation::HostVisible,
                mapped_at_creation: true,
            })
            .map_err(|e| RenderManagerError::creation(format!("buffer '{}'", definition.name), e))?;
        if settings.log_buffer_creation {
            log::debug!(
                "Created buffer '{}': {} bytes = slice {} x {} copies x {} clients",
                definition.name,
                size,
                definition.aligned_slice_size,
                definition.num_multi_buffers,
                definition.total_clients()
            );
        }
        definition.buffer = Some(id);
    }
    fix_dynamic_offsets(structure, settings.swapchain_length)
}

/// The dynamic offset of `client` in swap image `swap`, as bound by the
/// recorder. Offsets past `u32::MAX` cannot be bound.
pub(crate) fn dynamic_offset(definition: &BufferDefinition, swap: u32, client: u32) -> Result<u32> {
    let offset = definition.slice(swap, client).offset;
    u32::try_from(offset).map_err(|_| {
        RenderManagerError::creation(
            format!(
                "dynamic offset {offset} of buffer '{}' (client {client}, swap {swap})",
                definition.name
            ),
            ResourceError::OutOfBounds,
        )
    })
}

/// Caches, per node, per set and per swap image, the byte offsets to bind.
pub(crate) fn fix_dynamic_offsets(structure: &mut RenderStructure, swapchain_length: u32) -> Result<()> {
    for node_index in 0..structure.nodes.len() {
        let mut offsets: [Vec<Vec<u32>>; MAX_DESCRIPTOR_SETS] = Default::default();
        for (set, clients) in structure.nodes[node_index].dynamic_clients.iter().enumerate() {
            if clients.is_empty() {
                continue;
            }
            offsets[set] = (0..swapchain_length)
                .map(|swap| {
                    clients
                        .iter()
                        .map(|c| dynamic_offset(&structure[c.buffer], swap, c.client))
                        .collect::<Result<Vec<u32>>>()
                })
                .collect::<Result<_>>()?;
        }
        structure.nodes[node_index].dynamic_offsets = offsets;
    }
    Ok(())
}
