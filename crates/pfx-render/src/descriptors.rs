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

//! Descriptor set allocation and population for every (pipeline, material) pair
//! in use.

use crate::error::{RenderManagerError, Result};
use crate::structure::{MaterialPipelineIndex, RenderStructure};
use pfx_core::effect::{PipelineDescription, MAX_DESCRIPTOR_SETS};
use pfx_core::renderer::api::{
    DescriptorResource, DescriptorSetId, DescriptorType, WriteDescriptorSet,
};
use pfx_core::renderer::{GraphicsDevice, TextureSource};

type SetsPerSlot = [Vec<DescriptorSetId>; MAX_DESCRIPTOR_SETS];

/// Returns an error if the pipeline binds anything in a set its layout does not
/// declare.
pub(crate) fn check_layouts(description: &PipelineDescription) -> Result<()> {
    let referenced = description
        .buffers
        .iter()
        .map(|b| b.set)
        .chain(description.textures.iter().map(|t| t.set))
        .chain(description.input_attachments.iter().map(|a| a.set));
    for set in referenced {
        let declared = description
            .descriptor_sets
            .get(set as usize)
            .is_some_and(Option::is_some);
        if !declared {
            return Err(RenderManagerError::MissingDescriptorSetLayout {
                pipeline: description.name.clone(),
                set,
            });
        }
    }
    Ok(())
}

/// Allocates and writes the sets of every material pipeline, then submits all
/// writes in one update.
pub(crate) fn create_descriptor_sets(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    textures: Option<&dyn TextureSource>,
    swapchain_length: u32,
) -> Result<()> {
    let mut writes = Vec::new();
    for index in 0..structure.material_pipelines.len() {
        let sets = material_pipeline_sets(
            structure,
            MaterialPipelineIndex(index),
            device,
            textures,
            swapchain_length,
            &mut writes,
        )?;
        structure.material_pipelines[index].sets = sets;
    }
    if !writes.is_empty() {
        device
            .update_descriptor_sets(&writes)
            .map_err(|e| RenderManagerError::creation("descriptor set writes", e))?;
    }
    Ok(())
}

fn material_pipeline_sets(
    structure: &RenderStructure,
    index: MaterialPipelineIndex,
    device: &dyn GraphicsDevice,
    textures: Option<&dyn TextureSource>,
    swapchain_length: u32,
    writes: &mut Vec<WriteDescriptorSet>,
) -> Result<SetsPerSlot> {
    let material_pipeline = &structure[index];
    let pipeline = &structure[material_pipeline.pipeline];
    let description = structure.pipeline_description(material_pipeline.pipeline);
    check_layouts(description)?;

    let model = &structure[structure[material_pipeline.group_model].model].model;
    let material = model.material(material_pipeline.material);

    let mut sets = SetsPerSlot::default();
    for set in 0..description.set_count() {
        let Some(slot) = &description.descriptor_sets[set] else {
            continue;
        };
        if slot.is_fixed() {
            sets[set] = slot.fixed_sets.clone();
            continue;
        }
        let count = if slot.multi_buffered { swapchain_length } else { 1 };
        let allocated = (0..count)
            .map(|_| {
                device.allocate_descriptor_set(slot.layout).map_err(|e| {
                    RenderManagerError::creation(
                        format!("descriptor set {set} of pipeline '{}'", description.name),
                        e,
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let set_u32 = set as u32;
        for attachment in description
            .input_attachments
            .iter()
            .filter(|a| a.set == set_u32)
        {
            for (swap, &ds) in allocated.iter().enumerate() {
                let Some(&view) = attachment.views.get(swap).or(attachment.views.first()) else {
                    continue;
                };
                writes.push(WriteDescriptorSet {
                    set: ds,
                    binding: attachment.binding,
                    descriptor_type: DescriptorType::InputAttachment,
                    resource: DescriptorResource::Image { view, sampler: None },
                });
            }
        }

        for texture in description.textures.iter().filter(|t| t.set == set_u32) {
            let name = material
                .and_then(|m| m.texture_index(&texture.semantic))
                .and_then(|i| model.texture(i))
                .map(|t| t.name.as_str());
            let view = match (name, textures) {
                (Some(name), Some(source)) => source.texture_view(name).ok(),
                _ => None,
            };
            let Some(view) = view else {
                log::info!(
                    "Texture '{}' of pipeline '{}' could not be resolved; the application must populate set {set} binding {}",
                    texture.semantic,
                    description.name,
                    texture.binding
                );
                continue;
            };
            for &ds in &allocated {
                writes.push(WriteDescriptorSet {
                    set: ds,
                    binding: texture.binding,
                    descriptor_type: DescriptorType::CombinedImageSampler,
                    resource: DescriptorResource::Image {
                        view,
                        sampler: texture.sampler,
                    },
                });
            }
        }

        for buffer_ref in description.buffers.iter().filter(|b| b.set == set_u32) {
            let definition = structure
                .find_buffer(pipeline.effect, &buffer_ref.buffer)
                .map(|b| &structure[b])
                .ok_or_else(|| RenderManagerError::UnknownBuffer {
                    effect: structure[pipeline.effect].description.name.clone(),
                    buffer: buffer_ref.buffer.clone(),
                })?;
            let Some(buffer) = definition.buffer else {
                continue;
            };
            for (swap, &ds) in allocated.iter().enumerate() {
                // Static bindings of per-swap sets point at their swap's copy.
                let offset = if buffer_ref.descriptor_type.is_dynamic() || allocated.len() == 1 {
                    0
                } else {
                    definition.slice(swap as u32, 0).offset
                };
                writes.push(WriteDescriptorSet {
                    set: ds,
                    binding: buffer_ref.binding,
                    descriptor_type: buffer_ref.descriptor_type,
                    resource: DescriptorResource::Buffer {
                        buffer,
                        offset,
                        range: definition.aligned_slice_size,
                    },
                });
            }
        }
        sets[set] = allocated;
    }
    Ok(sets)
}
