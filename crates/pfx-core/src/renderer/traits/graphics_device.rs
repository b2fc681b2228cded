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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// The resource-creation surface of a graphics backend.
///
/// The render manager only talks to the GPU through this trait. Every call is
/// synchronous; CPU writes go to mapped memory and become visible to the device
/// after [`GraphicsDevice::flush_buffer_range`] for non-coherent memory.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the alignment limits of the device.
    fn limits(&self) -> DeviceLimits;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - Size, usage and memory placement of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    /// ## Errors
    /// * `ResourceError` - If the allocation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a device-local buffer initialised with `data`.
    /// ## Arguments
    /// * `descriptor` - The buffer to create; `size` must equal `data.len()`.
    /// * `data` - The initial contents.
    /// ## Errors
    /// * `ResourceError` - If the allocation or the upload fails.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys the buffer associated with the given ID.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Returns the properties of the memory backing the buffer.
    fn buffer_memory_properties(&self, id: BufferId) -> Result<MemoryProperties, ResourceError>;

    /// Returns `true` if the buffer is currently mapped for CPU access.
    fn is_buffer_mapped(&self, id: BufferId) -> bool;

    /// Maps the whole buffer for CPU writes.
    fn map_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Unmaps a buffer previously mapped with [`GraphicsDevice::map_buffer`].
    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Copies `data` into the mapped memory of the buffer at `offset`.
    /// ## Errors
    /// * `ResourceError::NotMapped` - If the buffer is not mapped.
    /// * `ResourceError::OutOfBounds` - If the write exceeds the buffer size.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Makes CPU writes in `offset..offset + size` visible to the device.
    fn flush_buffer_range(&self, id: BufferId, offset: u64, size: u64)
        -> Result<(), ResourceError>;

    /// Allocates a descriptor set with the given layout.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the descriptor pool is exhausted.
    fn allocate_descriptor_set(
        &self,
        layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, ResourceError>;

    /// Applies a batch of descriptor writes.
    fn update_descriptor_sets(&self, writes: &[WriteDescriptorSet]) -> Result<(), ResourceError>;

    /// Creates a render pipeline from the provided descriptor.
    /// ## Arguments
    /// * `descriptor` - The state template, layout and vertex input of the pipeline.
    /// ## Returns
    /// The ID of the created render pipeline.
    /// ## Errors
    /// * `ResourceError` - If the render pipeline creation fails.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys the render pipeline associated with the given ID.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;
}
