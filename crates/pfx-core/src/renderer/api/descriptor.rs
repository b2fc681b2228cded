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

//! Descriptor sets: layouts, handles and the writes that populate them.

use super::buffer::BufferId;
use super::texture::{SamplerId, TextureViewId};
use serde::{Deserialize, Serialize};

/// An opaque handle to a descriptor set layout created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorSetLayoutId(pub usize);

/// An opaque handle to an allocated descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorSetId(pub usize);

/// The kind of resource bound at a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorType {
    /// A standalone sampler.
    Sampler,
    /// A texture view combined with a sampler.
    CombinedImageSampler,
    /// A sampled texture view.
    SampledImage,
    /// A read/write storage image.
    StorageImage,
    /// A uniform buffer bound at a fixed offset.
    UniformBuffer,
    /// A storage buffer bound at a fixed offset.
    StorageBuffer,
    /// A uniform buffer whose offset is supplied at bind time.
    UniformBufferDynamic,
    /// A storage buffer whose offset is supplied at bind time.
    StorageBufferDynamic,
    /// A subpass input attachment.
    InputAttachment,
}

impl DescriptorType {
    /// Returns `true` for descriptor types that take a dynamic offset at bind time.
    pub const fn is_dynamic(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }

    /// Returns `true` for descriptor types that reference a buffer.
    pub const fn is_buffer(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer
                | DescriptorType::StorageBuffer
                | DescriptorType::UniformBufferDynamic
                | DescriptorType::StorageBufferDynamic
        )
    }

    /// Returns `true` for descriptor types that reference an image view.
    pub const fn is_image(&self) -> bool {
        matches!(
            self,
            DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
                | DescriptorType::InputAttachment
        )
    }
}

/// The resource written into a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    /// A range of a buffer.
    Buffer {
        /// The buffer to bind.
        buffer: BufferId,
        /// Offset of the range in bytes. Dynamic offsets are added on top of it.
        offset: u64,
        /// Size of the range in bytes.
        range: u64,
    },
    /// An image view, optionally paired with a sampler.
    Image {
        /// The view to bind.
        view: TextureViewId,
        /// The sampler for combined image samplers.
        sampler: Option<SamplerId>,
    },
}

/// A single update to a descriptor set binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDescriptorSet {
    /// The set being written.
    pub set: DescriptorSetId,
    /// The binding index within the set.
    pub binding: u32,
    /// The descriptor type of the binding.
    pub descriptor_type: DescriptorType,
    /// The resource to bind.
    pub resource: DescriptorResource,
}
