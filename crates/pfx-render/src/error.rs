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

//! Errors reported by the render manager.

use crate::structure::{BufferIndex, EffectId, ModelId};
use pfx_core::renderer::ResourceError;
use thiserror::Error;

/// Failures of the dynamic client free list. These are recoverable: the caller
/// may release a client and retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Every reserved slice of the buffer is in use.
    #[error("all {capacity} reserved dynamic slices of buffer '{buffer}' are in use")]
    Exhausted {
        /// The buffer name.
        buffer: String,
        /// The number of reserved slices.
        capacity: u32,
    },
    /// The slot was not handed out by `acquire` or was already released.
    #[error("dynamic slice {slot} of buffer '{buffer}' is not currently acquired")]
    NotAcquired {
        /// The buffer name.
        buffer: String,
        /// The slot index.
        slot: u32,
    },
}

/// Errors returned by [`crate::RenderManager`] operations.
#[derive(Debug, Error)]
pub enum RenderManagerError {
    /// A GPU object could not be created. The manager is unusable afterwards.
    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        /// What was being created.
        what: String,
        /// The backend error.
        #[source]
        source: ResourceError,
    },
    /// A buffer write or map failed during a per-frame update.
    #[error("failed to update buffer {buffer:?}: {source}")]
    BufferUpdate {
        /// The buffer being updated.
        buffer: BufferIndex,
        /// The backend error.
        #[source]
        source: ResourceError,
    },
    /// The effect ID does not exist.
    #[error("unknown effect {0:?}")]
    UnknownEffect(EffectId),
    /// The model ID does not exist.
    #[error("unknown model {0:?}")]
    UnknownModel(ModelId),
    /// A pipeline or node index does not exist.
    #[error("no {kind} at index {index}")]
    InvalidIndex {
        /// The kind of object addressed.
        kind: &'static str,
        /// The offending index.
        index: usize,
    },
    /// A pass, subpass or group index is out of range.
    #[error("effect '{effect}' has no {what} at index {index}")]
    InvalidPath {
        /// The effect name.
        effect: String,
        /// The level that was out of range.
        what: &'static str,
        /// The offending index.
        index: usize,
    },
    /// A group or lookup names a pipeline the effect does not define.
    #[error("effect '{effect}' has no pipeline named '{pipeline}'")]
    UnknownPipeline {
        /// The effect name.
        effect: String,
        /// The pipeline name.
        pipeline: String,
    },
    /// A pipeline or lookup references a buffer the effect does not define.
    #[error("effect '{effect}' has no buffer named '{buffer}'")]
    UnknownBuffer {
        /// The effect name.
        effect: String,
        /// The buffer name.
        buffer: String,
    },
    /// A pipeline binds a resource in a set its layout does not declare.
    #[error("pipeline '{pipeline}' binds set {set} which its layout does not declare")]
    MissingDescriptorSetLayout {
        /// The pipeline name.
        pipeline: String,
        /// The set index.
        set: u32,
    },
    /// `build_render_objects` was called a second time.
    #[error("render objects have already been built")]
    AlreadyBuilt,
    /// A per-frame operation ran before `build_render_objects`.
    #[error("render objects have not been built yet")]
    NotBuilt,
    /// The swap index is outside the configured swapchain length.
    #[error("swap index {swap} is out of range for a swapchain of {length} images")]
    InvalidSwapIndex {
        /// The requested swap index.
        swap: u32,
        /// The configured swapchain length.
        length: u32,
    },
    /// A runtime dynamic client could not be acquired or released.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl RenderManagerError {
    pub(crate) fn creation(what: impl Into<String>, source: ResourceError) -> Self {
        RenderManagerError::ResourceCreation {
            what: what.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = RenderManagerError> = std::result::Result<T, E>;
