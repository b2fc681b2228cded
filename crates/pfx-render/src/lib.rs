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

//! # PFX Render
//!
//! Compiles declarative effects against scene models and records their draw
//! commands: pipeline selection, vertex layout merging, effect buffers with
//! dynamic slices, automatic semantics, descriptor sets and command recording.
//!
//! [`RenderManager`] is the entry point; the other modules expose the pieces
//! it is built from.

#![warn(missing_docs)]

pub mod attributes;
pub mod buffers;
mod descriptors;
mod error;
mod iterator;
mod recording;
mod render_manager;
pub mod selection;
pub mod semantics;
mod settings;
pub mod structure;

pub use error::{AllocationError, RenderManagerError, Result};
pub use iterator::{RenderNodeEntry, RenderNodeIter};
pub use recording::NodeCommands;
pub use render_manager::RenderManager;
pub use settings::RenderManagerSettings;
pub use structure::{
    BufferIndex, EffectId, GroupIndex, ModelId, NodeIndex, PassIndex, PipelineIndex,
    RenderStructure,
};
