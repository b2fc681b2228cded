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

//! Typed indices into the arenas of a [`super::RenderStructure`].

macro_rules! arena_index {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);

            impl $name {
                /// The raw arena position.
                #[inline]
                pub const fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_index! {
    /// Identifies an effect added with `RenderManager::add_effect`.
    EffectId,
    /// Identifies a model added with `RenderManager::add_model`.
    ModelId,
    /// A compiled render pass.
    PassIndex,
    /// A compiled subpass.
    SubpassIndex,
    /// A compiled subpass group.
    GroupIndex,
    /// The (group, model) pair a group draws.
    GroupModelIndex,
    /// A pipeline instantiated in a group.
    PipelineIndex,
    /// A (group model, pipeline, material) triple owning descriptor sets.
    MaterialPipelineIndex,
    /// A drawable unit: one bone batch of one mesh node.
    NodeIndex,
    /// A mesh of a model, with its vertex and index buffers.
    MeshIndex,
    /// A buffer definition of an effect.
    BufferIndex,
}
