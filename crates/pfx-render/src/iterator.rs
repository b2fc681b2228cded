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

//! Iteration over every drawable node in recording order.

use crate::structure::{NodeIndex, PassIndex, PipelineIndex, RenderStructure, SubpassIndex};

/// A node yielded by [`RenderNodeIter`], with what changed since the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderNodeEntry {
    /// The node.
    pub node: NodeIndex,
    /// The node is the first of a new pass.
    pub pass_changed: bool,
    /// The node is the first of a new subpass.
    pub subpass_changed: bool,
    /// The node uses a different pipeline than the previous one.
    pub pipeline_changed: bool,
}

/// Walks effects, passes, subpasses, groups and group models in order.
pub struct RenderNodeIter<'a> {
    structure: &'a RenderStructure,
    inner: Box<dyn Iterator<Item = (PassIndex, SubpassIndex, NodeIndex)> + 'a>,
    last: Option<(PassIndex, SubpassIndex, PipelineIndex)>,
}

impl<'a> RenderNodeIter<'a> {
    /// Starts at the first node of the first effect.
    pub fn new(structure: &'a RenderStructure) -> Self {
        let inner = structure.effects.iter().flat_map(move |effect| {
            effect.passes.iter().flat_map(move |&pass| {
                structure[pass].subpasses.iter().flat_map(move |&subpass| {
                    structure[subpass].groups.iter().flat_map(move |&group| {
                        structure[group].group_models.iter().flat_map(move |&gm| {
                            structure[gm]
                                .nodes
                                .iter()
                                .map(move |&node| (pass, subpass, node))
                        })
                    })
                })
            })
        });
        Self {
            structure,
            inner: Box::new(inner),
            last: None,
        }
    }
}

impl Iterator for RenderNodeIter<'_> {
    type Item = RenderNodeEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let (pass, subpass, node) = self.inner.next()?;
        let pipeline = self.structure[node].pipeline;
        let entry = match self.last {
            None => RenderNodeEntry {
                node,
                pass_changed: true,
                subpass_changed: true,
                pipeline_changed: true,
            },
            Some((last_pass, last_subpass, last_pipeline)) => RenderNodeEntry {
                node,
                pass_changed: last_pass != pass,
                subpass_changed: last_subpass != subpass,
                pipeline_changed: last_pipeline != pipeline,
            },
        };
        self.last = Some((pass, subpass, pipeline));
        Some(entry)
    }
}

impl std::fmt::Debug for RenderNodeIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderNodeIter")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}
