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

//! Command recording: passes, subpasses, groups and nodes in order, with
//! redundant pipeline and descriptor set binds elided.

use crate::structure::{GroupIndex, NodeIndex, PassIndex, PipelineIndex, RenderStructure};
use pfx_core::effect::MAX_DESCRIPTOR_SETS;
use pfx_core::math::LinearRgba;
use pfx_core::renderer::api::{DescriptorSetId, RenderPassBeginInfo};
use pfx_core::renderer::CommandRecorder;

/// Which commands [`crate::RenderManager::record_node_commands`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCommands {
    /// Bind the node's pipeline.
    pub bind_pipeline: bool,
    /// Bind the node's descriptor sets with its dynamic offsets.
    pub bind_descriptor_sets: bool,
    /// Push uniform mirrors that live in push constants.
    pub push_uniforms: bool,
    /// Bind vertex and index buffers.
    pub bind_vertex_buffers: bool,
    /// Record the draw.
    pub draw: bool,
}

impl Default for NodeCommands {
    fn default() -> Self {
        Self {
            bind_pipeline: true,
            bind_descriptor_sets: true,
            push_uniforms: true,
            bind_vertex_buffers: true,
            draw: true,
        }
    }
}

/// What is currently bound, to skip redundant binds.
#[derive(Debug, Default)]
struct BindState {
    pipeline: Option<PipelineIndex>,
    sets: [Option<DescriptorSetId>; MAX_DESCRIPTOR_SETS],
    offsets: [Vec<u32>; MAX_DESCRIPTOR_SETS],
}

/// Records the commands of a built [`RenderStructure`] for one swap image.
pub(crate) struct Recording<'a> {
    pub(crate) structure: &'a RenderStructure,
    pub(crate) swap: u32,
    pub(crate) log_commands: bool,
}

impl Recording<'_> {
    pub(crate) fn record_all(
        &self,
        recorder: &mut dyn CommandRecorder,
        begin_end_render_pass: bool,
        push_uniforms: bool,
    ) {
        for effect in &self.structure.effects {
            for &pass in &effect.passes {
                self.record_pass(recorder, pass, begin_end_render_pass, push_uniforms);
            }
        }
    }

    /// The clear colour of the first model drawn in the pass.
    fn clear_color(&self, pass: PassIndex) -> LinearRgba {
        let s = self.structure;
        s[pass]
            .subpasses
            .iter()
            .flat_map(move |&subpass| s[subpass].groups.iter())
            .flat_map(move |&group| s[group].models.iter())
            .next()
            .map_or(LinearRgba::BLACK, |&model| s[model].model.clear_color())
    }

    pub(crate) fn record_pass(
        &self,
        recorder: &mut dyn CommandRecorder,
        pass: PassIndex,
        begin_end_render_pass: bool,
        push_uniforms: bool,
    ) {
        let s = self.structure;
        let render_pass = &s[pass];
        let description = &s[render_pass.effect].description.passes[render_pass.description];

        let mut began = false;
        if begin_end_render_pass {
            match description.framebuffer(self.swap) {
                Some(framebuffer) => {
                    recorder.begin_render_pass(&RenderPassBeginInfo {
                        render_pass: description.render_pass,
                        framebuffer,
                        clear_color: self.clear_color(pass),
                        clear_depth: 1.0,
                        clear_stencil: 0,
                    });
                    began = true;
                }
                None => log::warn!(
                    "Pass '{}' has no framebuffer for swap image {}; recording without beginning it",
                    description.name,
                    self.swap
                ),
            }
        }

        for (i, &subpass) in render_pass.subpasses.iter().enumerate() {
            if i > 0 {
                recorder.next_subpass();
            }
            for &group in &s[subpass].groups {
                self.record_group(recorder, group, push_uniforms);
            }
        }

        if began {
            recorder.end_render_pass();
        }
    }

    pub(crate) fn record_group(
        &self,
        recorder: &mut dyn CommandRecorder,
        group: GroupIndex,
        push_uniforms: bool,
    ) {
        let s = self.structure;
        for &group_model in &s[group].group_models {
            let mut state = BindState::default();
            for &node in &s[group_model].nodes {
                self.record_node_diffed(recorder, node, push_uniforms, &mut state);
            }
        }
    }

    fn record_node_diffed(
        &self,
        recorder: &mut dyn CommandRecorder,
        node: NodeIndex,
        push_uniforms: bool,
        state: &mut BindState,
    ) {
        let s = self.structure;
        let n = &s[node];
        let layout = s.pipeline_description(n.pipeline).layout;
        if self.log_commands {
            log::trace!("Recording node {:?} (pipeline '{}')", node, s[n.pipeline].name);
        }

        if state.pipeline != Some(n.pipeline) {
            if let Some(api) = s[n.pipeline].api_pipeline {
                recorder.bind_pipeline(api);
            }
            *state = BindState {
                pipeline: Some(n.pipeline),
                ..BindState::default()
            };
        }

        let material_pipeline = &s[n.material_pipeline];
        for set in 0..MAX_DESCRIPTOR_SETS {
            let Some(ds) = material_pipeline.set(set, self.swap) else {
                continue;
            };
            let offsets = n.dynamic_offsets(set, self.swap);
            if state.sets[set] != Some(ds) || state.offsets[set] != offsets {
                recorder.bind_descriptor_set(layout, set as u32, ds, offsets);
                state.sets[set] = Some(ds);
                state.offsets[set] = offsets.to_vec();
            }
        }

        if push_uniforms {
            self.push_uniforms(recorder, node);
        }
        self.bind_buffers_and_draw(recorder, node, true, true);
    }

    pub(crate) fn record_node(
        &self,
        recorder: &mut dyn CommandRecorder,
        node: NodeIndex,
        commands: NodeCommands,
    ) {
        let s = self.structure;
        let n = &s[node];
        let layout = s.pipeline_description(n.pipeline).layout;
        if commands.bind_pipeline {
            if let Some(api) = s[n.pipeline].api_pipeline {
                recorder.bind_pipeline(api);
            }
        }
        if commands.bind_descriptor_sets {
            let material_pipeline = &s[n.material_pipeline];
            for set in 0..MAX_DESCRIPTOR_SETS {
                if let Some(ds) = material_pipeline.set(set, self.swap) {
                    recorder.bind_descriptor_set(
                        layout,
                        set as u32,
                        ds,
                        n.dynamic_offsets(set, self.swap),
                    );
                }
            }
        }
        if commands.push_uniforms {
            self.push_uniforms(recorder, node);
        }
        self.bind_buffers_and_draw(recorder, node, commands.bind_vertex_buffers, commands.draw);
    }

    /// Pushes effect, pipeline and node mirrors that declare a push constant offset.
    fn push_uniforms(&self, recorder: &mut dyn CommandRecorder, node: NodeIndex) {
        let s = self.structure;
        let n = &s[node];
        let pipeline = &s[n.pipeline];
        let layout = s.pipeline_description(n.pipeline).layout;
        let mirrors = s[pipeline.effect]
            .uniform_semantics
            .iter()
            .chain(&pipeline.uniform_semantics)
            .chain(&n.uniform_semantics);
        for mirror in mirrors {
            if let Some(offset) = mirror.push_constant_offset {
                recorder.push_constants(layout, mirror.stages, offset, mirror.memory.bytes());
            }
        }
    }

    fn bind_buffers_and_draw(
        &self,
        recorder: &mut dyn CommandRecorder,
        node: NodeIndex,
        bind: bool,
        draw: bool,
    ) {
        let s = self.structure;
        let n = &s[node];
        let mesh = &s[n.mesh];
        if bind {
            for (binding, vbo) in mesh.vbos.iter().enumerate() {
                if let Some(buffer) = vbo {
                    recorder.bind_vertex_buffer(binding as u32, *buffer, 0);
                }
            }
            if let Some((buffer, format)) = mesh.ibo {
                recorder.bind_index_buffer(buffer, 0, format);
            }
        }
        if !draw {
            return;
        }
        let Some(asset) = s[n.model].model.mesh(mesh.asset_mesh) else {
            return;
        };
        if mesh.ibo.is_some() {
            recorder.draw_indexed(0..asset.num_faces() * 3, 0, 0..1);
        } else {
            recorder.draw(0..asset.num_vertices(), 0..1);
        }
    }
}
