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
use std::ops::Range;

/// Records rendering commands into a backend command buffer.
///
/// Implementations append commands in call order; nothing is submitted until
/// the host does so.
pub trait CommandRecorder {
    /// Begins a render pass on the given framebuffer, clearing its attachments.
    fn begin_render_pass(&mut self, info: &RenderPassBeginInfo);

    /// Advances to the next subpass of the current render pass.
    fn next_subpass(&mut self);

    /// Ends the current render pass.
    fn end_render_pass(&mut self);

    /// Binds a render pipeline for subsequent draws.
    fn bind_pipeline(&mut self, pipeline: RenderPipelineId);

    /// Binds a descriptor set at `set_index` with the dynamic offsets of its
    /// dynamic bindings, in binding order.
    fn bind_descriptor_set(
        &mut self,
        layout: PipelineLayoutId,
        set_index: u32,
        set: DescriptorSetId,
        dynamic_offsets: &[u32],
    );

    /// Binds a vertex buffer to a binding slot.
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64);

    /// Binds an index buffer.
    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat);

    /// Updates push constant data.
    fn push_constants(
        &mut self,
        layout: PipelineLayoutId,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    /// Records a non-indexed draw.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Records an indexed draw.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}
