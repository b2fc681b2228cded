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

//! Render pass and framebuffer handles, and the begin info used to open a pass.

use crate::math::LinearRgba;
use serde::{Deserialize, Serialize};

/// An opaque handle to a render pass object created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderPassId(pub usize);

/// An opaque handle to a framebuffer created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferId(pub usize);

/// Everything needed to begin a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBeginInfo {
    /// The render pass to begin.
    pub render_pass: RenderPassId,
    /// The framebuffer of the current swap image.
    pub framebuffer: FramebufferId,
    /// Clear colour of the colour attachments.
    pub clear_color: LinearRgba,
    /// Clear value of the depth attachment.
    pub clear_depth: f32,
    /// Clear value of the stencil attachment.
    pub clear_stencil: u32,
}
