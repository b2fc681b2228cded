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

use crate::renderer::api::TextureViewId;
use crate::renderer::error::ResourceError;

/// Resolves texture names to uploaded texture views.
///
/// Decoding and uploading image data is the host's business; the render manager
/// only asks for a view when it writes a material's texture into a descriptor set.
pub trait TextureSource {
    /// Returns the view of the texture called `name`.
    /// ## Errors
    /// * `ResourceError::NotFound` - If no texture with that name is available.
    fn texture_view(&self, name: &str) -> Result<TextureViewId, ResourceError>;
}
