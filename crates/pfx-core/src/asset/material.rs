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

use crate::renderer::api::TypedMem;
use std::collections::HashMap;

/// Surface properties: named semantic values and named textures.
///
/// Semantic and texture names are stored upper-cased, so lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Material {
    name: String,
    semantics: HashMap<String, TypedMem>,
    textures: HashMap<String, usize>,
}

impl Material {
    /// Creates a material with no semantics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The material name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets a semantic value (for example `DIFFUSECOLOR`).
    pub fn set_semantic(&mut self, semantic: &str, value: TypedMem) -> &mut Self {
        self.semantics.insert(semantic.to_ascii_uppercase(), value);
        self
    }

    /// Returns `true` if the material defines the semantic.
    pub fn has_semantic(&self, semantic: &str) -> bool {
        self.semantics.contains_key(&semantic.to_ascii_uppercase())
    }

    /// Returns the value of a semantic.
    pub fn semantic(&self, semantic: &str) -> Option<&TypedMem> {
        self.semantics.get(&semantic.to_ascii_uppercase())
    }

    /// Binds a texture semantic (for example `DIFFUSETEXTURE`) to a texture of the
    /// owning model.
    pub fn set_texture(&mut self, semantic: &str, texture_index: usize) -> &mut Self {
        self.textures
            .insert(semantic.to_ascii_uppercase(), texture_index);
        self
    }

    /// The model texture index bound to a texture semantic.
    pub fn texture_index(&self, semantic: &str) -> Option<usize> {
        self.textures.get(&semantic.to_ascii_uppercase()).copied()
    }
}
