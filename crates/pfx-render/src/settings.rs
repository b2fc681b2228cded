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

//! Configuration of the render manager.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings the render manager compiles and records with.
///
/// Can be built in code or loaded from a RON file:
///
/// ```ron
/// (
///     swapchain_length: 3,
///     screen_width: 1920,
///     screen_height: 1080,
///     datatypes_from_model: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderManagerSettings {
    /// Number of swap images; multi-buffered resources keep one copy per image.
    pub swapchain_length: u32,
    /// Screen width in pixels, used by projection semantics.
    pub screen_width: u32,
    /// Screen height in pixels, used by projection semantics.
    pub screen_height: u32,
    /// Widen vertex attribute types to the types stored in the meshes instead of
    /// the types the shaders declare.
    pub datatypes_from_model: bool,
    /// Log every buffer allocation at `debug` level.
    pub log_buffer_creation: bool,
    /// Log every recorded node at `trace` level.
    pub log_rendering_commands: bool,
}

impl Default for RenderManagerSettings {
    fn default() -> Self {
        Self {
            swapchain_length: 3,
            screen_width: 1280,
            screen_height: 720,
            datatypes_from_model: true,
            log_buffer_creation: true,
            log_rendering_commands: false,
        }
    }
}

impl RenderManagerSettings {
    /// Parses settings from a RON string. Missing fields take their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let settings: Self =
            ron::from_str(text).context("Failed to parse render manager settings")?;
        Ok(settings.sanitized())
    }

    /// Loads settings from a RON file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;
        Self::from_ron_str(&text)
            .with_context(|| format!("Invalid settings file '{}'", path.display()))
    }

    /// Serializes the settings to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        let pretty_config = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty_config).context("Failed to serialize settings")
    }

    /// Clamps values that would make layouts degenerate.
    pub(crate) fn sanitized(mut self) -> Self {
        if self.swapchain_length == 0 {
            log::warn!("swapchain_length of 0 is invalid, using 1");
            self.swapchain_length = 1;
        }
        self
    }
}
