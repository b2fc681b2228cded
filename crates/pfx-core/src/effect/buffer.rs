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

use crate::renderer::api::{BufferUsage, GpuDatatype};
use serde::{Deserialize, Serialize};

/// The granularity at which a buffer entry or uniform takes distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    /// One value for the whole effect, set by the application.
    Effect,
    /// One value per model (cameras, lights).
    Model,
    /// One value per drawn node.
    Node,
    /// One value per bone batch of a skinned mesh.
    BoneBatch,
}

/// One member of a structured buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferEntryDescription {
    /// The semantic the entry is bound to.
    pub semantic: String,
    /// The shader type.
    pub datatype: GpuDatatype,
    /// Number of array elements (1 for a plain value).
    pub array_elements: u32,
}

/// A uniform or storage buffer the effect allocates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferDescription {
    /// The buffer name pipelines refer to.
    pub name: String,
    /// The scope of its entries, which decides how dynamic clients are assigned.
    pub scope: VariableScope,
    /// The bindings the buffer supports (`UNIFORM`, `STORAGE` or both).
    pub usage: BufferUsage,
    /// One copy per swap image when `true`.
    pub multi_buffered: bool,
    /// Structured members, in declaration order.
    pub entries: Vec<BufferEntryDescription>,
    /// Extra dynamic slices reserved for clients acquired at runtime.
    #[serde(default)]
    pub reserved_clients: u32,
}

impl BufferDescription {
    /// Creates an empty uniform buffer description.
    pub fn new(name: impl Into<String>, scope: VariableScope) -> Self {
        Self {
            name: name.into(),
            scope,
            usage: BufferUsage::UNIFORM,
            multi_buffered: false,
            entries: Vec::new(),
            reserved_clients: 0,
        }
    }

    /// Appends a member.
    pub fn with_entry(
        mut self,
        semantic: impl Into<String>,
        datatype: GpuDatatype,
        array_elements: u32,
    ) -> Self {
        self.entries.push(BufferEntryDescription {
            semantic: semantic.into(),
            datatype,
            array_elements,
        });
        self
    }

    /// Sets the supported bindings.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Keeps one copy per swap image.
    pub fn multi_buffered(mut self) -> Self {
        self.multi_buffered = true;
        self
    }

    /// Reserves runtime dynamic clients.
    pub fn with_reserved_clients(mut self, count: u32) -> Self {
        self.reserved_clients = count;
        self
    }
}
