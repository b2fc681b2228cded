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

//! std140 layout of a structured buffer.

use pfx_core::effect::BufferDescription;
use pfx_core::renderer::api::{BufferUsage, DeviceLimits, GpuDatatype, TypedMem};

/// One member of a structured buffer, placed by std140 rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredEntry {
    /// The semantic the member is bound to.
    pub semantic: String,
    /// The shader type.
    pub datatype: GpuDatatype,
    /// Number of array elements.
    pub array_elements: u32,
    /// Offset within one slice.
    pub offset: u64,
}

/// The std140 layout of one slice of a buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredMemory {
    entries: Vec<StructuredEntry>,
    size: u64,
}

impl StructuredMemory {
    /// Lays out the members of a buffer description in declaration order. The
    /// block size is rounded up to 16 bytes.
    pub fn from_description(description: &BufferDescription) -> Self {
        let mut end = 0;
        let mut entries = Vec::with_capacity(description.entries.len());
        for entry in &description.entries {
            let elements = entry.array_elements.max(1);
            let offset = entry.datatype.std140_offset_after(end, elements);
            end = offset + entry.datatype.std140_size(elements);
            entries.push(StructuredEntry {
                semantic: entry.semantic.to_ascii_uppercase(),
                datatype: entry.datatype,
                array_elements: elements,
                offset,
            });
        }
        Self {
            entries,
            size: end.div_ceil(16) * 16,
        }
    }

    /// Position of the member bound to `semantic` (case-insensitive).
    pub fn entry_index(&self, semantic: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.semantic.eq_ignore_ascii_case(semantic))
    }

    /// The member at `index`.
    pub fn entry(&self, index: usize) -> Option<&StructuredEntry> {
        self.entries.get(index)
    }

    /// All members.
    pub fn entries(&self) -> &[StructuredEntry] {
        &self.entries
    }

    /// Unaligned size of one slice.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl StructuredEntry {
    /// Returns `true` if `value` can be written to this member: same type and no
    /// more elements than the member holds.
    pub fn accepts(&self, value: &TypedMem) -> bool {
        value.datatype() == self.datatype && value.array_elements() <= self.array_elements
    }
}

/// The dynamic offset alignment a buffer must honour for its usages.
pub fn dynamic_alignment(usage: BufferUsage, limits: &DeviceLimits) -> u64 {
    let ubo = limits.min_uniform_buffer_offset_alignment.max(1);
    let ssbo = limits.min_storage_buffer_offset_alignment.max(1);
    match (
        usage.contains(BufferUsage::UNIFORM),
        usage.contains(BufferUsage::STORAGE),
    ) {
        (true, true) => ubo.max(ssbo),
        (false, true) => ssbo,
        _ => ubo,
    }
}

/// Size of one dynamic slice: the block size rounded up to the dynamic alignment.
pub fn aligned_slice_size(size: u64, usage: BufferUsage, limits: &DeviceLimits) -> u64 {
    let alignment = dynamic_alignment(usage, limits);
    size.max(1).div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_core::effect::VariableScope;

    #[test]
    fn test_layout_of_mixed_members() {
        let desc = BufferDescription::new("b", VariableScope::Node)
            .with_entry("WORLDVIEWPROJECTION", GpuDatatype::Mat4x4, 1)
            .with_entry("WORLDIT", GpuDatatype::Mat3x3, 1)
            .with_entry("BONECOUNT", GpuDatatype::Int32, 1)
            .with_entry("BONEMATRICES", GpuDatatype::Mat4x4, 8);
        let mem = StructuredMemory::from_description(&desc);
        let offsets: Vec<u64> = mem.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 64, 112, 128]);
        assert_eq!(mem.size(), 128 + 512);
        assert_eq!(mem.entry_index("boneCount"), Some(2));
    }

    #[test]
    fn test_block_size_rounds_to_16() {
        let desc = BufferDescription::new("b", VariableScope::Effect)
            .with_entry("TIME", GpuDatatype::Float32, 1);
        assert_eq!(StructuredMemory::from_description(&desc).size(), 16);
    }

    #[test]
    fn test_slice_alignment_takes_max_for_dual_usage() {
        let limits = DeviceLimits {
            min_uniform_buffer_offset_alignment: 64,
            min_storage_buffer_offset_alignment: 256,
        };
        assert_eq!(aligned_slice_size(80, BufferUsage::UNIFORM, &limits), 128);
        assert_eq!(aligned_slice_size(80, BufferUsage::STORAGE, &limits), 256);
        assert_eq!(
            aligned_slice_size(300, BufferUsage::UNIFORM | BufferUsage::STORAGE, &limits),
            512
        );
        assert_eq!(aligned_slice_size(0, BufferUsage::UNIFORM, &limits), 64);
    }

    #[test]
    fn test_entry_accepts_fewer_array_elements() {
        let desc = BufferDescription::new("b", VariableScope::Node)
            .with_entry("BONEMATRICES", GpuDatatype::Mat4x4, 8);
        let mem = StructuredMemory::from_description(&desc);
        let entry = mem.entry(0).unwrap();
        assert!(entry.accepts(&TypedMem::new(GpuDatatype::Mat4x4, 3)));
        assert!(!entry.accepts(&TypedMem::new(GpuDatatype::Mat4x4, 9)));
        assert!(!entry.accepts(&TypedMem::new(GpuDatatype::Mat3x3, 1)));
    }
}
