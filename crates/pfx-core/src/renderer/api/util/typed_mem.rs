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

//! A type-tagged, tightly packed value that can be written to a std140 block.

use super::gpu_datatype::GpuDatatype;
use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// A plain-old-data value with a known shader type.
pub trait GpuValue: bytemuck::Pod {
    /// The shader type this value maps to.
    const DATATYPE: GpuDatatype;
}

macro_rules! gpu_value {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(impl GpuValue for $ty {
            const DATATYPE: GpuDatatype = GpuDatatype::$dt;
        })*
    };
}

gpu_value! {
    f32 => Float32,
    i32 => Int32,
    u32 => UInt32,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3x3,
    Mat4 => Mat4x4,
    [i32; 4] => IVec4,
    [u32; 4] => UVec4,
}

/// A single value or array of values of one [`GpuDatatype`], stored tightly packed.
///
/// Scratch instances are allocated once at compile time and overwritten every
/// frame, so setters reuse the existing allocation when the shape is unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedMem {
    datatype: GpuDatatype,
    array_elements: u32,
    data: Vec<u8>,
}

impl TypedMem {
    /// Creates zeroed storage for `array_elements` values of `datatype`.
    pub fn new(datatype: GpuDatatype, array_elements: u32) -> Self {
        let mut mem = Self::default();
        mem.allocate(datatype, array_elements);
        mem
    }

    /// Creates storage holding a single value.
    pub fn from_value<T: GpuValue>(value: T) -> Self {
        let mut mem = Self::default();
        mem.set_value(value);
        mem
    }

    /// Creates storage holding an array of values.
    pub fn from_array<T: GpuValue>(values: &[T]) -> Self {
        let mut mem = Self::new(T::DATATYPE, values.len() as u32);
        if !values.is_empty() {
            mem.data.copy_from_slice(bytemuck::cast_slice(values));
        }
        mem
    }

    /// Re-shapes the storage. Contents are zeroed when the shape changes.
    pub fn allocate(&mut self, datatype: GpuDatatype, array_elements: u32) {
        let array_elements = array_elements.max(1);
        if self.datatype != datatype || self.array_elements != array_elements {
            self.datatype = datatype;
            self.array_elements = array_elements;
            self.data.clear();
            self.data
                .resize(datatype.packed_size(array_elements) as usize, 0);
        }
    }

    /// Stores a single value, re-shaping the storage if needed.
    pub fn set_value<T: GpuValue>(&mut self, value: T) {
        self.allocate(T::DATATYPE, 1);
        self.data.copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Stores element `index` of an array. Returns `false` when the type does not
    /// match or the index is out of range.
    pub fn set_array_value<T: GpuValue>(&mut self, index: u32, value: T) -> bool {
        if self.datatype != T::DATATYPE || index >= self.array_elements {
            return false;
        }
        let size = std::mem::size_of::<T>();
        let start = index as usize * size;
        self.data[start..start + size].copy_from_slice(bytemuck::bytes_of(&value));
        true
    }

    /// Reads the value as `T`, if the types match.
    pub fn value<T: GpuValue>(&self) -> Option<T> {
        self.array_value(0)
    }

    /// Reads element `index` as `T`, if the types match.
    pub fn array_value<T: GpuValue>(&self, index: u32) -> Option<T> {
        if self.datatype != T::DATATYPE || index >= self.array_elements {
            return None;
        }
        let size = std::mem::size_of::<T>();
        let start = index as usize * size;
        Some(bytemuck::pod_read_unaligned(&self.data[start..start + size]))
    }

    /// The shader type of the stored values.
    pub fn datatype(&self) -> GpuDatatype {
        self.datatype
    }

    /// Number of array elements (1 for a single value).
    pub fn array_elements(&self) -> u32 {
        self.array_elements
    }

    /// The packed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if `other` has the same type and element count.
    pub fn is_data_compatible(&self, other: &TypedMem) -> bool {
        self.datatype == other.datatype && self.array_elements == other.array_elements
    }

    /// Copies `other` into this storage, which must be data compatible.
    pub fn copy_from(&mut self, other: &TypedMem) -> bool {
        if !self.is_data_compatible(other) {
            return false;
        }
        self.data.copy_from_slice(&other.data);
        true
    }

    /// Expands the packed values to std140 layout into `out`, writing at most
    /// `max_elements` elements. `out` is cleared first.
    ///
    /// Each column is written at a 16-byte stride when the value is a matrix or an
    /// array; a lone scalar or vector is written unpadded.
    pub fn write_std140(&self, max_elements: u32, out: &mut Vec<u8>) {
        let elements = self.array_elements.min(max_elements.max(1));
        let dt = self.datatype;
        out.clear();
        out.resize(dt.std140_size(elements) as usize, 0);

        let column_bytes = 4 * dt.rows() as usize;
        let element_stride = if elements > 1 {
            dt.std140_array_stride() as usize
        } else {
            dt.std140_size(1) as usize
        };
        let mut src = 0;
        for element in 0..elements as usize {
            for column in 0..dt.columns() as usize {
                let dst = element * element_stride + column * dt.std140_column_stride() as usize;
                out[dst..dst + column_bytes].copy_from_slice(&self.data[src..src + column_bytes]);
                src += column_bytes;
            }
        }
    }
}
