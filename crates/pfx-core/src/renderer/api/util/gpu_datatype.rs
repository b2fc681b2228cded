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

//! Shader-visible data types and their std140 memory layout.
//!
//! A value's *packed* size is its tightly packed CPU representation (a `Mat3` is
//! 36 bytes). Its *std140* size follows the block layout rules shaders read
//! uniform and storage blocks with: every array element and every matrix column
//! is padded to 16 bytes, while lone scalars and vectors keep their natural size.

use super::data_type::DataType;
use serde::{Deserialize, Serialize};

/// The scalar category of a [`GpuDatatype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    /// IEEE-754 single precision float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    UInt,
}

/// A data type a shader variable can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum GpuDatatype {
    #[default]
    Float32,
    Vec2,
    Vec3,
    Vec4,
    Int32,
    IVec2,
    IVec3,
    IVec4,
    UInt32,
    UVec2,
    UVec3,
    UVec4,
    /// 2 columns, 2 rows.
    Mat2x2,
    /// 2 columns, 3 rows.
    Mat2x3,
    /// 2 columns, 4 rows.
    Mat2x4,
    /// 3 columns, 2 rows.
    Mat3x2,
    /// 3 columns, 3 rows.
    Mat3x3,
    /// 3 columns, 4 rows.
    Mat3x4,
    /// 4 columns, 2 rows.
    Mat4x2,
    /// 4 columns, 3 rows.
    Mat4x3,
    /// 4 columns, 4 rows.
    Mat4x4,
}

#[inline]
const fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

impl GpuDatatype {
    /// The scalar category of the type.
    pub const fn base_type(&self) -> BaseType {
        use GpuDatatype::*;
        match self {
            Int32 | IVec2 | IVec3 | IVec4 => BaseType::Int,
            UInt32 | UVec2 | UVec3 | UVec4 => BaseType::UInt,
            _ => BaseType::Float,
        }
    }

    /// Number of components of one column (the vector size).
    pub const fn rows(&self) -> u32 {
        use GpuDatatype::*;
        match self {
            Float32 | Int32 | UInt32 => 1,
            Vec2 | IVec2 | UVec2 | Mat2x2 | Mat3x2 | Mat4x2 => 2,
            Vec3 | IVec3 | UVec3 | Mat2x3 | Mat3x3 | Mat4x3 => 3,
            Vec4 | IVec4 | UVec4 | Mat2x4 | Mat3x4 | Mat4x4 => 4,
        }
    }

    /// Number of columns (1 for scalars and vectors).
    pub const fn columns(&self) -> u32 {
        use GpuDatatype::*;
        match self {
            Mat2x2 | Mat2x3 | Mat2x4 => 2,
            Mat3x2 | Mat3x3 | Mat3x4 => 3,
            Mat4x2 | Mat4x3 | Mat4x4 => 4,
            _ => 1,
        }
    }

    /// Returns `true` for matrix types.
    pub const fn is_matrix(&self) -> bool {
        self.columns() > 1
    }

    /// Total number of scalar components, which is also the vertex attribute
    /// width of the type.
    pub const fn components(&self) -> u32 {
        self.rows() * self.columns()
    }

    /// The vertex attribute storage type matching this shader type.
    pub const fn data_type(&self) -> DataType {
        match self.base_type() {
            BaseType::Float => DataType::Float32,
            BaseType::Int => DataType::Int32,
            BaseType::UInt => DataType::UInt32,
        }
    }

    /// Tightly packed CPU size of `array_elements` values.
    pub const fn packed_size(&self, array_elements: u32) -> u64 {
        4 * self.components() as u64 * max_one(array_elements) as u64
    }

    /// std140 base alignment of a single value.
    pub const fn std140_alignment(&self) -> u64 {
        if self.is_matrix() {
            return 16;
        }
        match self.rows() {
            1 => 4,
            2 => 8,
            _ => 16,
        }
    }

    /// Distance between consecutive columns in std140 (16 for every matrix).
    pub const fn std140_column_stride(&self) -> u64 {
        16
    }

    /// Distance between consecutive elements of a std140 array.
    pub const fn std140_array_stride(&self) -> u64 {
        16 * self.columns() as u64
    }

    /// std140 size of `array_elements` values, without trailing padding of a
    /// lone vector.
    pub const fn std140_size(&self, array_elements: u32) -> u64 {
        if array_elements > 1 {
            self.std140_array_stride() * array_elements as u64
        } else if self.is_matrix() {
            self.std140_array_stride()
        } else {
            4 * self.rows() as u64
        }
    }

    /// Offset at which a value of this type starts when placed after `previous_end`.
    pub const fn std140_offset_after(&self, previous_end: u64, array_elements: u32) -> u64 {
        let alignment = if array_elements > 1 {
            16
        } else {
            self.std140_alignment()
        };
        align_up(previous_end, alignment)
    }

    /// End offset of a block once a value of this type is appended after `previous_end`.
    pub const fn std140_end_after(&self, previous_end: u64, array_elements: u32) -> u64 {
        self.std140_offset_after(previous_end, array_elements) + self.std140_size(array_elements)
    }
}

const fn max_one(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        n
    }
}
