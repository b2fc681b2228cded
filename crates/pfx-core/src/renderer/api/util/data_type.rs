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

//! Scalar storage types of vertex attribute data.

use serde::{Deserialize, Serialize};

/// The scalar type a vertex attribute component is stored as.
///
/// Variants are declared from the widest to the narrowest representation, so
/// the derived ordering makes `a.min(b)` the type able to hold both `a` and `b`
/// ("widening").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit float.
    Float32,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    UInt32,
    /// 16-bit signed integer.
    Int16,
    /// 16-bit unsigned integer.
    UInt16,
    /// 8-bit signed integer.
    Int8,
    /// 8-bit unsigned integer.
    UInt8,
}

impl DataType {
    /// Size of one component in bytes.
    pub const fn size(&self) -> u32 {
        match self {
            DataType::Float32 | DataType::Int32 | DataType::UInt32 => 4,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int8 | DataType::UInt8 => 1,
        }
    }

    /// Returns `true` for floating-point types.
    pub const fn is_float(&self) -> bool {
        matches!(self, DataType::Float32)
    }

    /// Returns the wider of two types.
    #[inline]
    pub fn widen(self, other: Self) -> Self {
        self.min(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_prefers_float_then_wider_integers() {
        assert_eq!(DataType::UInt8.widen(DataType::Float32), DataType::Float32);
        assert_eq!(DataType::Int16.widen(DataType::UInt32), DataType::UInt32);
        assert_eq!(DataType::UInt8.widen(DataType::Int8), DataType::Int8);
    }

    #[test]
    fn test_widening_is_monotonic() {
        let all = [
            DataType::Float32,
            DataType::Int32,
            DataType::UInt32,
            DataType::Int16,
            DataType::UInt16,
            DataType::Int8,
            DataType::UInt8,
        ];
        for a in all {
            for b in all {
                let w = a.widen(b);
                assert!(w <= a && w <= b);
                assert!(w.size() >= a.size().min(b.size()));
            }
        }
    }
}
