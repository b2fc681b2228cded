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

//! Small utility types shared by the rendering contracts.

pub mod data_type;
pub mod enums;
pub mod flags;
pub mod gpu_datatype;
pub mod typed_mem;

pub use self::data_type::DataType;
pub use self::enums::{IndexFormat, ShaderStage};
pub use self::flags::ShaderStageFlags;
pub use self::gpu_datatype::{BaseType, GpuDatatype};
pub use self::typed_mem::{GpuValue, TypedMem};
