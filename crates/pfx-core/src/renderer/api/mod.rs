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

//! Handles, descriptors and plain data types exchanged with a rendering backend.

pub mod buffer;
pub mod descriptor;
pub mod device;
pub mod pass;
pub mod pipeline;
pub mod texture;
pub mod util;

pub use self::buffer::*;
pub use self::descriptor::*;
pub use self::device::*;
pub use self::pass::*;
pub use self::pipeline::*;
pub use self::texture::*;
pub use self::util::*;
