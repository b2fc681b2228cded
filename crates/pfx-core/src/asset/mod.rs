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

//! Scene assets the render manager binds effects to.
//!
//! A [`Model`] owns the node hierarchy and the meshes, materials, cameras, lights
//! and skeletons it references. Asset loading is out of scope: hosts build models
//! through the constructors here.

mod material;
mod mesh;
mod model;

pub use self::material::Material;
pub use self::mesh::{BoneBatch, FaceData, Mesh, VertexAttributeData, VertexData};
pub use self::model::{
    Camera, CameraProperties, Light, LightKind, Model, NodeObject, SceneNode, Skeleton, Texture,
    TransformState,
};
