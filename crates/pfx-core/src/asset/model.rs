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

use super::material::Material;
use super::mesh::Mesh;
use crate::math::{LinearRgba, Mat4, Vec3, Vec4};

/// Whether the cached world matrices of a [`Model`] reflect its local transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    /// World matrices are up to date.
    Clean,
    /// A local transform changed since the last [`Model::commit`].
    Dirty,
}

/// What a scene node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeObject {
    /// A mesh drawn with a material.
    Mesh {
        /// Index into the model's meshes.
        mesh: usize,
        /// Index into the model's materials.
        material: usize,
    },
    /// A camera, indexing the model's cameras.
    Camera(usize),
    /// A light, indexing the model's lights.
    Light(usize),
    /// A transform-only node (bones, pivots).
    Empty,
}

/// A node of the model hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// The node name.
    pub name: String,
    /// The parent node. Parents always precede their children.
    pub parent: Option<usize>,
    /// The transform relative to the parent.
    pub local_transform: Mat4,
    /// The object attached to the node.
    pub object: NodeObject,
}

/// Camera intrinsics. The camera looks down its node's -Z axis unless it has a
/// target node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// A node the camera is aimed at.
    pub target: Option<usize>,
}

/// The resolved world-space properties of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraProperties {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Eye position.
    pub from: Vec3,
    /// Point looked at.
    pub to: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

/// The kind of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    /// Emits in every direction from its position.
    #[default]
    Point,
    /// Emits along the node's -Y axis from infinitely far away.
    Directional,
    /// Emits a cone along the node's -Y axis.
    Spot,
}

/// A light. Position and direction come from its node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// The kind of light.
    pub kind: LightKind,
    /// Linear colour.
    pub color: Vec3,
}

/// A bone hierarchy a skinned mesh is bound to.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    /// The node of each bone.
    pub bones: Vec<usize>,
    /// The inverse bind pose of each bone.
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// A texture referenced by name. The image itself is the host's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// The name used to resolve the texture view.
    pub name: String,
}

/// A complete scene: node hierarchy plus the assets the nodes reference.
#[derive(Debug, Clone)]
pub struct Model {
    nodes: Vec<SceneNode>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    cameras: Vec<Camera>,
    lights: Vec<Light>,
    skeletons: Vec<Skeleton>,
    textures: Vec<Texture>,
    clear_color: LinearRgba,
    mesh_nodes: Vec<usize>,
    camera_nodes: Vec<usize>,
    light_nodes: Vec<usize>,
    world: Vec<Mat4>,
    state: TransformState,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            skeletons: Vec::new(),
            textures: Vec::new(),
            clear_color: LinearRgba::BLACK,
            mesh_nodes: Vec::new(),
            camera_nodes: Vec::new(),
            light_nodes: Vec::new(),
            world: Vec::new(),
            state: TransformState::Clean,
        }
    }

    /// Adds a mesh and returns its index.
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Adds a material and returns its index.
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Adds a camera and returns its index.
    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    /// Adds a light and returns its index.
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Adds a skeleton and returns its index.
    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> usize {
        self.skeletons.push(skeleton);
        self.skeletons.len() - 1
    }

    /// Adds a texture and returns its index.
    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Adds a node and returns its index. A parent that does not precede the node
    /// is ignored and the node becomes a root.
    pub fn add_node(&mut self, mut node: SceneNode) -> usize {
        let index = self.nodes.len();
        if node.parent.is_some_and(|p| p >= index) {
            log::warn!(
                "Node '{}' references parent {:?} which is not yet defined; treating it as a root",
                node.name,
                node.parent
            );
            node.parent = None;
        }
        match node.object {
            NodeObject::Mesh { .. } => self.mesh_nodes.push(index),
            NodeObject::Camera(_) => self.camera_nodes.push(index),
            NodeObject::Light(_) => self.light_nodes.push(index),
            NodeObject::Empty => {}
        }
        self.nodes.push(node);
        self.world.push(Mat4::IDENTITY);
        self.state = TransformState::Dirty;
        index
    }

    /// Replaces the local transform of a node and marks the model dirty.
    pub fn set_local_transform(&mut self, node: usize, transform: Mat4) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.local_transform = transform;
            self.state = TransformState::Dirty;
        }
    }

    /// Recomputes the cached world matrices and marks the model clean.
    pub fn commit(&mut self) {
        for i in 0..self.nodes.len() {
            let local = self.nodes[i].local_transform;
            self.world[i] = match self.nodes[i].parent {
                Some(p) => self.world[p] * local,
                None => local,
            };
        }
        self.state = TransformState::Clean;
    }

    /// The transform cache state.
    pub fn transform_state(&self) -> TransformState {
        self.state
    }

    /// Returns `true` when local transforms changed since the last commit.
    pub fn is_dirty(&self) -> bool {
        self.state == TransformState::Dirty
    }

    /// Sets the colour render passes drawing this model clear to.
    pub fn set_clear_color(&mut self, color: LinearRgba) {
        self.clear_color = color;
    }

    /// The clear colour.
    pub fn clear_color(&self) -> LinearRgba {
        self.clear_color
    }

    /// All nodes.
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// A node by index.
    pub fn node(&self, index: usize) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    /// Indices of the nodes carrying a mesh, in node order.
    pub fn mesh_nodes(&self) -> &[usize] {
        &self.mesh_nodes
    }

    /// A mesh by index.
    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    /// All meshes.
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// A material by index.
    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// A texture by index.
    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    /// A skeleton by index.
    pub fn skeleton(&self, index: usize) -> Option<&Skeleton> {
        self.skeletons.get(index)
    }

    /// Number of cameras placed in the hierarchy.
    pub fn num_camera_nodes(&self) -> usize {
        self.camera_nodes.len()
    }

    /// Number of lights placed in the hierarchy.
    pub fn num_light_nodes(&self) -> usize {
        self.light_nodes.len()
    }

    /// The cached world matrix of a node (identity for an unknown node).
    pub fn world_matrix(&self, node: usize) -> Mat4 {
        self.world.get(node).copied().unwrap_or(Mat4::IDENTITY)
    }

    /// The world matrix of `bone` of `skeleton`, composed with its inverse bind pose.
    pub fn bone_world_matrix(&self, skeleton: usize, bone: usize) -> Option<Mat4> {
        let skeleton = self.skeletons.get(skeleton)?;
        let node = *skeleton.bones.get(bone)?;
        let inverse_bind = skeleton
            .inverse_bind_matrices
            .get(bone)
            .copied()
            .unwrap_or(Mat4::IDENTITY);
        Some(self.world_matrix(node) * inverse_bind)
    }

    /// Resolves the world-space properties of camera `index`.
    pub fn camera_properties(&self, index: usize) -> Option<CameraProperties> {
        let node_index = *self.camera_nodes.get(index)?;
        let camera = match self.nodes[node_index].object {
            NodeObject::Camera(c) => *self.cameras.get(c)?,
            _ => return None,
        };
        let world = self.world_matrix(node_index);
        let from = world.translation();
        let to = match camera.target {
            Some(target) => self.world_matrix(target).translation(),
            None => from + world.transform_vector(-Vec3::Z),
        };
        Some(CameraProperties {
            fov_y: camera.fov_y,
            from,
            to,
            up: world.transform_vector(Vec3::Y).normalize(),
            near: camera.near,
            far: camera.far,
        })
    }

    /// World position of light `index`, as a point (w = 1).
    pub fn light_position(&self, index: usize) -> Option<Vec4> {
        let node = *self.light_nodes.get(index)?;
        Some(Vec4::from_vec3(self.world_matrix(node).translation(), 1.0))
    }

    /// World direction of light `index`, as a direction (w = 0).
    pub fn light_direction(&self, index: usize) -> Option<Vec4> {
        let node = *self.light_nodes.get(index)?;
        let dir = self
            .world_matrix(node)
            .transform_vector(-Vec3::Y)
            .normalize();
        Some(Vec4::from_vec3(dir, 0.0))
    }

    /// Colour of light `index`.
    pub fn light_color(&self, index: usize) -> Option<Vec3> {
        let node = *self.light_nodes.get(index)?;
        match self.nodes[node].object {
            NodeObject::Light(l) => self.lights.get(l).map(|light| light.color),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn node(name: &str, parent: Option<usize>, t: Vec3, object: NodeObject) -> SceneNode {
        SceneNode {
            name: name.into(),
            parent,
            local_transform: Mat4::from_translation(t),
            object,
        }
    }

    #[test]
    fn test_commit_composes_parent_transforms() {
        let mut model = Model::new();
        let root = model.add_node(node("root", None, Vec3::X, NodeObject::Empty));
        let child = model.add_node(node("child", Some(root), Vec3::Y, NodeObject::Empty));
        assert!(model.is_dirty());
        model.commit();
        assert_eq!(model.transform_state(), TransformState::Clean);
        assert_eq!(model.world_matrix(child).translation(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_setting_local_transform_marks_dirty_until_commit() {
        let mut model = Model::new();
        let root = model.add_node(node("root", None, Vec3::ZERO, NodeObject::Empty));
        model.commit();
        model.set_local_transform(root, Mat4::from_translation(Vec3::Z));
        assert!(model.is_dirty());
        assert_eq!(model.world_matrix(root).translation(), Vec3::ZERO);
        model.commit();
        assert_eq!(model.world_matrix(root).translation(), Vec3::Z);
    }

    #[test]
    fn test_forward_parent_reference_becomes_root() {
        let mut model = Model::new();
        let n = model.add_node(node("orphan", Some(5), Vec3::X, NodeObject::Empty));
        assert_eq!(model.node(n).and_then(|n| n.parent), None);
    }

    #[test]
    fn test_camera_and_light_queries() {
        let mut model = Model::new();
        let cam = model.add_camera(Camera {
            fov_y: 1.0,
            near: 0.1,
            far: 100.0,
            target: None,
        });
        let light = model.add_light(Light {
            kind: LightKind::Point,
            color: Vec3::new(1.0, 0.5, 0.25),
        });
        model.add_node(node("cam", None, Vec3::new(0.0, 0.0, 5.0), NodeObject::Camera(cam)));
        model.add_node(node("light", None, Vec3::new(0.0, 3.0, 0.0), NodeObject::Light(light)));
        model.commit();

        let props = model.camera_properties(0).expect("camera 0 exists");
        assert_relative_eq!(props.to.z, 4.0);
        assert_relative_eq!(props.up.y, 1.0);
        assert!(model.camera_properties(1).is_none());

        assert_eq!(model.light_position(0), Some(Vec4::new(0.0, 3.0, 0.0, 1.0)));
        assert_eq!(model.light_direction(0), Some(Vec4::new(0.0, -1.0, 0.0, 0.0)));
        assert_eq!(model.light_color(0), Some(Vec3::new(1.0, 0.5, 0.25)));
        assert!(model.light_color(1).is_none());
    }
}
