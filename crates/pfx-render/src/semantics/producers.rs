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

//! Evaluation of node and model semantics against the scene.

use super::{ModelSemantic, NodeSemantic, SemanticProducer};
use pfx_core::asset::{Mesh, Model};
use pfx_core::math::{Mat3, Mat4, FRAC_PI_2};
use pfx_core::renderer::api::{GpuDatatype, TypedMem};

/// What a model semantic is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ModelContext<'a> {
    /// The scene.
    pub model: &'a Model,
    /// Width of the render target, in pixels.
    pub screen_width: u32,
    /// Height of the render target, in pixels.
    pub screen_height: u32,
}

impl<'a> ModelContext<'a> {
    /// Creates a context for `model` rendered at the given size.
    pub fn new(model: &'a Model, screen_width: u32, screen_height: u32) -> Self {
        Self {
            model,
            screen_width,
            screen_height,
        }
    }

    /// The projection of camera `camera`.
    ///
    /// A portrait target (height > width) gets a projection built for the rotated
    /// aspect ratio and rotated a quarter turn.
    pub fn projection(&self, camera: u32) -> Option<Mat4> {
        let props = self.model.camera_properties(camera as usize)?;
        let width = self.screen_width.max(1) as f32;
        let height = self.screen_height.max(1) as f32;
        if height > width {
            let proj = Mat4::perspective_rh_zo(props.fov_y, height / width, props.near, props.far);
            Some(Mat4::from_rotation_z(FRAC_PI_2) * proj)
        } else {
            Some(Mat4::perspective_rh_zo(props.fov_y, width / height, props.near, props.far))
        }
    }

    /// The view matrix of camera `camera`.
    pub fn view(&self, camera: u32) -> Option<Mat4> {
        let props = self.model.camera_properties(camera as usize)?;
        Mat4::look_at_rh(props.from, props.to, props.up)
    }

    /// Projection times view of camera `camera`.
    pub fn view_projection(&self, camera: u32) -> Option<Mat4> {
        Some(self.projection(camera)? * self.view(camera)?)
    }

    /// Writes the value of `semantic` into `out`. Returns `false` when the model
    /// lacks the camera or light.
    pub fn evaluate(&self, semantic: ModelSemantic, out: &mut TypedMem) -> bool {
        let value = match semantic {
            ModelSemantic::Projection(n) => self.projection(n).map(Value::Mat4),
            ModelSemantic::View(n) => self.view(n).map(Value::Mat4),
            ModelSemantic::ViewProjection(n) => self.view_projection(n).map(Value::Mat4),
            ModelSemantic::LightPosition(n) => self
                .model
                .light_position(n as usize)
                .map(|p| Value::Vec3(p.truncate())),
            ModelSemantic::LightDirection(n) => self
                .model
                .light_direction(n as usize)
                .map(|d| Value::Vec3(d.truncate())),
            ModelSemantic::LightColor(n) => self.model.light_color(n as usize).map(Value::Vec3),
        };
        match value {
            Some(Value::Mat4(m)) => out.set_value(m),
            Some(Value::Vec3(v)) => out.set_value(v),
            None => return false,
        }
        true
    }
}

enum Value {
    Mat4(Mat4),
    Vec3(pfx_core::math::Vec3),
}

/// What a node semantic is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// The owning model.
    pub model: ModelContext<'a>,
    /// The mesh the node draws.
    pub mesh: &'a Mesh,
    /// The scene node.
    pub asset_node: usize,
    /// The bone batch drawn.
    pub batch: u32,
}

impl NodeContext<'_> {
    fn world(&self) -> Mat4 {
        self.model.model.world_matrix(self.asset_node)
    }

    fn batch_bones(&self) -> Option<(usize, &[usize])> {
        let skeleton = self.mesh.skeleton()?;
        let batch = self.mesh.bone_batches().get(self.batch as usize)?;
        Some((skeleton, &batch.bones))
    }

    fn bone_matrix(&self, skeleton: usize, bone: usize) -> Mat4 {
        self.model
            .model
            .bone_world_matrix(skeleton, bone)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Writes the value of `semantic` into `out`. Returns `false` when the value
    /// does not exist for this node (an unskinned mesh, a bone past the batch).
    pub fn evaluate(&self, semantic: NodeSemantic, out: &mut TypedMem) -> bool {
        match semantic {
            NodeSemantic::WorldMatrix => out.set_value(self.world()),
            NodeSemantic::WorldMatrixIT => {
                out.set_value(Mat3::from_mat4(&self.world()).inverse_transpose())
            }
            NodeSemantic::ModelView => {
                let world = self.world();
                out.set_value(self.model.view(0).map_or(world, |view| view * world));
            }
            NodeSemantic::ModelViewProjection => {
                let world = self.world();
                out.set_value(self.model.view_projection(0).map_or(world, |vp| vp * world));
            }
            NodeSemantic::BoneCount => {
                let count = self.batch_bones().map_or(0, |(_, bones)| bones.len());
                out.set_value(count as i32);
            }
            NodeSemantic::BoneMatrices => {
                let Some((skeleton, bones)) = self.batch_bones().filter(|(_, b)| !b.is_empty()) else {
                    return false;
                };
                out.allocate(GpuDatatype::Mat4x4, bones.len() as u32);
                for (i, &bone) in bones.iter().enumerate() {
                    out.set_array_value(i as u32, self.bone_matrix(skeleton, bone));
                }
            }
            NodeSemantic::BoneMatricesIT => {
                let Some((skeleton, bones)) = self.batch_bones().filter(|(_, b)| !b.is_empty()) else {
                    return false;
                };
                out.allocate(GpuDatatype::Mat3x3, bones.len() as u32);
                for (i, &bone) in bones.iter().enumerate() {
                    let m = Mat3::from_mat4(&self.bone_matrix(skeleton, bone)).inverse_transpose();
                    out.set_array_value(i as u32, m);
                }
            }
            NodeSemantic::BoneMatrix(index) | NodeSemantic::BoneMatrixIT(index) => {
                let Some((skeleton, bone)) = self
                    .batch_bones()
                    .and_then(|(s, bones)| Some((s, *bones.get(index as usize)?)))
                else {
                    return false;
                };
                let m = self.bone_matrix(skeleton, bone);
                if matches!(semantic, NodeSemantic::BoneMatrixIT(_)) {
                    out.set_value(Mat3::from_mat4(&m).inverse_transpose());
                } else {
                    out.set_value(m);
                }
            }
        }
        true
    }

    /// Evaluates any producer a node binding can hold.
    pub(crate) fn produce(&self, producer: &SemanticProducer, out: &mut TypedMem) -> bool {
        match producer {
            SemanticProducer::Constant(value) => {
                if !out.is_data_compatible(value) {
                    out.allocate(value.datatype(), value.array_elements());
                }
                out.copy_from(value)
            }
            SemanticProducer::Node(semantic) => self.evaluate(*semantic, out),
            SemanticProducer::Model(semantic) => self.model.evaluate(*semantic, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pfx_core::asset::{BoneBatch, Camera, NodeObject, SceneNode, Skeleton};
    use pfx_core::math::{Vec3, Vec4};
    use pfx_core::renderer::api::PrimitiveTopology;

    fn node(parent: Option<usize>, t: Vec3, object: NodeObject) -> SceneNode {
        SceneNode {
            name: String::new(),
            parent,
            local_transform: Mat4::from_translation(t),
            object,
        }
    }

    fn skinned_model() -> Model {
        let mut model = Model::new();
        let mut mesh = Mesh::new(3, PrimitiveTopology::TriangleList);
        mesh.set_skinning(
            0,
            vec![
                BoneBatch { bones: vec![0, 1] },
                BoneBatch { bones: vec![2] },
            ],
        );
        let mesh = model.add_mesh(mesh);
        let b0 = model.add_node(node(None, Vec3::X, NodeObject::Empty));
        let b1 = model.add_node(node(Some(b0), Vec3::Y, NodeObject::Empty));
        let b2 = model.add_node(node(None, Vec3::Z, NodeObject::Empty));
        model.add_skeleton(Skeleton {
            bones: vec![b0, b1, b2],
            inverse_bind_matrices: vec![Mat4::IDENTITY; 3],
        });
        model.add_node(node(
            None,
            Vec3::new(0.0, 0.0, -2.0),
            NodeObject::Mesh { mesh, material: 0 },
        ));
        let cam = model.add_camera(Camera {
            fov_y: 1.0,
            near: 0.1,
            far: 10.0,
            target: None,
        });
        model.add_node(node(None, Vec3::ZERO, NodeObject::Camera(cam)));
        model.commit();
        model
    }

    #[test]
    fn test_bone_matrices_follow_the_batch() {
        let model = skinned_model();
        let ctx = ModelContext::new(&model, 800, 600);
        let mut out = TypedMem::default();

        let batch0 = NodeContext { model: ctx, mesh: &model.meshes()[0], asset_node: 3, batch: 0 };
        assert!(batch0.evaluate(NodeSemantic::BoneMatrices, &mut out));
        assert_eq!(out.array_elements(), 2);
        let m1: Mat4 = out.array_value(1).expect("two bones");
        assert_eq!(m1.translation(), Vec3::new(1.0, 1.0, 0.0));

        let batch1 = NodeContext { batch: 1, ..batch0 };
        assert!(batch1.evaluate(NodeSemantic::BoneMatrices, &mut out));
        assert_eq!(out.array_elements(), 1);
        let m0: Mat4 = out.value().expect("one bone");
        assert_eq!(m0.translation(), Vec3::Z);

        assert!(batch1.evaluate(NodeSemantic::BoneCount, &mut out));
        assert_eq!(out.value::<i32>(), Some(1));
        assert!(!batch1.evaluate(NodeSemantic::BoneMatrix(1), &mut out));
    }

    #[test]
    fn test_model_view_projection_uses_camera_zero() {
        let model = skinned_model();
        let ctx = ModelContext::new(&model, 800, 600);
        let node = NodeContext { model: ctx, mesh: &model.meshes()[0], asset_node: 3, batch: 0 };
        let mut out = TypedMem::default();
        assert!(node.evaluate(NodeSemantic::ModelView, &mut out));
        let mv: Mat4 = out.value().expect("mat4");
        // The camera sits at the origin looking down -Z, so the view is identity.
        assert_relative_eq!(mv.translation().z, -2.0, epsilon = 1e-5);

        assert!(node.evaluate(NodeSemantic::ModelViewProjection, &mut out));
        let mvp: Mat4 = out.value().expect("mat4");
        let clip = mvp * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.w, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_portrait_projection_is_rotated() {
        let model = skinned_model();
        let landscape = ModelContext::new(&model, 800, 600).projection(0).expect("camera");
        let portrait = ModelContext::new(&model, 600, 800).projection(0).expect("camera");
        assert_relative_eq!(landscape.cols[1].x, 0.0);
        assert!(portrait.cols[1].x.abs() > 0.5);
    }

    #[test]
    fn test_missing_camera_or_light_fails() {
        let model = Model::new();
        let ctx = ModelContext::new(&model, 1, 1);
        let mut out = TypedMem::default();
        assert!(!ctx.evaluate(ModelSemantic::View(0), &mut out));
        assert!(!ctx.evaluate(ModelSemantic::LightColor(0), &mut out));
    }
}
