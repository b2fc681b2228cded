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

//! Shared fixtures for the integration tests: an in-memory device, a recorder
//! that logs every command, and a small scene.

#![allow(dead_code)]

use pfx_core::asset::{
    BoneBatch, Camera, Light, LightKind, Material, Mesh, Model, NodeObject, SceneNode, Skeleton,
};
use pfx_core::effect::{
    BufferDescription, DescriptorSetSlot, EffectDescription, PassDescription, PipelineCondition,
    PipelineDescription, SubpassDescription, SubpassGroupDescription, UniformDescription,
    VariableScope,
};
use pfx_core::math::{LinearRgba, Mat4, Vec3, Vec4};
use pfx_core::renderer::api::{
    BufferDescriptor, BufferId, DataType, DescriptorSetId, DescriptorSetLayoutId, DescriptorType,
    DeviceLimits, FramebufferId, GpuDatatype, IndexFormat, MemoryLocation, MemoryProperties,
    PipelineLayoutId, PipelineStateId, PrimitiveTopology, RenderPassBeginInfo, RenderPassId,
    RenderPipelineDescriptor, RenderPipelineId, ShaderStageFlags, WriteDescriptorSet,
};
use pfx_core::renderer::{CommandRecorder, GraphicsDevice, PipelineError, ResourceError};
use pfx_render::{EffectId, ModelId, RenderManager, RenderManagerSettings};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock device
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MockBuffer {
    pub label: Option<String>,
    pub bytes: Vec<u8>,
    pub location: MemoryLocation,
    pub mapped: bool,
    pub destroyed: bool,
}

#[derive(Debug)]
pub struct MockPipeline {
    pub label: Option<String>,
    pub vertex_buffer_count: usize,
    pub topology: PrimitiveTopology,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub buffers: Vec<MockBuffer>,
    pub descriptor_sets: Vec<DescriptorSetLayoutId>,
    pub writes: Vec<WriteDescriptorSet>,
    pub pipelines: Vec<MockPipeline>,
    pub flushes: Vec<(BufferId, u64, u64)>,
    pub maps: usize,
    pub unmaps: usize,
}

/// A device whose buffers live in host memory.
#[derive(Debug)]
pub struct MockGraphicsDevice {
    state: Mutex<MockState>,
    host_coherent: bool,
    fail_pipelines: bool,
    fail_writes: AtomicBool,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_coherency(false)
    }

    pub fn with_coherency(host_coherent: bool) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            host_coherent,
            fail_pipelines: false,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A device that refuses every pipeline.
    pub fn failing_pipelines() -> Self {
        Self {
            fail_pipelines: true,
            ..Self::new()
        }
    }

    /// Makes every later `write_buffer` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Unmaps every buffer, as a device without persistent mappings would
    /// after creation.
    pub fn drop_mappings(&self) {
        for buffer in &mut self.state().buffers {
            buffer.mapped = false;
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn read(&self, buffer: BufferId, offset: u64, len: usize) -> Vec<u8> {
        let state = self.state();
        let start = offset as usize;
        state.buffers[buffer.0].bytes[start..start + len].to_vec()
    }

    pub fn read_f32s(&self, buffer: BufferId, offset: u64, count: usize) -> Vec<f32> {
        self.read(buffer, offset, count * 4)
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }

    pub fn read_i32(&self, buffer: BufferId, offset: u64) -> i32 {
        bytemuck::pod_read_unaligned(&self.read(buffer, offset, 4))
    }

    /// Translation column of a column-major mat4 stored at `offset`.
    pub fn read_translation(&self, buffer: BufferId, offset: u64) -> Vec3 {
        let t = self.read_f32s(buffer, offset + 48, 3);
        Vec3::new(t[0], t[1], t[2])
    }

    pub fn buffer_size(&self, buffer: BufferId) -> usize {
        self.state().buffers[buffer.0].bytes.len()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        DeviceLimits::default()
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let mut state = self.state();
        state.buffers.push(MockBuffer {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            bytes: vec![0; descriptor.size as usize],
            location: descriptor.location,
            mapped: descriptor.mapped_at_creation,
            destroyed: false,
        });
        Ok(BufferId(state.buffers.len() - 1))
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let mut state = self.state();
        state.buffers.push(MockBuffer {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            bytes: data.to_vec(),
            location: descriptor.location,
            mapped: false,
            destroyed: false,
        });
        Ok(BufferId(state.buffers.len() - 1))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state.buffers.get_mut(id.0).ok_or(ResourceError::InvalidHandle)?;
        buffer.destroyed = true;
        Ok(())
    }

    fn buffer_memory_properties(&self, id: BufferId) -> Result<MemoryProperties, ResourceError> {
        let state = self.state();
        let buffer = state.buffers.get(id.0).ok_or(ResourceError::InvalidHandle)?;
        Ok(MemoryProperties {
            host_visible: buffer.location == MemoryLocation::HostVisible,
            host_coherent: self.host_coherent,
        })
    }

    fn is_buffer_mapped(&self, id: BufferId) -> bool {
        self.state().buffers.get(id.0).is_some_and(|b| b.mapped)
    }

    fn map_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state.maps += 1;
        let buffer = state.buffers.get_mut(id.0).ok_or(ResourceError::InvalidHandle)?;
        buffer.mapped = true;
        Ok(())
    }

    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state.unmaps += 1;
        let buffer = state.buffers.get_mut(id.0).ok_or(ResourceError::InvalidHandle)?;
        if !buffer.mapped {
            return Err(ResourceError::NotMapped);
        }
        buffer.mapped = false;
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ResourceError::BackendError("write refused by the mock device".into()));
        }
        let mut state = self.state();
        let buffer = state.buffers.get_mut(id.0).ok_or(ResourceError::InvalidHandle)?;
        if !buffer.mapped {
            return Err(ResourceError::NotMapped);
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.bytes.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush_buffer_range(&self, id: BufferId, offset: u64, size: u64) -> Result<(), ResourceError> {
        self.state().flushes.push((id, offset, size));
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, ResourceError> {
        let mut state = self.state();
        state.descriptor_sets.push(layout);
        Ok(DescriptorSetId(state.descriptor_sets.len() - 1))
    }

    fn update_descriptor_sets(&self, writes: &[WriteDescriptorSet]) -> Result<(), ResourceError> {
        self.state().writes.extend_from_slice(writes);
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        if self.fail_pipelines {
            return Err(PipelineError::CreationFailed {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                details: "rejected by the mock device".into(),
            }
            .into());
        }
        let mut state = self.state();
        state.pipelines.push(MockPipeline {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            vertex_buffer_count: descriptor.vertex_buffers.len(),
            topology: descriptor.topology,
        });
        Ok(RenderPipelineId(state.pipelines.len() - 1))
    }

    fn destroy_render_pipeline(&self, _id: RenderPipelineId) -> Result<(), ResourceError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock recorder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass {
        framebuffer: FramebufferId,
        clear_color: LinearRgba,
    },
    NextSubpass,
    EndRenderPass,
    BindPipeline(RenderPipelineId),
    BindDescriptorSet {
        set_index: u32,
        set: DescriptorSetId,
        offsets: Vec<u32>,
    },
    BindVertexBuffer {
        binding: u32,
        buffer: BufferId,
    },
    BindIndexBuffer {
        buffer: BufferId,
        format: IndexFormat,
    },
    PushConstants {
        offset: u32,
        data: Vec<u8>,
    },
    Draw(Range<u32>),
    DrawIndexed(Range<u32>),
}

#[derive(Debug, Default)]
pub struct MockRecorder {
    pub commands: Vec<Command>,
}

impl MockRecorder {
    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl CommandRecorder for MockRecorder {
    fn begin_render_pass(&mut self, info: &RenderPassBeginInfo) {
        self.commands.push(Command::BeginRenderPass {
            framebuffer: info.framebuffer,
            clear_color: info.clear_color,
        });
    }

    fn next_subpass(&mut self) {
        self.commands.push(Command::NextSubpass);
    }

    fn end_render_pass(&mut self) {
        self.commands.push(Command::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(
        &mut self,
        _layout: PipelineLayoutId,
        set_index: u32,
        set: DescriptorSetId,
        dynamic_offsets: &[u32],
    ) {
        self.commands.push(Command::BindDescriptorSet {
            set_index,
            set,
            offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, _offset: u64) {
        self.commands.push(Command::BindVertexBuffer { binding, buffer });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, _offset: u64, format: IndexFormat) {
        self.commands.push(Command::BindIndexBuffer { buffer, format });
    }

    fn push_constants(
        &mut self,
        _layout: PipelineLayoutId,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.commands.push(Command::PushConstants {
            offset,
            data: data.to_vec(),
        });
    }

    fn draw(&mut self, vertices: Range<u32>, _instances: Range<u32>) {
        self.commands.push(Command::Draw(vertices));
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.commands.push(Command::DrawIndexed(indices));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene fixtures
// ─────────────────────────────────────────────────────────────────────────────

pub const SWAPCHAIN_LENGTH: u32 = 2;
pub const CLEAR_COLOR: LinearRgba = LinearRgba::new(0.1, 0.2, 0.3, 1.0);
pub const PAINT: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

/// Skinned mesh node, then plain mesh node, in model node order.
pub const SKINNED_NODE: usize = 3;
pub const PLAIN_NODE: usize = 4;

pub fn settings() -> RenderManagerSettings {
    RenderManagerSettings {
        swapchain_length: SWAPCHAIN_LENGTH,
        screen_width: 800,
        screen_height: 600,
        ..RenderManagerSettings::default()
    }
}

/// Node-scope transforms, bone-batch-scope bones, effect-scope frame data and
/// model-scope lighting, drawn by a skinned and a plain pipeline.
///
/// Pass "main" has two subpasses: "opaque" (skinned, then plain) and
/// "overlay" (plain only).
pub fn scene_effect() -> EffectDescription {
    let mut effect = EffectDescription::new("scene");
    effect.buffers = vec![
        BufferDescription::new("Transforms", VariableScope::Node)
            .with_entry("WORLD", GpuDatatype::Mat4x4, 1)
            .with_entry("MVP", GpuDatatype::Mat4x4, 1)
            .multi_buffered()
            .with_reserved_clients(2),
        BufferDescription::new("Bones", VariableScope::BoneBatch)
            .with_entry("BONECOUNT", GpuDatatype::Int32, 1)
            .with_entry("BONEMATRICES", GpuDatatype::Mat4x4, 4),
        BufferDescription::new("Frame", VariableScope::Effect).with_entry("TIME", GpuDatatype::Float32, 1),
        BufferDescription::new("Lighting", VariableScope::Model)
            .with_entry("LIGHTPOSITION", GpuDatatype::Vec3, 1)
            .with_entry("FOGCOLOR", GpuDatatype::Vec3, 1),
    ];

    let common = |name: &str, state: usize| {
        PipelineDescription::new(name, PipelineStateId(state), PipelineLayoutId(state))
            .with_descriptor_set(0, DescriptorSetSlot::new(DescriptorSetLayoutId(0)).multi_buffered())
            .with_descriptor_set(1, DescriptorSetSlot::new(DescriptorSetLayoutId(1)))
            .with_attribute("POSITION", GpuDatatype::Vec3, 0, 0)
            .with_attribute("NORMAL", GpuDatatype::Vec3, 1, 0)
            .with_buffer("Transforms", 0, 0, DescriptorType::UniformBufferDynamic)
            .with_buffer("Frame", 0, 2, DescriptorType::UniformBuffer)
            .with_buffer("Lighting", 1, 0, DescriptorType::UniformBuffer)
    };
    effect.pipelines = vec![
        common("skinned", 0)
            .with_attribute("BONEWEIGHT", GpuDatatype::Float32, 2, 0)
            .with_condition(PipelineCondition::AttributeRequired("BONEWEIGHT".into()))
            .with_buffer("Bones", 0, 1, DescriptorType::UniformBufferDynamic),
        common("plain", 1).with_uniform(
            UniformDescription::new("COLOR", GpuDatatype::Vec4, VariableScope::Node)
                .push_constant(0, ShaderStageFlags::VERTEX_FRAGMENT),
        ),
    ];

    effect.passes = vec![PassDescription {
        name: "main".into(),
        render_pass: RenderPassId(0),
        framebuffers: vec![FramebufferId(10), FramebufferId(11)],
        subpasses: vec![
            SubpassDescription {
                groups: vec![SubpassGroupDescription {
                    name: "opaque".into(),
                    pipelines: vec!["skinned".into(), "plain".into()],
                }],
            },
            SubpassDescription {
                groups: vec![SubpassGroupDescription {
                    name: "overlay".into(),
                    pipelines: vec!["plain".into()],
                }],
            },
        ],
    }];
    effect
}

fn scene_node(parent: Option<usize>, translation: Vec3, object: NodeObject) -> SceneNode {
    SceneNode {
        name: String::new(),
        parent,
        local_transform: Mat4::from_translation(translation),
        object,
    }
}

fn vertex_bytes(floats: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(floats).to_vec()
}

/// Three bones (bone 1 is a child of bone 0), a skinned indexed triangle split
/// into two bone batches, a plain non-indexed triangle, a camera and a light.
pub fn scene_model() -> Model {
    let mut model = Model::new();

    let mut skinned = Mesh::new(3, PrimitiveTopology::TriangleList);
    let data = skinned.add_vertex_data(vertex_bytes(&[0.0; 7 * 3]), 28);
    skinned
        .add_attribute("POSITION", DataType::Float32, 3, 0, data)
        .add_attribute("NORMAL", DataType::Float32, 3, 12, data)
        .add_attribute("BONEWEIGHT", DataType::Float32, 1, 24, data);
    skinned.set_faces(bytemuck::cast_slice(&[0u16, 1, 2]).to_vec(), IndexFormat::Uint16);
    skinned.set_skinning(
        0,
        vec![BoneBatch { bones: vec![0, 1] }, BoneBatch { bones: vec![2] }],
    );
    let skinned = model.add_mesh(skinned);

    let mut plain = Mesh::new(3, PrimitiveTopology::TriangleList);
    let data = plain.add_vertex_data(vertex_bytes(&[0.0; 6 * 3]), 24);
    plain
        .add_attribute("POSITION", DataType::Float32, 3, 0, data)
        .add_attribute("NORMAL", DataType::Float32, 3, 12, data);
    let plain = model.add_mesh(plain);

    let skin = model.add_material(Material::new("skin"));
    let mut paint = Material::new("paint");
    paint.set_semantic("COLOR", pfx_core::renderer::api::TypedMem::from_value(PAINT));
    let paint = model.add_material(paint);

    let b0 = model.add_node(scene_node(None, Vec3::X, NodeObject::Empty));
    let b1 = model.add_node(scene_node(Some(b0), Vec3::Y, NodeObject::Empty));
    let b2 = model.add_node(scene_node(None, Vec3::Z, NodeObject::Empty));
    model.add_skeleton(Skeleton {
        bones: vec![b0, b1, b2],
        inverse_bind_matrices: vec![Mat4::IDENTITY; 3],
    });
    model.add_node(scene_node(
        None,
        Vec3::new(0.0, 0.0, -2.0),
        NodeObject::Mesh {
            mesh: skinned,
            material: skin,
        },
    ));
    model.add_node(scene_node(
        None,
        Vec3::new(1.0, 0.0, -2.0),
        NodeObject::Mesh {
            mesh: plain,
            material: paint,
        },
    ));
    let camera = model.add_camera(Camera {
        fov_y: 1.0,
        near: 0.1,
        far: 100.0,
        target: None,
    });
    model.add_node(scene_node(None, Vec3::ZERO, NodeObject::Camera(camera)));
    let light = model.add_light(Light {
        kind: LightKind::Point,
        color: Vec3::ONE,
    });
    model.add_node(scene_node(None, Vec3::new(0.0, 5.0, 0.0), NodeObject::Light(light)));
    model.set_clear_color(CLEAR_COLOR);
    model.commit();
    model
}

pub struct Scene {
    pub device: Arc<MockGraphicsDevice>,
    pub manager: RenderManager,
    pub effect: EffectId,
    pub model: ModelId,
}

/// The scene model attached to the "opaque" group only, built, with automatic
/// semantics created.
pub fn built_scene() -> Scene {
    built_scene_on(MockGraphicsDevice::new())
}

pub fn built_scene_on(device: MockGraphicsDevice) -> Scene {
    init_logging();
    let device = Arc::new(device);
    let mut manager = RenderManager::new(device.clone(), settings());
    let effect = manager.add_effect(scene_effect()).expect("effect is valid");
    let model = manager.add_model(scene_model()).expect("not built yet");
    manager
        .add_model_for_subpass_group(model, effect, 0, 0, 0)
        .expect("opaque group exists");
    manager.build_render_objects().expect("build succeeds");
    manager.create_automatic_semantics().expect("built");
    Scene {
        device,
        manager,
        effect,
        model,
    }
}
