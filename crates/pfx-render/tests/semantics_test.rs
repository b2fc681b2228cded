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

//! Integration tests for automatic semantics, manual updates, update batches
//! and runtime dynamic clients.

mod common;

use approx::assert_relative_eq;
use common::*;
use pfx_core::math::{Mat4, Vec3, Vec4};
use pfx_core::renderer::api::{BufferId, TypedMem};
use pfx_core::renderer::GraphicsDevice;
use pfx_render::semantics::{NodeSemantic, SemanticProducer};
use pfx_render::{AllocationError, NodeIndex, RenderManagerError};

fn buffer_id(scene: &Scene, name: &str) -> BufferId {
    let index = scene.manager.find_buffer(scene.effect, name).unwrap();
    scene.manager.buffer(index).unwrap().buffer().unwrap()
}

fn slice_offset(scene: &Scene, name: &str, swap: u32, client: u32) -> u64 {
    let index = scene.manager.find_buffer(scene.effect, name).unwrap();
    scene.manager.buffer(index).unwrap().slice(swap, client).offset
}

// ─────────────────────────────────────────────────────────────────────────────
// Automatic bindings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bindings_cover_every_resolvable_entry() {
    let scene = built_scene();
    let structure = scene.manager.structure();

    let skinned = &structure[NodeIndex(0)];
    let producers: Vec<_> = skinned.buffer_bindings().iter().map(|b| b.producer().clone()).collect();
    assert_eq!(
        producers,
        [
            SemanticProducer::Node(NodeSemantic::WorldMatrix),
            SemanticProducer::Node(NodeSemantic::ModelViewProjection),
            SemanticProducer::Node(NodeSemantic::BoneCount),
            SemanticProducer::Node(NodeSemantic::BoneMatrices),
        ]
    );
    let bones: Vec<_> = structure[NodeIndex(1)]
        .buffer_bindings()
        .iter()
        .filter(|b| b.producer() == &SemanticProducer::Node(NodeSemantic::BoneCount))
        .map(|b| b.client())
        .collect();
    assert_eq!(bones, [1], "the second batch writes the second bone slice");

    let plain = &structure[NodeIndex(2)];
    assert_eq!(plain.buffer_bindings().len(), 2);
    assert_eq!(plain.uniform_bindings().len(), 1, "COLOR comes from the material");
    assert!(matches!(
        plain.uniform_bindings()[0].producer(),
        SemanticProducer::Constant(_)
    ));
}

#[test]
fn test_only_automatic_model_entries_are_bound() {
    let scene = built_scene();
    let structure = scene.manager.structure();
    let pipeline = scene.manager.find_pipeline(scene.effect, 0, 0, 0, "skinned").unwrap();
    let bindings = structure[pipeline].model_buffer_bindings();
    assert_eq!(bindings.len(), 1, "FOGCOLOR has no producer");
    assert_eq!(bindings[0].model(), scene.model);
    assert_eq!(bindings[0].client(), 0);
}

#[test]
fn test_creating_semantics_twice_yields_the_same_bindings() {
    let mut scene = built_scene();
    let before: Vec<_> = scene
        .manager
        .structure()
        .node_indices()
        .map(|n| scene.manager.structure()[n].buffer_bindings().to_vec())
        .collect();
    scene.manager.create_automatic_semantics().unwrap();
    let after: Vec<_> = scene
        .manager
        .structure()
        .node_indices()
        .map(|n| scene.manager.structure()[n].buffer_bindings().to_vec())
        .collect();
    assert_eq!(before, after);
}

// ─────────────────────────────────────────────────────────────────────────────
// Automatic updates
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bone_batches_write_their_own_bones() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(0).unwrap();
    let bones = buffer_id(&scene, "Bones");

    assert_eq!(scene.device.read_i32(bones, 0), 2);
    assert_eq!(scene.device.read_i32(bones, 512), 1);
    // BONEMATRICES starts at 16; element 1 of batch 0 is bone 1, child of bone 0.
    assert_eq!(scene.device.read_translation(bones, 16 + 64), Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(scene.device.read_translation(bones, 512 + 16), Vec3::Z);
}

#[test]
fn test_world_matrices_land_in_each_swap_copy() {
    let mut scene = built_scene();
    let transforms = buffer_id(&scene, "Transforms");

    scene.manager.update_automatic_semantics(1).unwrap();
    let swap1 = slice_offset(&scene, "Transforms", 1, 2);
    assert_eq!(swap1, 1792);
    assert_eq!(scene.device.read_translation(transforms, swap1), Vec3::new(1.0, 0.0, -2.0));
    assert_eq!(
        scene.device.read_translation(transforms, slice_offset(&scene, "Transforms", 0, 2)),
        Vec3::ZERO,
        "swap 0 was not written"
    );
}

#[test]
fn test_model_view_projection_uses_the_camera() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(0).unwrap();
    let transforms = buffer_id(&scene, "Transforms");

    // MVP follows WORLD in the block.
    let mvp = scene.device.read_f32s(transforms, slice_offset(&scene, "Transforms", 0, 2) + 64, 16);
    let col = |c: usize| Vec4::new(mvp[c * 4], mvp[c * 4 + 1], mvp[c * 4 + 2], mvp[c * 4 + 3]);
    let mvp = Mat4::from_cols(col(0), col(1), col(2), col(3));
    let clip = mvp * Vec4::new(0.0, 0.0, 0.0, 1.0);
    // The camera sits at the origin looking down -Z; the mesh is 2 units away.
    assert_relative_eq!(clip.w, 2.0, epsilon = 1e-5);
}

#[test]
fn test_light_position_is_written_for_the_model() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(0).unwrap();
    let lighting = buffer_id(&scene, "Lighting");
    assert_eq!(scene.device.read_f32s(lighting, 0, 3), [0.0, 5.0, 0.0]);
}

#[test]
fn test_committed_animation_is_picked_up() {
    let mut scene = built_scene();
    let model = scene.manager.model_mut(scene.model).unwrap();
    model.set_local_transform(PLAIN_NODE, Mat4::from_translation(Vec3::new(3.0, 0.0, -2.0)));
    model.commit();

    scene.manager.update_automatic_semantics(0).unwrap();
    let transforms = buffer_id(&scene, "Transforms");
    assert_eq!(
        scene.device.read_translation(transforms, slice_offset(&scene, "Transforms", 0, 2)),
        Vec3::new(3.0, 0.0, -2.0)
    );
}

#[test]
fn test_material_constants_feed_node_uniforms() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(0).unwrap();
    let color = scene.manager.structure()[NodeIndex(2)].uniform("color").unwrap();
    assert_eq!(color.memory.value::<Vec4>(), Some(PAINT));
    assert_eq!(color.push_constant_offset, Some(0));
}

// ─────────────────────────────────────────────────────────────────────────────
// Manual updates
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_effect_entry_update() {
    let mut scene = built_scene();
    let frame = buffer_id(&scene, "Frame");

    let written = scene
        .manager
        .update_buffer_entry_effect_semantic(scene.effect, "time", &TypedMem::from_value(2.5f32), 0)
        .unwrap();
    assert!(written);
    assert_eq!(scene.device.read_f32s(frame, 0, 1), [2.5]);

    let wrong_type = scene
        .manager
        .update_buffer_entry_effect_semantic(scene.effect, "TIME", &TypedMem::from_value(1i32), 0)
        .unwrap();
    assert!(!wrong_type, "an int does not fit a float entry");
    assert_eq!(scene.device.read_f32s(frame, 0, 1), [2.5]);

    let unknown = scene
        .manager
        .update_buffer_entry_effect_semantic(scene.effect, "WORLD", &TypedMem::from_value(Mat4::IDENTITY), 0)
        .unwrap();
    assert!(!unknown, "WORLD is node scope");
}

#[test]
fn test_partial_batch_reports_failure_but_writes_the_rest() {
    let mut scene = built_scene();
    let time = TypedMem::from_value(4.0f32);
    let bogus = TypedMem::from_value(0.0f32);
    let all = scene
        .manager
        .update_buffer_entry_effect_semantics(scene.effect, &[("TIME", &time), ("MISSING", &bogus)], 0)
        .unwrap();
    assert!(!all);
    assert_eq!(scene.device.read_f32s(buffer_id(&scene, "Frame"), 0, 1), [4.0]);
}

#[test]
fn test_model_entry_update() {
    let mut scene = built_scene();
    let pipeline = scene.manager.find_pipeline(scene.effect, 0, 0, 0, "plain").unwrap();
    let fog = TypedMem::from_value(Vec3::new(0.5, 0.5, 0.6));

    assert!(scene
        .manager
        .update_buffer_entry_model_semantic(pipeline, scene.model, "FOGCOLOR", &fog, 0)
        .unwrap());
    let lighting = buffer_id(&scene, "Lighting");
    assert_eq!(scene.device.read_f32s(lighting, 16, 3), [0.5, 0.5, 0.6]);

    assert!(!scene
        .manager
        .update_buffer_entry_model_semantic(pipeline, scene.model, "WORLD", &TypedMem::from_value(Mat4::IDENTITY), 0)
        .unwrap(), "WORLD is not model scope");
}

#[test]
fn test_node_entry_update_targets_the_node_slice() {
    let mut scene = built_scene();
    let world = TypedMem::from_value(Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0)));
    assert!(scene
        .manager
        .update_buffer_entry_node_semantic(NodeIndex(1), "WORLD", &world, 1)
        .unwrap());

    let transforms = buffer_id(&scene, "Transforms");
    let offset = slice_offset(&scene, "Transforms", 1, 1);
    assert_eq!(offset, 1536);
    assert_eq!(scene.device.read_translation(transforms, offset), Vec3::new(7.0, 8.0, 9.0));

    let count = TypedMem::from_value(3i32);
    assert!(scene
        .manager
        .update_buffer_entry_node_semantic(NodeIndex(1), "BONECOUNT", &count, 0)
        .unwrap());
    assert_eq!(scene.device.read_i32(buffer_id(&scene, "Bones"), 512), 3);

    assert!(!scene
        .manager
        .update_buffer_entry_node_semantic(NodeIndex(2), "BONECOUNT", &count, 0)
        .unwrap(), "the plain pipeline has no bone buffer");
    assert!(matches!(
        scene.manager.update_buffer_entry_node_semantic(NodeIndex(99), "WORLD", &world, 0),
        Err(RenderManagerError::InvalidIndex { kind: "node", index: 99 })
    ));
}

#[test]
fn test_uniform_updates_check_the_type() {
    let mut scene = built_scene();
    let blue = TypedMem::from_value(Vec4::new(0.0, 0.0, 1.0, 1.0));

    assert!(scene.manager.update_uniform_node_semantic(NodeIndex(2), "COLOR", &blue).unwrap());
    let color = scene.manager.structure()[NodeIndex(2)].uniform("COLOR").unwrap();
    assert_eq!(color.memory, blue);

    assert!(!scene
        .manager
        .update_uniform_node_semantic(NodeIndex(2), "COLOR", &TypedMem::from_value(1.0f32))
        .unwrap());
    assert!(!scene
        .manager
        .update_uniform_node_semantic(NodeIndex(0), "COLOR", &blue)
        .unwrap(), "the skinned pipeline declares no COLOR");
    assert!(!scene
        .manager
        .update_uniform_effect_semantic(scene.effect, "COLOR", &blue)
        .unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// Update batches
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_non_coherent_memory_is_flushed_per_swap_region() {
    let mut scene = built_scene();
    scene.device.state().flushes.clear();
    scene.manager.update_automatic_semantics(1).unwrap();

    let transforms = buffer_id(&scene, "Transforms");
    let frame = buffer_id(&scene, "Frame");
    let flushes = scene.device.state().flushes.clone();
    assert_eq!(flushes.len(), 4, "one flush per effect buffer");
    assert!(flushes.contains(&(transforms, 1280, 1280)), "only the swap 1 copy: {flushes:?}");
    assert!(flushes.contains(&(frame, 0, 256)));
}

#[test]
fn test_coherent_memory_is_not_flushed() {
    let mut scene = built_scene_on(MockGraphicsDevice::with_coherency(true));
    scene.manager.update_automatic_semantics(0).unwrap();
    assert!(scene.device.state().flushes.is_empty());
}

#[test]
fn test_explicit_batch_flushes_once() {
    let mut scene = built_scene();
    scene.device.state().flushes.clear();

    scene.manager.begin_buffer_updates(0).unwrap();
    scene.manager.update_automatic_semantics(0).unwrap();
    scene
        .manager
        .update_buffer_entry_effect_semantic(scene.effect, "TIME", &TypedMem::from_value(1.0f32), 0)
        .unwrap();
    assert!(scene.device.state().flushes.is_empty(), "writes inside a batch are not flushed");
    scene.manager.end_buffer_updates(0).unwrap();

    assert_eq!(scene.device.state().flushes.len(), 4);
}

#[test]
fn test_failed_update_still_closes_its_batch() {
    let mut scene = built_scene();
    scene.device.drop_mappings();

    scene.device.set_fail_writes(true);
    let result = scene.manager.update_automatic_semantics(0);
    assert!(
        matches!(result, Err(RenderManagerError::BufferUpdate { .. })),
        "a refused write is reported, got {result:?}"
    );
    for name in ["Transforms", "Bones", "Frame", "Lighting"] {
        assert!(
            !scene.device.is_buffer_mapped(buffer_id(&scene, name)),
            "'{name}' was left mapped by the failed update"
        );
    }

    scene.device.set_fail_writes(false);
    scene.device.state().flushes.clear();
    scene.manager.update_automatic_semantics(0).unwrap();
    assert_eq!(
        scene.device.state().flushes.len(),
        4,
        "the next update opens and flushes its own batch"
    );
    let transforms = buffer_id(&scene, "Transforms");
    assert_eq!(scene.device.read_translation(transforms, 0), Vec3::new(0.0, 0.0, -2.0));
}

#[test]
fn test_overlapping_batches_share_mappings() {
    let mut scene = built_scene();
    scene.device.drop_mappings();
    let frame = buffer_id(&scene, "Frame");
    let (maps, unmaps) = {
        let state = scene.device.state();
        (state.maps, state.unmaps)
    };

    scene.manager.begin_buffer_updates(0).unwrap();
    scene.manager.begin_buffer_updates(1).unwrap();
    scene.manager.end_buffer_updates(0).unwrap();
    assert!(scene.device.is_buffer_mapped(frame), "swap 1 still holds the mapping");

    let written = scene
        .manager
        .update_buffer_entry_effect_semantic(scene.effect, "TIME", &TypedMem::from_value(4.0f32), 1)
        .unwrap();
    assert!(written);
    scene.manager.end_buffer_updates(1).unwrap();

    assert!(!scene.device.is_buffer_mapped(frame));
    let state = scene.device.state();
    assert_eq!(state.maps - maps, 4, "each buffer is mapped once for both batches");
    assert_eq!(state.unmaps - unmaps, 4, "and unmapped once when the last batch closes");
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime dynamic clients
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reserved_clients_follow_the_compiled_ones() {
    let mut scene = built_scene();
    let first = scene.manager.acquire_dynamic_client(scene.effect, "Transforms").unwrap();
    let second = scene.manager.acquire_dynamic_client(scene.effect, "Transforms").unwrap();
    assert_eq!((first.client, second.client), (3, 4));
    assert_eq!(scene.manager.dynamic_client_slice(second, 1).unwrap().offset, (5 + 4) * 256);

    assert!(matches!(
        scene.manager.acquire_dynamic_client(scene.effect, "Transforms"),
        Err(RenderManagerError::Allocation(AllocationError::Exhausted { capacity: 2, .. }))
    ));

    scene.manager.release_dynamic_client(first).unwrap();
    assert!(matches!(
        scene.manager.release_dynamic_client(first),
        Err(RenderManagerError::Allocation(AllocationError::NotAcquired { slot: 3, .. }))
    ));
    let again = scene.manager.acquire_dynamic_client(scene.effect, "Transforms").unwrap();
    assert_eq!(again.client, 3);
}

#[test]
fn test_runtime_client_writes_its_own_slice() {
    let mut scene = built_scene();
    let client = scene.manager.acquire_dynamic_client(scene.effect, "Transforms").unwrap();
    let world = TypedMem::from_value(Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)));
    assert!(scene
        .manager
        .update_buffer_entry_client_semantics(client, &[("WORLD", &world)], 0)
        .unwrap());

    let offset = scene.manager.dynamic_client_slice(client, 0).unwrap().offset;
    assert_eq!(offset, 3 * 256);
    assert_eq!(
        scene.device.read_translation(buffer_id(&scene, "Transforms"), offset),
        Vec3::new(4.0, 0.0, 0.0)
    );
}

#[test]
fn test_buffers_without_reservations_refuse_runtime_clients() {
    let mut scene = built_scene();
    assert!(matches!(
        scene.manager.acquire_dynamic_client(scene.effect, "Bones"),
        Err(RenderManagerError::Allocation(AllocationError::Exhausted { capacity: 0, .. }))
    ));
    assert!(matches!(
        scene.manager.acquire_dynamic_client(scene.effect, "Nowhere"),
        Err(RenderManagerError::UnknownBuffer { .. })
    ));
}
