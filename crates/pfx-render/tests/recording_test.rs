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

//! Integration tests for command recording.

mod common;

use common::*;
use pfx_core::math::LinearRgba;
use pfx_core::renderer::api::{DescriptorSetId, FramebufferId, IndexFormat, RenderPipelineId, TypedMem};
use pfx_render::structure::MeshIndex;
use pfx_render::{NodeCommands, NodeIndex, RenderManager};
use std::sync::Arc;

fn set(set_index: u32, set: usize, offsets: &[u32]) -> Command {
    Command::BindDescriptorSet {
        set_index,
        set: DescriptorSetId(set),
        offsets: offsets.to_vec(),
    }
}

fn mesh_binds(scene: &Scene, mesh: usize) -> Vec<Command> {
    let mesh = &scene.manager.structure()[MeshIndex(mesh)];
    let mut commands: Vec<_> = mesh
        .vbos()
        .iter()
        .enumerate()
        .filter_map(|(binding, vbo)| {
            vbo.map(|buffer| Command::BindVertexBuffer {
                binding: binding as u32,
                buffer,
            })
        })
        .collect();
    if let Some((buffer, format)) = mesh.ibo() {
        commands.push(Command::BindIndexBuffer { buffer, format });
    }
    commands
}

// ─────────────────────────────────────────────────────────────────────────────
// Full passes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_full_pass_sequence() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(0).unwrap();
    let mut recorder = MockRecorder::default();
    scene
        .manager
        .record_all_rendering_commands(&mut recorder, 0, true, true)
        .unwrap();

    // Sets 0..3 belong to (skinned, skin): set 0 per swap, then set 1.
    // Sets 3..6 belong to (plain, paint).
    let mut expected = vec![
        Command::BeginRenderPass {
            framebuffer: FramebufferId(10),
            clear_color: CLEAR_COLOR,
        },
        Command::BindPipeline(RenderPipelineId(0)),
        set(0, 0, &[0, 0]),
        set(1, 2, &[]),
    ];
    expected.extend(mesh_binds(&scene, 0));
    expected.push(Command::DrawIndexed(0..3));
    expected.push(set(0, 0, &[256, 512]));
    expected.extend(mesh_binds(&scene, 0));
    expected.push(Command::DrawIndexed(0..3));
    expected.extend([
        Command::BindPipeline(RenderPipelineId(1)),
        set(0, 3, &[512]),
        set(1, 5, &[]),
        Command::PushConstants {
            offset: 0,
            data: TypedMem::from_value(PAINT).bytes().to_vec(),
        },
    ]);
    expected.extend(mesh_binds(&scene, 1));
    expected.push(Command::Draw(0..3));
    expected.extend([Command::NextSubpass, Command::EndRenderPass]);

    assert_eq!(recorder.commands, expected);
}

#[test]
fn test_second_swap_uses_its_own_sets_and_offsets() {
    let scene = built_scene();
    let mut recorder = MockRecorder::default();
    scene
        .manager
        .record_all_rendering_commands(&mut recorder, 1, true, false)
        .unwrap();

    assert_eq!(
        recorder.commands[0],
        Command::BeginRenderPass {
            framebuffer: FramebufferId(11),
            clear_color: CLEAR_COLOR,
        }
    );
    let set0: Vec<_> = recorder
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindDescriptorSet { set_index: 0, set, offsets } => Some((set.0, offsets.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        set0,
        [(1, vec![1280, 0]), (1, vec![1536, 512]), (4, vec![1792])]
    );
    assert_eq!(recorder.count(|c| matches!(c, Command::PushConstants { .. })), 0);
}

#[test]
fn test_render_pass_can_be_left_to_the_caller() {
    let scene = built_scene();
    let mut recorder = MockRecorder::default();
    scene
        .manager
        .record_pass_commands(&mut recorder, scene.effect, 0, 0, false, true)
        .unwrap();

    assert_eq!(recorder.count(|c| matches!(c, Command::BeginRenderPass { .. })), 0);
    assert_eq!(recorder.count(|c| matches!(c, Command::EndRenderPass)), 0);
    assert_eq!(recorder.count(|c| matches!(c, Command::NextSubpass)), 1);
    assert_eq!(recorder.count(|c| matches!(c, Command::DrawIndexed(_) | Command::Draw(_))), 3);
}

#[test]
fn test_missing_framebuffer_records_without_begin() {
    init_logging();
    let mut effect = scene_effect();
    effect.passes[0].framebuffers.clear();
    let mut manager = RenderManager::new(Arc::new(MockGraphicsDevice::new()), settings());
    let effect = manager.add_effect(effect).unwrap();
    let model = manager.add_model(scene_model()).unwrap();
    manager.add_model_for_subpass_group(model, effect, 0, 0, 0).unwrap();
    manager.build_render_objects().unwrap();

    let mut recorder = MockRecorder::default();
    manager
        .record_all_rendering_commands(&mut recorder, 0, true, false)
        .unwrap();
    assert_eq!(recorder.count(|c| matches!(c, Command::BeginRenderPass { .. })), 0);
    assert_eq!(recorder.count(|c| matches!(c, Command::EndRenderPass)), 0);
    assert_eq!(recorder.count(|c| matches!(c, Command::Draw(_) | Command::DrawIndexed(_))), 3);
}

#[test]
fn test_pass_without_models_clears_to_black() {
    init_logging();
    let mut manager = RenderManager::new(Arc::new(MockGraphicsDevice::new()), settings());
    manager.add_effect(scene_effect()).unwrap();
    manager.build_render_objects().unwrap();

    let mut recorder = MockRecorder::default();
    manager
        .record_all_rendering_commands(&mut recorder, 0, true, true)
        .unwrap();
    assert_eq!(
        recorder.commands,
        [
            Command::BeginRenderPass {
                framebuffer: FramebufferId(10),
                clear_color: LinearRgba::BLACK,
            },
            Command::NextSubpass,
            Command::EndRenderPass,
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups and nodes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_group_recording_has_no_pass_commands() {
    let scene = built_scene();
    let mut recorder = MockRecorder::default();
    scene
        .manager
        .record_subpass_group_commands(&mut recorder, scene.effect, 0, 0, 0, 0, false)
        .unwrap();

    assert!(!recorder.commands.iter().any(|c| matches!(
        c,
        Command::BeginRenderPass { .. } | Command::NextSubpass | Command::EndRenderPass
    )));
    assert_eq!(recorder.count(|c| matches!(c, Command::BindPipeline(_))), 2);
    assert_eq!(
        recorder.count(|c| matches!(c, Command::BindIndexBuffer { format: IndexFormat::Uint16, .. })),
        2
    );

    let mut overlay = MockRecorder::default();
    scene
        .manager
        .record_subpass_group_commands(&mut overlay, scene.effect, 0, 1, 0, 0, true)
        .unwrap();
    assert!(overlay.commands.is_empty(), "the model was not added to the overlay");
}

#[test]
fn test_single_node_with_selected_commands() {
    let mut scene = built_scene();
    scene.manager.update_automatic_semantics(1).unwrap();
    let mut recorder = MockRecorder::default();
    let commands = NodeCommands {
        bind_pipeline: false,
        ..NodeCommands::default()
    };
    scene
        .manager
        .record_node_commands(&mut recorder, NodeIndex(2), 1, commands)
        .unwrap();

    let mut expected = vec![
        set(0, 4, &[1792]),
        set(1, 5, &[]),
        Command::PushConstants {
            offset: 0,
            data: TypedMem::from_value(PAINT).bytes().to_vec(),
        },
    ];
    expected.extend(mesh_binds(&scene, 1));
    expected.push(Command::Draw(0..3));
    assert_eq!(recorder.commands, expected);

    let mut draw_only = MockRecorder::default();
    let commands = NodeCommands {
        bind_pipeline: false,
        bind_descriptor_sets: false,
        push_uniforms: false,
        bind_vertex_buffers: false,
        draw: true,
    };
    scene
        .manager
        .record_node_commands(&mut draw_only, NodeIndex(0), 0, commands)
        .unwrap();
    assert_eq!(draw_only.commands, [Command::DrawIndexed(0..3)]);
}

#[test]
fn test_unknown_node_is_rejected() {
    let scene = built_scene();
    let mut recorder = MockRecorder::default();
    assert!(scene
        .manager
        .record_node_commands(&mut recorder, NodeIndex(42), 0, NodeCommands::default())
        .is_err());
    assert!(recorder.commands.is_empty());
}
