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

//! Pipeline selection: picks, for a mesh/material pair, the first pipeline of a
//! subpass group whose conditions all hold.

use pfx_core::asset::{Material, Mesh};
use pfx_core::effect::{EffectDescription, PipelineCondition, PipelineDescription};

/// Returns `true` if `mesh` and `material` satisfy the condition.
pub fn condition_holds(condition: &PipelineCondition, mesh: &Mesh, material: &Material) -> bool {
    match condition {
        PipelineCondition::AttributeRequired(name) => mesh.has_attribute(name),
        PipelineCondition::AttributeRequiredNo(name) => !mesh.has_attribute(name),
        PipelineCondition::UniformRequired(name) => material.has_semantic(name),
        PipelineCondition::UniformRequiredNo(name) => !material.has_semantic(name),
    }
}

/// Returns `true` if every condition of the pipeline holds.
pub fn is_compatible(pipeline: &PipelineDescription, mesh: &Mesh, material: &Material) -> bool {
    pipeline
        .conditions
        .iter()
        .all(|c| condition_holds(c, mesh, material))
}

/// Selects the pipeline a mesh/material pair is drawn with.
///
/// # Arguments
///
/// * `effect` - The effect defining the pipelines.
/// * `candidates` - Pipeline names of the subpass group, in precedence order.
/// * `mesh` - The mesh to draw.
/// * `material` - The material of the mesh node.
///
/// # Returns
///
/// The description index and description of the first compatible pipeline, or
/// `None` when no pipeline fits (the pair is then not drawn by this group).
pub fn select_pipeline<'e>(
    effect: &'e EffectDescription,
    candidates: &[String],
    mesh: &Mesh,
    material: &Material,
) -> Option<(usize, &'e PipelineDescription)> {
    for name in candidates {
        let Some(index) = effect.pipeline_index(name) else {
            log::warn!(
                "Effect '{}' group references undefined pipeline '{}'",
                effect.name,
                name
            );
            continue;
        };
        let pipeline = &effect.pipelines[index];
        if is_compatible(pipeline, mesh, material) {
            return Some((index, pipeline));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_core::renderer::api::{
        DataType, PipelineLayoutId, PipelineStateId, PrimitiveTopology, TypedMem,
    };

    fn pipeline(name: &str, conditions: Vec<PipelineCondition>) -> PipelineDescription {
        conditions.into_iter().fold(
            PipelineDescription::new(name, PipelineStateId(0), PipelineLayoutId(0)),
            PipelineDescription::with_condition,
        )
    }

    fn effect() -> EffectDescription {
        let mut effect = EffectDescription::new("fx");
        effect.pipelines = vec![
            pipeline(
                "skinned",
                vec![PipelineCondition::AttributeRequired("BONEINDEX".into())],
            ),
            pipeline(
                "textured",
                vec![
                    PipelineCondition::UniformRequired("DIFFUSETEXTURE".into()),
                    PipelineCondition::AttributeRequiredNo("BONEINDEX".into()),
                ],
            ),
            pipeline("fallback", vec![]),
        ];
        effect
    }

    fn names() -> Vec<String> {
        vec!["skinned".into(), "textured".into(), "fallback".into()]
    }

    fn mesh(attributes: &[&str]) -> Mesh {
        let mut mesh = Mesh::new(1, PrimitiveTopology::TriangleList);
        let data = mesh.add_vertex_data(vec![0; 64], 64);
        for (i, a) in attributes.iter().enumerate() {
            mesh.add_attribute(*a, DataType::Float32, 4, i as u32 * 16, data);
        }
        mesh
    }

    #[test]
    fn test_first_compatible_pipeline_wins() {
        let fx = effect();
        let mut material = Material::new("m");
        material.set_semantic("DIFFUSETEXTURE", TypedMem::from_value(0u32));

        let skinned = mesh(&["POSITION", "BONEINDEX"]);
        let (_, p) = select_pipeline(&fx, &names(), &skinned, &material).unwrap();
        assert_eq!(p.name, "skinned");

        let rigid = mesh(&["POSITION"]);
        let (index, p) = select_pipeline(&fx, &names(), &rigid, &material).unwrap();
        assert_eq!((index, p.name.as_str()), (1, "textured"));
    }

    #[test]
    fn test_falls_through_to_unconditional_pipeline() {
        let fx = effect();
        let (_, p) = select_pipeline(&fx, &names(), &mesh(&["POSITION"]), &Material::new("m")).unwrap();
        assert_eq!(p.name, "fallback");
    }

    #[test]
    fn test_no_match_returns_none() {
        let fx = effect();
        let only_skinned = vec!["skinned".to_string(), "missing".to_string()];
        assert!(select_pipeline(&fx, &only_skinned, &mesh(&["POSITION"]), &Material::new("m")).is_none());
    }

    #[test]
    fn test_uniform_required_no_rejects_material_with_semantic() {
        let cond = PipelineCondition::UniformRequiredNo("SPECULAR".into());
        let mut material = Material::new("m");
        assert!(condition_holds(&cond, &mesh(&[]), &material));
        material.set_semantic("specular", TypedMem::from_value(1.0f32));
        assert!(!condition_holds(&cond, &mesh(&[]), &material));
    }
}
