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

//! Vertex layout merging.
//!
//! Every mesh is drawn by a set of pipelines, each declaring the vertex inputs
//! it reads. Meshes drawn by the same set of pipelines share one merged
//! [`AttributeLayout`]: the union of the inputs, each attribute widened to the
//! widest component type and count any pipeline (or, optionally, any mesh)
//! needs. Vertex data is then reswizzled into that layout once, so a single
//! vertex buffer serves every pipeline of the set.

mod reswizzle;

pub use self::reswizzle::reswizzle;

use crate::error::{RenderManagerError, Result};
use crate::structure::{MeshIndex, PipelineSet, RenderStructure};
use pfx_core::asset::Mesh;
use pfx_core::effect::PipelineDescription;
use pfx_core::renderer::api::{
    BufferDescriptor, BufferUsage, DataType, GpuDatatype, MemoryLocation,
    VertexAttributeDescriptor, VertexBufferLayoutDescriptor, VertexFormat, VertexStepMode,
};
use pfx_core::renderer::GraphicsDevice;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One attribute of a merged vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutAttribute {
    /// The mesh semantic.
    pub semantic: String,
    /// The shader location declared by the first pipeline contributing the attribute.
    pub location: u32,
    /// The shader type declared by the first pipeline contributing the attribute.
    pub shader_type: GpuDatatype,
    /// The component storage type; `None` until a mesh provides one.
    pub data_type: Option<DataType>,
    /// The number of components.
    pub width: u32,
    /// Offset within a vertex, valid after [`AttributeLayout::calculate_offsets`].
    pub offset: u32,
}

impl LayoutAttribute {
    /// The storage type, falling back to the shader's scalar type.
    pub fn resolved_data_type(&self) -> DataType {
        self.data_type.unwrap_or(self.shader_type.data_type())
    }
}

/// The attributes read from one vertex buffer binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingLayout {
    /// Attributes in offset order.
    pub attributes: Vec<LayoutAttribute>,
    /// Distance between vertices, valid after [`AttributeLayout::calculate_offsets`].
    pub stride: u32,
}

/// A vertex layout, indexed by binding number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLayout {
    bindings: Vec<BindingLayout>,
}

impl AttributeLayout {
    /// The vertex inputs a pipeline declares, grouped by binding, with no offsets.
    ///
    /// With `datatypes_from_model` the storage types are left unset so that the
    /// meshes decide them; otherwise they are the shader's scalar types.
    pub fn vertex_bindings_without_stride(
        pipeline: &PipelineDescription,
        datatypes_from_model: bool,
    ) -> Self {
        let mut layout = Self::default();
        for attr in &pipeline.attributes {
            let binding = layout.binding_mut(attr.vbo_binding);
            binding.attributes.push(LayoutAttribute {
                semantic: attr.semantic.clone(),
                location: attr.location,
                shader_type: attr.datatype,
                data_type: (!datatypes_from_model).then(|| attr.datatype.data_type()),
                width: attr.datatype.components(),
                offset: 0,
            });
        }
        layout
    }

    fn binding_mut(&mut self, binding: u32) -> &mut BindingLayout {
        let binding = binding as usize;
        if self.bindings.len() <= binding {
            self.bindings.resize_with(binding + 1, BindingLayout::default);
        }
        &mut self.bindings[binding]
    }

    /// Merges `other` into this layout, binding by binding.
    ///
    /// Attributes with a matching semantic are widened (type = wider of the two,
    /// width = max); the others are appended. Only the attributes present before
    /// the merge started are searched, so duplicates within `other` are kept.
    pub fn merge(&mut self, other: &AttributeLayout) {
        for (binding_index, theirs) in other.bindings.iter().enumerate() {
            let ours = self.binding_mut(binding_index as u32);
            let existing = ours.attributes.len();
            for attr in &theirs.attributes {
                let found = ours.attributes[..existing]
                    .iter_mut()
                    .find(|a| a.semantic.eq_ignore_ascii_case(&attr.semantic));
                match found {
                    Some(a) => {
                        a.data_type = widen_optional(a.data_type, attr.data_type);
                        a.width = a.width.max(attr.width);
                    }
                    None => ours.attributes.push(attr.clone()),
                }
            }
        }
    }

    /// Widens every attribute's storage type to the type `mesh` stores it as.
    pub fn fix_datatypes_from_mesh(&mut self, mesh: &Mesh) {
        for attr in self.bindings.iter_mut().flat_map(|b| b.attributes.iter_mut()) {
            if let Some(stored) = mesh.attribute(&attr.semantic) {
                attr.data_type = widen_optional(attr.data_type, Some(stored.data_type));
            }
        }
    }

    /// Assigns offsets in declaration order and computes each binding's stride.
    /// Attributes no mesh provided a type for take the shader's scalar type.
    pub fn calculate_offsets(&mut self) {
        for binding in &mut self.bindings {
            let mut stride = 0;
            for attr in &mut binding.attributes {
                let data_type = attr.resolved_data_type();
                attr.data_type = Some(data_type);
                attr.offset = stride;
                stride += attr.width * data_type.size();
            }
            binding.stride = stride;
        }
    }

    /// All bindings, indexed by binding number. Unused bindings are empty.
    pub fn bindings(&self) -> &[BindingLayout] {
        &self.bindings
    }

    /// Finds an attribute by semantic, with its binding number.
    pub fn find(&self, semantic: &str) -> Option<(u32, &LayoutAttribute)> {
        self.bindings.iter().enumerate().find_map(|(b, binding)| {
            binding
                .attributes
                .iter()
                .find(|a| a.semantic.eq_ignore_ascii_case(semantic))
                .map(|a| (b as u32, a))
        })
    }

    /// The vertex input state of `pipeline` when reading this layout.
    ///
    /// Only the bindings and attributes the pipeline declares are described, at
    /// the pipeline's locations and the layout's offsets.
    pub fn vertex_buffer_layouts(
        &self,
        pipeline: &PipelineDescription,
    ) -> Vec<VertexBufferLayoutDescriptor> {
        let mut per_binding: BTreeMap<u32, Vec<VertexAttributeDescriptor>> = BTreeMap::new();
        for input in &pipeline.attributes {
            let Some(attr) = self.bindings.get(input.vbo_binding as usize).and_then(|b| {
                b.attributes
                    .iter()
                    .find(|a| a.semantic.eq_ignore_ascii_case(&input.semantic))
            }) else {
                continue;
            };
            per_binding
                .entry(input.vbo_binding)
                .or_default()
                .push(VertexAttributeDescriptor {
                    location: input.location,
                    format: VertexFormat {
                        data_type: attr.resolved_data_type(),
                        components: attr.width,
                    },
                    offset: attr.offset,
                });
        }
        per_binding
            .into_iter()
            .map(|(binding, attributes)| VertexBufferLayoutDescriptor {
                binding,
                array_stride: self.bindings[binding as usize].stride,
                step_mode: VertexStepMode::Vertex,
                attributes,
            })
            .collect()
    }
}

fn widen_optional(a: Option<DataType>, b: Option<DataType>) -> Option<DataType> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.widen(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Builds one merged layout per distinct [`PipelineSet`] and assigns it to the
/// meshes of the set and to every pipeline of the set.
///
/// A pipeline drawing meshes of several sets keeps the layout of the last set
/// processed; that conflict is logged.
pub(crate) fn create_attribute_configurations(
    structure: &mut RenderStructure,
    datatypes_from_model: bool,
) {
    let mut sets: BTreeMap<PipelineSet, Vec<MeshIndex>> = BTreeMap::new();
    for (i, mesh) in structure.meshes.iter().enumerate() {
        if !mesh.pipelines.is_empty() {
            sets.entry(mesh.pipelines.clone())
                .or_default()
                .push(MeshIndex(i));
        }
    }

    for (set, meshes) in sets {
        let mut layout = AttributeLayout::default();
        for (effect, name) in &set {
            if let Some(pipeline) = structure[*effect].description.pipeline(name) {
                layout.merge(&AttributeLayout::vertex_bindings_without_stride(
                    pipeline,
                    datatypes_from_model,
                ));
            }
        }
        if datatypes_from_model {
            for &mesh in &meshes {
                let render_mesh = &structure[mesh];
                if let Some(asset) = structure[render_mesh.model]
                    .model
                    .mesh(render_mesh.asset_mesh)
                {
                    layout.fix_datatypes_from_mesh(asset);
                }
            }
        }
        layout.calculate_offsets();
        let layout = Arc::new(layout);

        for &mesh in &meshes {
            structure[mesh].layout = Some(Arc::clone(&layout));
        }
        for (effect, name) in &set {
            let effect = &mut structure[*effect];
            let Some(index) = effect.description.pipeline_index(name) else {
                continue;
            };
            if let Some(previous) = effect.pipeline_layouts.insert(index, Arc::clone(&layout)) {
                if *previous != *layout {
                    log::warn!(
                        "Pipeline '{}' draws meshes with differing vertex layouts; the last one is used",
                        name
                    );
                }
            }
        }
    }
}

/// Uploads reswizzled vertex data and index data of every mesh that has a layout.
pub(crate) fn create_vbos(
    structure: &mut RenderStructure,
    device: &dyn GraphicsDevice,
    log_creation: bool,
) -> Result<()> {
    for mesh_index in 0..structure.meshes.len() {
        let mesh_index = MeshIndex(mesh_index);
        let (model, asset_mesh) = {
            let m = &structure[mesh_index];
            (m.model, m.asset_mesh)
        };
        let Some(layout) = structure[mesh_index].layout.clone() else {
            continue;
        };
        let Some(asset) = structure[model].model.mesh(asset_mesh) else {
            continue;
        };

        let mut vbos = Vec::with_capacity(layout.bindings().len());
        for (binding_index, binding) in layout.bindings().iter().enumerate() {
            if binding.stride == 0 || asset.num_vertices() == 0 {
                vbos.push(None);
                continue;
            }
            let data = reswizzle(asset, binding);
            let label = format!("vbo:model{}:mesh{}:binding{}", model.0, asset_mesh, binding_index);
            let id = device
                .create_buffer_with_data(
                    &BufferDescriptor {
                        label: Some(Cow::Borrowed(label.as_str())),
                        size: data.len() as u64,
                        usage: BufferUsage::VERTEX,
                        location: MemoryLocation::DeviceLocal,
                        mapped_at_creation: false,
                    },
                    &data,
                )
                .map_err(|e| RenderManagerError::creation(label.clone(), e))?;
            if log_creation {
                log::debug!("Created vertex buffer '{}' ({} bytes)", label, data.len());
            }
            vbos.push(Some(id));
        }

        let ibo = match asset.faces() {
            Some(faces) if !faces.bytes.is_empty() => {
                let label = format!("ibo:model{}:mesh{}", model.0, asset_mesh);
                let id = device
                    .create_buffer_with_data(
                        &BufferDescriptor {
                            label: Some(Cow::Borrowed(label.as_str())),
                            size: faces.bytes.len() as u64,
                            usage: BufferUsage::INDEX,
                            location: MemoryLocation::DeviceLocal,
                            mapped_at_creation: false,
                        },
                        &faces.bytes,
                    )
                    .map_err(|e| RenderManagerError::creation(label.clone(), e))?;
                if log_creation {
                    log::debug!("Created index buffer '{}' ({} bytes)", label, faces.bytes.len());
                }
                Some((id, faces.format))
            }
            _ => None,
        };

        let render_mesh = &mut structure[mesh_index];
        render_mesh.vbos = vbos;
        render_mesh.ibo = ibo;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_core::renderer::api::{PipelineLayoutId, PipelineStateId, PrimitiveTopology};

    fn pipe(attrs: &[(&str, GpuDatatype, u32)]) -> PipelineDescription {
        attrs.iter().enumerate().fold(
            PipelineDescription::new("p", PipelineStateId(0), PipelineLayoutId(0)),
            |p, (loc, (sem, ty, binding))| p.with_attribute(*sem, *ty, loc as u32, *binding),
        )
    }

    #[test]
    fn test_merge_widens_matching_and_appends_new() {
        let mut layout = AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("POSITION", GpuDatatype::Vec3, 0)]),
            false,
        );
        layout.merge(&AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("POSITION", GpuDatatype::Vec4, 0), ("UV0", GpuDatatype::Vec2, 0)]),
            false,
        ));
        let attrs = &layout.bindings()[0].attributes;
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].width, 4);
        assert_eq!(attrs[1].semantic, "UV0");
    }

    #[test]
    fn test_merge_is_deterministic_and_order_keeps_first_location() {
        let a = AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("NORMAL", GpuDatatype::Vec3, 0)]),
            true,
        );
        let b = AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("POSITION", GpuDatatype::Vec3, 0), ("NORMAL", GpuDatatype::Vec3, 0)]),
            true,
        );
        let mut first = AttributeLayout::default();
        first.merge(&a);
        first.merge(&b);
        let mut second = AttributeLayout::default();
        second.merge(&a);
        second.merge(&b);
        assert_eq!(first, second);
        assert_eq!(first.find("NORMAL").map(|(_, a)| a.location), Some(0));
    }

    #[test]
    fn test_mesh_types_widen_and_offsets_accumulate() {
        let mut layout = AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("POSITION", GpuDatatype::Vec3, 0), ("UV0", GpuDatatype::Vec2, 0)]),
            true,
        );
        let mut mesh = Mesh::new(1, PrimitiveTopology::TriangleList);
        let d = mesh.add_vertex_data(vec![0; 16], 16);
        mesh.add_attribute("POSITION", DataType::Int16, 3, 0, d);
        mesh.add_attribute("UV0", DataType::UInt8, 2, 6, d);
        layout.fix_datatypes_from_mesh(&mesh);

        let mut other = Mesh::new(1, PrimitiveTopology::TriangleList);
        let d = other.add_vertex_data(vec![0; 16], 16);
        other.add_attribute("POSITION", DataType::Float32, 3, 0, d);
        layout.fix_datatypes_from_mesh(&other);

        layout.calculate_offsets();
        let (_, pos) = layout.find("POSITION").unwrap();
        let (_, uv) = layout.find("UV0").unwrap();
        assert_eq!(pos.data_type, Some(DataType::Float32));
        assert_eq!(uv.data_type, Some(DataType::UInt8));
        assert_eq!(uv.offset, 12);
        assert_eq!(layout.bindings()[0].stride, 14);
    }

    #[test]
    fn test_unset_type_falls_back_to_shader_type() {
        let mut layout = AttributeLayout::vertex_bindings_without_stride(
            &pipe(&[("TANGENT", GpuDatatype::Vec4, 0)]),
            true,
        );
        layout.calculate_offsets();
        assert_eq!(layout.bindings()[0].stride, 16);
    }

    #[test]
    fn test_vertex_buffer_layouts_use_pipeline_locations() {
        let p = pipe(&[("POSITION", GpuDatatype::Vec3, 0), ("WEIGHTS", GpuDatatype::Vec4, 1)]);
        let mut layout = AttributeLayout::vertex_bindings_without_stride(&p, false);
        layout.calculate_offsets();
        let vbl = layout.vertex_buffer_layouts(&p);
        assert_eq!(vbl.len(), 2);
        assert_eq!(vbl[1].binding, 1);
        assert_eq!(vbl[1].attributes[0].location, 1);
        assert_eq!(vbl[0].array_stride, 12);
    }
}
