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

//! Converts mesh vertex data into a merged binding layout.

use super::BindingLayout;
use pfx_core::asset::Mesh;
use pfx_core::renderer::api::DataType;

/// A component value in its widest lossless form.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    Float(f32),
    Int(i64),
}

fn read_scalar(bytes: &[u8], data_type: DataType) -> Option<Scalar> {
    let bytes = bytes.get(..data_type.size() as usize)?;
    let int = |v: i64| Some(Scalar::Int(v));
    match data_type {
        DataType::Float32 => Some(Scalar::Float(bytemuck::pod_read_unaligned::<f32>(bytes))),
        DataType::Int32 => int(bytemuck::pod_read_unaligned::<i32>(bytes).into()),
        DataType::UInt32 => int(bytemuck::pod_read_unaligned::<u32>(bytes).into()),
        DataType::Int16 => int(bytemuck::pod_read_unaligned::<i16>(bytes).into()),
        DataType::UInt16 => int(bytemuck::pod_read_unaligned::<u16>(bytes).into()),
        DataType::Int8 => int(bytemuck::pod_read_unaligned::<i8>(bytes).into()),
        DataType::UInt8 => int(bytes[0].into()),
    }
}

// Numeric `as` casts: float to int truncates toward zero (saturating), int to
// int keeps the low bits.
fn write_scalar(out: &mut [u8], data_type: DataType, value: Scalar) {
    macro_rules! put {
        ($t:ty) => {{
            let v: $t = match value {
                Scalar::Float(f) => f as $t,
                Scalar::Int(i) => i as $t,
            };
            out.copy_from_slice(bytemuck::bytes_of(&v));
        }};
    }
    match data_type {
        DataType::Float32 => put!(f32),
        DataType::Int32 => put!(i32),
        DataType::UInt32 => put!(u32),
        DataType::Int16 => put!(i16),
        DataType::UInt16 => put!(u16),
        DataType::Int8 => put!(i8),
        DataType::UInt8 => put!(u8),
    }
}

/// Produces the interleaved bytes of `binding` for every vertex of `mesh`.
///
/// Per attribute, `min(source width, target width)` components are converted;
/// the remaining target components are zero, except the fourth which is one.
/// An attribute the mesh does not store stays zeroed.
pub fn reswizzle(mesh: &Mesh, binding: &BindingLayout) -> Vec<u8> {
    let vertices = mesh.num_vertices() as usize;
    let stride = binding.stride as usize;
    let mut out = vec![0u8; vertices * stride];

    for target in &binding.attributes {
        let to_type = target.resolved_data_type();
        let to_size = to_type.size() as usize;
        let Some(source) = mesh.attribute(&target.semantic) else {
            continue;
        };
        let Some(block) = mesh.vertex_data().get(source.data_index) else {
            log::warn!(
                "Attribute '{}' references missing vertex data block {}",
                source.semantic,
                source.data_index
            );
            continue;
        };
        let from_size = source.data_type.size() as usize;
        let copy = source.width.min(target.width) as usize;

        for v in 0..vertices {
            let src_base = v * block.stride as usize + source.offset as usize;
            let dst_base = v * stride + target.offset as usize;
            for c in 0..target.width as usize {
                let value = if c < copy {
                    let start = src_base + c * from_size;
                    match block.bytes.get(start..).and_then(|s| read_scalar(s, source.data_type)) {
                        Some(value) => value,
                        None => continue,
                    }
                } else if c == 3 {
                    Scalar::Int(1)
                } else {
                    continue;
                };
                let dst = dst_base + c * to_size;
                write_scalar(&mut out[dst..dst + to_size], to_type, value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::LayoutAttribute;
    use pfx_core::renderer::api::{GpuDatatype, PrimitiveTopology};

    fn binding(attrs: &[(&str, DataType, u32)]) -> BindingLayout {
        let mut offset = 0;
        let attributes = attrs
            .iter()
            .enumerate()
            .map(|(i, (sem, ty, width))| {
                let a = LayoutAttribute {
                    semantic: sem.to_string(),
                    location: i as u32,
                    shader_type: GpuDatatype::Vec4,
                    data_type: Some(*ty),
                    width: *width,
                    offset,
                };
                offset += ty.size() * width;
                a
            })
            .collect();
        BindingLayout {
            attributes,
            stride: offset,
        }
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }

    fn float_mesh(values: &[f32], width: u32) -> Mesh {
        let bytes: Vec<u8> = bytemuck::cast_slice(values).to_vec();
        let mut mesh = Mesh::new(values.len() as u32 / width, PrimitiveTopology::TriangleList);
        let d = mesh.add_vertex_data(bytes, width * 4);
        mesh.add_attribute("POSITION", DataType::Float32, width, 0, d);
        mesh
    }

    #[test]
    fn test_identical_format_round_trips_exactly() {
        let values = [1.5f32, -2.25, 3.0, 4.0, 5.0, 6.0];
        let mesh = float_mesh(&values, 3);
        let out = reswizzle(&mesh, &binding(&[("POSITION", DataType::Float32, 3)]));
        assert_eq!(floats(&out), values.to_vec());
    }

    #[test]
    fn test_widening_fills_w_with_one() {
        let mesh = float_mesh(&[1.0, 2.0, 3.0], 3);
        let out = reswizzle(&mesh, &binding(&[("POSITION", DataType::Float32, 4)]));
        assert_eq!(floats(&out), vec![1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_float_to_int16_truncates_without_reordering() {
        let mesh = float_mesh(&[1.9, -2.7, 300.2], 3);
        let out = reswizzle(&mesh, &binding(&[("POSITION", DataType::Int16, 3)]));
        let ints: Vec<i16> = out
            .chunks_exact(2)
            .map(bytemuck::pod_read_unaligned::<i16>)
            .collect();
        assert_eq!(ints, vec![1, -2, 300]);

        let back: Vec<f32> = ints.iter().map(|&i| i as f32).collect();
        assert_eq!(back, vec![1.0, -2.0, 300.0]);
    }

    #[test]
    fn test_missing_attribute_stays_zeroed() {
        let mesh = float_mesh(&[1.0, 2.0, 3.0], 3);
        let layout = binding(&[("POSITION", DataType::Float32, 3), ("NORMAL", DataType::Float32, 4)]);
        let out = reswizzle(&mesh, &layout);
        assert_eq!(floats(&out), vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_narrowing_drops_extra_components() {
        let mesh = float_mesh(&[1.0, 2.0, 3.0, 4.0], 4);
        let out = reswizzle(&mesh, &binding(&[("POSITION", DataType::Float32, 2)]));
        assert_eq!(floats(&out), vec![1.0, 2.0]);
    }

    #[test]
    fn test_unsigned_bytes_widen_to_floats() {
        let mut mesh = Mesh::new(2, PrimitiveTopology::TriangleList);
        let d = mesh.add_vertex_data(vec![255, 0, 7, 9, 1, 2], 3);
        mesh.add_attribute("COLOR", DataType::UInt8, 3, 0, d);
        let out = reswizzle(&mesh, &binding(&[("COLOR", DataType::Float32, 4)]));
        assert_eq!(floats(&out), vec![255.0, 0.0, 7.0, 1.0, 9.0, 1.0, 2.0, 1.0]);
    }
}
