//! Geometry conversion
//!
//! Repacks scene-graph geometry into the channel layout the pipeline
//! consumes and derives the attribute mask the shader synthesizer
//! keys on. Channels are either per-vertex or bind-overall; an
//! overall channel is modeled as an instance-rate attribute needing
//! one value per instance.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use prism_shader::AttributeMask;

use crate::ConvertError;

/// A converted attribute array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Vec2(Vec<Vec2>),
    Vec3(Vec<Vec3>),
    Vec4(Vec<Vec4>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Vec2(v) => v.len(),
            ArrayData::Vec3(v) => v.len(),
            ArrayData::Vec4(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one element in bytes.
    pub fn element_stride(&self) -> u32 {
        match self {
            ArrayData::Vec2(_) => 8,
            ArrayData::Vec3(_) => 12,
            ArrayData::Vec4(_) => 16,
        }
    }

    /// Raw bytes for buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ArrayData::Vec2(v) => bytemuck::cast_slice(v),
            ArrayData::Vec3(v) => bytemuck::cast_slice(v),
            ArrayData::Vec4(v) => bytemuck::cast_slice(v),
        }
    }

    fn pad_with_last(&mut self, count: usize) {
        fn pad<T: Copy>(values: &mut Vec<T>, count: usize) {
            if let Some(&last) = values.last() {
                while values.len() < count {
                    values.push(last);
                }
            }
        }
        match self {
            ArrayData::Vec2(v) => pad(v, count),
            ArrayData::Vec3(v) => pad(v, count),
            ArrayData::Vec4(v) => pad(v, count),
        }
    }
}

/// How a channel is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingMode {
    /// One value per vertex.
    PerVertex,
    /// One value per draw, modeled as an instance-rate attribute.
    Overall,
}

/// One attribute channel of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexChannel {
    pub data: ArrayData,
    pub binding: BindingMode,
}

impl VertexChannel {
    pub fn per_vertex(data: ArrayData) -> Self {
        Self {
            data,
            binding: BindingMode::PerVertex,
        }
    }

    pub fn overall(data: ArrayData) -> Self {
        Self {
            data,
            binding: BindingMode::Overall,
        }
    }
}

/// Pad an overall-bound channel to one value per instance.
///
/// Padding replicates the channel's last element; it never invents a
/// default value. Channels already long enough are left alone.
pub fn pad_overall(channel: &mut VertexChannel, instance_count: usize) -> Result<(), ConvertError> {
    if channel.binding != BindingMode::Overall {
        return Err(ConvertError::NotOverallBound);
    }
    if channel.data.is_empty() {
        return Err(ConvertError::EmptyChannel);
    }
    channel.data.pad_with_last(instance_count);
    Ok(())
}

/// Index list in its narrowest usable width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    /// Convert an index list, narrowing to 16 bits when every index
    /// fits.
    pub fn from_u32(raw: &[u32]) -> Self {
        let narrow = raw.iter().all(|&index| index <= u16::MAX as u32);
        if narrow {
            Indices::U16(raw.iter().map(|&index| index as u16).collect())
        } else {
            Indices::U32(raw.to_vec())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_index(&self) -> Option<u32> {
        match self {
            Indices::U16(v) => v.iter().max().map(|&index| index as u32),
            Indices::U32(v) => v.iter().max().copied(),
        }
    }

    /// Raw bytes for buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Indices::U16(v) => bytemuck::cast_slice(v),
            Indices::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Scene-graph primitive modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
}

/// Pipeline input topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    /// Map to the pipeline topology. Modes the target cannot express
    /// directly fall back to the closest supported topology.
    pub fn topology(self) -> Topology {
        match self {
            PrimitiveMode::Points => Topology::PointList,
            PrimitiveMode::Lines => Topology::LineList,
            PrimitiveMode::LineStrip => Topology::LineStrip,
            PrimitiveMode::LineLoop => {
                log::warn!("line loops are not supported; drawing as a line strip");
                Topology::LineStrip
            }
            PrimitiveMode::Triangles => Topology::TriangleList,
            PrimitiveMode::TriangleStrip => Topology::TriangleStrip,
            PrimitiveMode::TriangleFan => Topology::TriangleFan,
            PrimitiveMode::Quads => {
                log::warn!("quads are not supported; drawing as a triangle list");
                Topology::TriangleList
            }
        }
    }
}

/// Converted geometry: positions plus optional attribute channels
/// and an index list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Option<VertexChannel>,
    pub colors: Option<VertexChannel>,
    pub texcoords: [Option<VertexChannel>; 3],
    pub tangents: Option<VertexChannel>,
    /// Per-instance translation channel.
    pub translations: Option<VertexChannel>,
    pub indices: Indices,
    pub mode: PrimitiveMode,
}

impl MeshGeometry {
    pub fn new(positions: Vec<Vec3>, indices: Indices, mode: PrimitiveMode) -> Self {
        Self {
            positions,
            normals: None,
            colors: None,
            texcoords: [None, None, None],
            tangents: None,
            translations: None,
            indices,
            mode,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Derive the attribute mask the shader synthesizer keys on.
    ///
    /// A channel sets its parent bit; an overall-bound channel
    /// additionally sets its `_OVERALL` sub-flag.
    pub fn attribute_mask(&self) -> AttributeMask {
        fn apply(
            mask: &mut AttributeMask,
            channel: &Option<VertexChannel>,
            parent: AttributeMask,
            overall: AttributeMask,
        ) {
            if let Some(channel) = channel {
                *mask |= parent;
                if channel.binding == BindingMode::Overall {
                    *mask |= overall;
                }
            }
        }

        let mut mask = AttributeMask::VERTEX;
        apply(
            &mut mask,
            &self.normals,
            AttributeMask::NORMAL,
            AttributeMask::NORMAL_OVERALL,
        );
        apply(
            &mut mask,
            &self.colors,
            AttributeMask::COLOR,
            AttributeMask::COLOR_OVERALL,
        );
        apply(
            &mut mask,
            &self.tangents,
            AttributeMask::TANGENT,
            AttributeMask::TANGENT_OVERALL,
        );
        apply(
            &mut mask,
            &self.translations,
            AttributeMask::TRANSLATE,
            AttributeMask::TRANSLATE_OVERALL,
        );

        const TEXCOORD_BITS: [AttributeMask; 3] = [
            AttributeMask::TEXCOORD0,
            AttributeMask::TEXCOORD1,
            AttributeMask::TEXCOORD2,
        ];
        for (channel, bit) in self.texcoords.iter().zip(TEXCOORD_BITS) {
            if channel.is_some() {
                mask |= bit;
            }
        }

        mask
    }

    /// Check structural soundness: positions and indices exist,
    /// indices are in range, and per-vertex channels match the
    /// vertex count.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.positions.is_empty() {
            return Err(ConvertError::EmptyGeometry);
        }
        if self.indices.is_empty() {
            return Err(ConvertError::MissingIndices);
        }

        let vertex_count = self.positions.len();
        if let Some(max) = self.indices.max_index() {
            if max as usize >= vertex_count {
                return Err(ConvertError::IndexOutOfRange {
                    index: max,
                    vertex_count,
                });
            }
        }

        for channel in self.channels() {
            if channel.binding == BindingMode::PerVertex && channel.data.len() != vertex_count {
                return Err(ConvertError::ChannelLengthMismatch {
                    expected: vertex_count,
                    found: channel.data.len(),
                });
            }
        }

        Ok(())
    }

    /// Fill in defaults for channels a pipeline requires but the
    /// source geometry lacks: +Y normals, opaque white colors,
    /// origin texture coordinates.
    pub fn ensure_required(&mut self, required: AttributeMask) {
        let count = self.positions.len();

        if required.contains(AttributeMask::NORMAL) && self.normals.is_none() {
            self.normals = Some(VertexChannel::per_vertex(ArrayData::Vec3(vec![
                Vec3::Y;
                count
            ])));
        }
        if required.contains(AttributeMask::COLOR) && self.colors.is_none() {
            self.colors = Some(VertexChannel::per_vertex(ArrayData::Vec4(vec![
                Vec4::ONE;
                count
            ])));
        }
        if required.contains(AttributeMask::TEXCOORD0) && self.texcoords[0].is_none() {
            self.texcoords[0] = Some(VertexChannel::per_vertex(ArrayData::Vec2(vec![
                Vec2::ZERO;
                count
            ])));
        }
    }

    /// Pad every overall-bound channel to the instance count.
    pub fn pad_overall_channels(&mut self, instance_count: usize) -> Result<(), ConvertError> {
        for channel in self.channels_mut() {
            if channel.binding == BindingMode::Overall {
                pad_overall(channel, instance_count)?;
            }
        }
        Ok(())
    }

    fn channels(&self) -> impl Iterator<Item = &VertexChannel> {
        self.normals
            .iter()
            .chain(self.colors.iter())
            .chain(self.texcoords.iter().flatten())
            .chain(self.tangents.iter())
            .chain(self.translations.iter())
    }

    fn channels_mut(&mut self) -> impl Iterator<Item = &mut VertexChannel> {
        self.normals
            .iter_mut()
            .chain(self.colors.iter_mut())
            .chain(self.texcoords.iter_mut().flatten())
            .chain(self.tangents.iter_mut())
            .chain(self.translations.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshGeometry {
        let positions = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        let indices = Indices::from_u32(&[0, 1, 2, 2, 3, 0]);
        MeshGeometry::new(positions, indices, PrimitiveMode::Triangles)
    }

    #[test]
    fn test_attribute_mask_derivation() {
        let mut mesh = quad();
        assert_eq!(mesh.attribute_mask(), AttributeMask::VERTEX);

        mesh.normals = Some(VertexChannel::per_vertex(ArrayData::Vec3(vec![
            Vec3::Z;
            4
        ])));
        mesh.texcoords[0] = Some(VertexChannel::per_vertex(ArrayData::Vec2(vec![
            Vec2::ZERO;
            4
        ])));
        let mask = mesh.attribute_mask();
        assert!(mask.contains(AttributeMask::NORMAL));
        assert!(!mask.contains(AttributeMask::NORMAL_OVERALL));
        assert!(mask.contains(AttributeMask::TEXCOORD0));
        assert!(mask.is_well_formed());
    }

    #[test]
    fn test_overall_binding_sets_sub_flag() {
        let mut mesh = quad();
        mesh.colors = Some(VertexChannel::overall(ArrayData::Vec4(vec![Vec4::ONE])));
        mesh.translations = Some(VertexChannel::overall(ArrayData::Vec3(vec![Vec3::ZERO])));

        let mask = mesh.attribute_mask();
        assert!(mask.contains(AttributeMask::COLOR | AttributeMask::COLOR_OVERALL));
        assert!(mask.contains(AttributeMask::TRANSLATE | AttributeMask::TRANSLATE_OVERALL));
        assert!(mask.is_well_formed());
    }

    #[test]
    fn test_index_narrowing() {
        assert_eq!(
            Indices::from_u32(&[0, 1, 65535]),
            Indices::U16(vec![0, 1, 65535])
        );
        assert_eq!(
            Indices::from_u32(&[0, 1, 65536]),
            Indices::U32(vec![0, 1, 65536])
        );
    }

    #[test]
    fn test_pad_overall_replicates_last_element() {
        let mut channel = VertexChannel::overall(ArrayData::Vec3(vec![
            Vec3::X,
            Vec3::new(3.0, 4.0, 5.0),
        ]));
        pad_overall(&mut channel, 5).unwrap();

        match &channel.data {
            ArrayData::Vec3(values) => {
                assert_eq!(values.len(), 5);
                // The last element is the padding value, not a
                // default.
                assert_eq!(values[2], Vec3::new(3.0, 4.0, 5.0));
                assert_eq!(values[4], Vec3::new(3.0, 4.0, 5.0));
                assert_eq!(values[0], Vec3::X);
            }
            other => panic!("unexpected channel data {other:?}"),
        }
    }

    #[test]
    fn test_pad_overall_rejects_bad_channels() {
        let mut per_vertex = VertexChannel::per_vertex(ArrayData::Vec3(vec![Vec3::X]));
        assert!(matches!(
            pad_overall(&mut per_vertex, 4),
            Err(ConvertError::NotOverallBound)
        ));

        let mut empty = VertexChannel::overall(ArrayData::Vec3(Vec::new()));
        assert!(matches!(
            pad_overall(&mut empty, 4),
            Err(ConvertError::EmptyChannel)
        ));
    }

    #[test]
    fn test_ensure_required_fills_defaults() {
        let mut mesh = quad();
        mesh.ensure_required(
            AttributeMask::VERTEX | AttributeMask::NORMAL | AttributeMask::TEXCOORD0,
        );

        match &mesh.normals.as_ref().unwrap().data {
            ArrayData::Vec3(values) => {
                assert_eq!(values.len(), 4);
                assert!(values.iter().all(|&n| n == Vec3::Y));
            }
            other => panic!("unexpected normal data {other:?}"),
        }
        assert!(mesh.texcoords[0].is_some());
        // Color was not required and stays absent.
        assert!(mesh.colors.is_none());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_meshes() {
        let empty = MeshGeometry::new(
            Vec::new(),
            Indices::from_u32(&[0]),
            PrimitiveMode::Triangles,
        );
        assert!(matches!(empty.validate(), Err(ConvertError::EmptyGeometry)));

        let mut mesh = quad();
        mesh.indices = Indices::from_u32(&[]);
        assert!(matches!(
            mesh.validate(),
            Err(ConvertError::MissingIndices)
        ));

        let mut mesh = quad();
        mesh.indices = Indices::from_u32(&[0, 1, 9]);
        assert!(matches!(
            mesh.validate(),
            Err(ConvertError::IndexOutOfRange { index: 9, .. })
        ));

        let mut mesh = quad();
        mesh.normals = Some(VertexChannel::per_vertex(ArrayData::Vec3(vec![Vec3::Y; 2])));
        assert!(matches!(
            mesh.validate(),
            Err(ConvertError::ChannelLengthMismatch {
                expected: 4,
                found: 2
            })
        ));
    }

    #[test]
    fn test_topology_mapping_clamps_unsupported_modes() {
        assert_eq!(PrimitiveMode::Triangles.topology(), Topology::TriangleList);
        assert_eq!(PrimitiveMode::Points.topology(), Topology::PointList);
        assert_eq!(PrimitiveMode::LineLoop.topology(), Topology::LineStrip);
        assert_eq!(PrimitiveMode::Quads.topology(), Topology::TriangleList);
    }

    #[test]
    fn test_upload_bytes() {
        let mesh = quad();
        let indices = mesh.indices.as_bytes();
        assert_eq!(indices.len(), 6 * 2);

        let channel = ArrayData::Vec3(vec![Vec3::ZERO; 4]);
        assert_eq!(channel.as_bytes().len(), 4 * 12);
        assert_eq!(channel.element_stride(), 12);
    }
}
