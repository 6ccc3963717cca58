//! # Prism Convert
//!
//! Scene-graph → pipeline conversion collaborators:
//! - Geometry channel repacking with required-attribute defaults
//! - Attribute mask derivation (per-vertex vs. bind-overall)
//! - Index narrowing and bind-overall instance padding
//! - Primitive topology and sampler parameter mapping
//! - Render-state mask derivation
//!
//! Everything here is a mechanical field mapping with sanity
//! clamping; the algorithmic work lives in `prism_shader`, which
//! consumes the masks these routines produce.

pub mod geometry;
pub mod state;

pub use geometry::{
    pad_overall, ArrayData, BindingMode, Indices, MeshGeometry, PrimitiveMode, Topology,
    VertexChannel,
};
pub use state::{
    map_filter, map_wrap, FilterMode, LegacyFilter, LegacyWrap, MipmapMode, RenderState,
    SamplerDesc, TextureAttachment, WrapMode,
};

use thiserror::Error;

/// Errors from the conversion routines
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("geometry has no positions")]
    EmptyGeometry,

    #[error("geometry has no indices")]
    MissingIndices,

    #[error("channel length {found} does not match vertex count {expected}")]
    ChannelLengthMismatch { expected: usize, found: usize },

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("channel is empty and cannot be padded")]
    EmptyChannel,

    #[error("channel is not overall-bound")]
    NotOverallBound,
}
