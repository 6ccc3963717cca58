//! Render state and sampler mapping
//!
//! Derives the state mask the shader synthesizer keys on, and maps
//! legacy texture filtering/wrapping parameters onto the pipeline's
//! sampler description with sanity clamping. Pure lookup tables; the
//! only "logic" is the clamping.

use serde::{Deserialize, Serialize};

use prism_shader::StateMask;

/// Upper bound accepted for anisotropic filtering.
pub const MAX_ANISOTROPY: f32 = 16.0;

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Mip level selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

/// Legacy combined min/mip filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

/// Split a legacy combined filter into filter and mipmap modes.
pub fn map_filter(filter: LegacyFilter) -> (FilterMode, MipmapMode) {
    match filter {
        LegacyFilter::Nearest => (FilterMode::Nearest, MipmapMode::Nearest),
        LegacyFilter::Linear => (FilterMode::Linear, MipmapMode::Nearest),
        LegacyFilter::NearestMipmapNearest => (FilterMode::Nearest, MipmapMode::Nearest),
        LegacyFilter::LinearMipmapNearest => (FilterMode::Linear, MipmapMode::Nearest),
        LegacyFilter::NearestMipmapLinear => (FilterMode::Nearest, MipmapMode::Linear),
        LegacyFilter::LinearMipmapLinear => (FilterMode::Linear, MipmapMode::Linear),
    }
}

/// Address modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Legacy wrap values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyWrap {
    Clamp,
    ClampToEdge,
    ClampToBorder,
    Repeat,
    Mirror,
}

/// Map a legacy wrap value onto an address mode. Plain `Clamp` has
/// no exact counterpart and clamps to the edge.
pub fn map_wrap(wrap: LegacyWrap) -> WrapMode {
    match wrap {
        LegacyWrap::Clamp => WrapMode::ClampToEdge,
        LegacyWrap::ClampToEdge => WrapMode::ClampToEdge,
        LegacyWrap::ClampToBorder => WrapMode::ClampToBorder,
        LegacyWrap::Repeat => WrapMode::Repeat,
        LegacyWrap::Mirror => WrapMode::MirroredRepeat,
    }
}

/// Sampler parameters for one texture binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_mode: MipmapMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub max_anisotropy: f32,
    pub lod_min: f32,
    pub lod_max: f32,
}

impl SamplerDesc {
    /// Build from legacy parameters, applying the lookup tables.
    pub fn from_legacy(
        min_filter: LegacyFilter,
        mag_filter: LegacyFilter,
        wrap_u: LegacyWrap,
        wrap_v: LegacyWrap,
    ) -> Self {
        let (min, mipmap) = map_filter(min_filter);
        let (mag, _) = map_filter(mag_filter);
        Self {
            min_filter: min,
            mag_filter: mag,
            mipmap_mode: mipmap,
            wrap_u: map_wrap(wrap_u),
            wrap_v: map_wrap(wrap_v),
            ..Self::default()
        }
    }

    /// Clamp out-of-range parameters to values the device accepts:
    /// anisotropy into [1, MAX_ANISOTROPY], LOD bounds ordered.
    pub fn clamped(mut self) -> Self {
        self.max_anisotropy = self.max_anisotropy.clamp(1.0, MAX_ANISOTROPY);
        if self.lod_min > self.lod_max {
            log::warn!(
                "sampler LOD range [{}, {}] is inverted; swapping",
                self.lod_min,
                self.lod_max
            );
            std::mem::swap(&mut self.lod_min, &mut self.lod_max);
        }
        self
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_mode: MipmapMode::Linear,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            max_anisotropy: 1.0,
            lod_min: 0.0,
            lod_max: 1000.0,
        }
    }
}

/// A texture bound to one of the material's texture units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureAttachment {
    pub sampler: SamplerDesc,
}

/// Render state snapshot for one drawable.
///
/// Texture unit 0 carries the diffuse map, unit 1 the normal map,
/// matching the fragment stage's binding slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub lighting: bool,
    pub diffuse_map: Option<TextureAttachment>,
    pub normal_map: Option<TextureAttachment>,
}

impl RenderState {
    /// Derive the state mask the shader synthesizer keys on.
    pub fn state_mask(&self) -> StateMask {
        let mut mask = StateMask::empty();
        if self.lighting {
            mask |= StateMask::LIGHTING;
        }
        if self.diffuse_map.is_some() {
            mask |= StateMask::DIFFUSE_MAP;
        }
        if self.normal_map.is_some() {
            mask |= StateMask::NORMAL_MAP;
        }
        mask
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            lighting: true,
            diffuse_map: None,
            normal_map: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mask_derivation() {
        assert_eq!(RenderState::default().state_mask(), StateMask::LIGHTING);

        let state = RenderState {
            lighting: false,
            diffuse_map: Some(TextureAttachment::default()),
            normal_map: None,
        };
        assert_eq!(state.state_mask(), StateMask::DIFFUSE_MAP);

        let state = RenderState {
            lighting: true,
            diffuse_map: Some(TextureAttachment::default()),
            normal_map: Some(TextureAttachment::default()),
        };
        assert_eq!(state.state_mask(), StateMask::all());
    }

    #[test]
    fn test_filter_table() {
        assert_eq!(
            map_filter(LegacyFilter::LinearMipmapLinear),
            (FilterMode::Linear, MipmapMode::Linear)
        );
        assert_eq!(
            map_filter(LegacyFilter::NearestMipmapLinear),
            (FilterMode::Nearest, MipmapMode::Linear)
        );
        assert_eq!(
            map_filter(LegacyFilter::Linear),
            (FilterMode::Linear, MipmapMode::Nearest)
        );
    }

    #[test]
    fn test_wrap_table() {
        assert_eq!(map_wrap(LegacyWrap::Clamp), WrapMode::ClampToEdge);
        assert_eq!(map_wrap(LegacyWrap::Mirror), WrapMode::MirroredRepeat);
        assert_eq!(map_wrap(LegacyWrap::Repeat), WrapMode::Repeat);
    }

    #[test]
    fn test_sampler_clamping() {
        let sampler = SamplerDesc {
            max_anisotropy: 64.0,
            lod_min: 5.0,
            lod_max: 2.0,
            ..SamplerDesc::default()
        }
        .clamped();

        assert_eq!(sampler.max_anisotropy, MAX_ANISOTROPY);
        assert_eq!(sampler.lod_min, 2.0);
        assert_eq!(sampler.lod_max, 5.0);

        let sampler = SamplerDesc {
            max_anisotropy: 0.0,
            ..SamplerDesc::default()
        }
        .clamped();
        assert_eq!(sampler.max_anisotropy, 1.0);
    }

    #[test]
    fn test_from_legacy() {
        let sampler = SamplerDesc::from_legacy(
            LegacyFilter::LinearMipmapLinear,
            LegacyFilter::Nearest,
            LegacyWrap::Clamp,
            LegacyWrap::Repeat,
        );
        assert_eq!(sampler.min_filter, FilterMode::Linear);
        assert_eq!(sampler.mag_filter, FilterMode::Nearest);
        assert_eq!(sampler.mipmap_mode, MipmapMode::Linear);
        assert_eq!(sampler.wrap_u, WrapMode::ClampToEdge);
        assert_eq!(sampler.wrap_v, WrapMode::Repeat);
    }
}
