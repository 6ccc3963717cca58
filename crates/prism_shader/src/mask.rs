//! Attribute and state feature masks
//!
//! Two bit-sets drive shader variant selection:
//! - [`AttributeMask`] describes which vertex attribute channels a
//!   geometry supplies, and how each is bound.
//! - [`StateMask`] describes which rendering effects the active
//!   render state requests.
//!
//! Both are derived by the conversion collaborators and treated as
//! opaque inputs by the synthesizer.

use bitflags::bitflags;

bitflags! {
    /// Vertex attribute channels available on a geometry.
    ///
    /// `_OVERALL` bits mark a channel that is bound once per draw
    /// (modeled as an instance-rate attribute) rather than per
    /// vertex. An `_OVERALL` bit is a sub-flag of its parent and is
    /// only meaningful when the parent bit is also set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AttributeMask: u32 {
        const VERTEX            = 1 << 0;
        const NORMAL            = 1 << 1;
        const NORMAL_OVERALL    = 1 << 2;
        const COLOR             = 1 << 3;
        const COLOR_OVERALL     = 1 << 4;
        const TEXCOORD0         = 1 << 5;
        const TEXCOORD1         = 1 << 6;
        const TEXCOORD2         = 1 << 7;
        const TANGENT           = 1 << 8;
        const TANGENT_OVERALL   = 1 << 9;
        const TRANSLATE         = 1 << 10;
        const TRANSLATE_OVERALL = 1 << 11;
    }
}

impl AttributeMask {
    /// Check the structural invariants of a mask: every geometry has
    /// positions, and no `_OVERALL` sub-flag appears without its
    /// parent channel.
    pub fn is_well_formed(&self) -> bool {
        if !self.contains(Self::VERTEX) {
            return false;
        }

        const PAIRS: [(AttributeMask, AttributeMask); 4] = [
            (AttributeMask::NORMAL, AttributeMask::NORMAL_OVERALL),
            (AttributeMask::COLOR, AttributeMask::COLOR_OVERALL),
            (AttributeMask::TANGENT, AttributeMask::TANGENT_OVERALL),
            (AttributeMask::TRANSLATE, AttributeMask::TRANSLATE_OVERALL),
        ];

        PAIRS
            .iter()
            .all(|(parent, overall)| !self.contains(*overall) || self.contains(*parent))
    }
}

bitflags! {
    /// Rendering effects requested by the active render state.
    ///
    /// Any combination is legal input; effects whose attribute
    /// requirements the geometry cannot satisfy are suppressed
    /// during synthesis rather than rejected.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct StateMask: u32 {
        const LIGHTING    = 1 << 0;
        const DIFFUSE_MAP = 1 << 1;
        const NORMAL_MAP  = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_required() {
        assert!(!AttributeMask::empty().is_well_formed());
        assert!(!AttributeMask::NORMAL.is_well_formed());
        assert!(AttributeMask::VERTEX.is_well_formed());
    }

    #[test]
    fn test_overall_requires_parent() {
        let orphan = AttributeMask::VERTEX | AttributeMask::NORMAL_OVERALL;
        assert!(!orphan.is_well_formed());

        let paired = AttributeMask::VERTEX
            | AttributeMask::NORMAL
            | AttributeMask::NORMAL_OVERALL;
        assert!(paired.is_well_formed());

        let translate_orphan = AttributeMask::VERTEX | AttributeMask::TRANSLATE_OVERALL;
        assert!(!translate_orphan.is_well_formed());
    }

    #[test]
    fn test_texcoords_have_no_overall_variant() {
        let mask = AttributeMask::VERTEX
            | AttributeMask::TEXCOORD0
            | AttributeMask::TEXCOORD1
            | AttributeMask::TEXCOORD2;
        assert!(mask.is_well_formed());
    }

    #[test]
    fn test_state_mask_combinations_are_legal() {
        // All eight combinations are representable.
        for bits in 0..8u32 {
            assert!(StateMask::from_bits(bits).is_some());
        }
    }
}
