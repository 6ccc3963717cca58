//! # Prism Shader
//!
//! Shader-variant synthesis and compilation for the Prism conversion
//! pipeline:
//! - Feature masks describing geometry attributes and render state
//! - GLSL 450 source synthesis per mask combination
//! - GLSL parsing, cross-stage linking and SPIR-V emission via naga
//! - Variant registry so each mask combination compiles once
//!
//! ## Architecture
//!
//! ```text
//! (StateMask, AttributeMask) ──► Synthesizer ──► GLSL per stage
//!                                                     │
//!                                                     ▼
//!                      ShaderCompiler ──► parse ──► link ──► SPIR-V
//!                                                     │
//!                                                     ▼
//!                                              VariantRegistry
//! ```

pub mod compiler;
pub mod diagnostics;
mod link;
pub mod mask;
pub mod registry;
pub mod synth;
pub mod toolchain;

pub use compiler::{CompileError, ShaderCompiler, ShaderStage, ShaderUnit};
pub use diagnostics::{CompileLog, Diagnostic, DiagnosticPhase};
pub use mask::{AttributeMask, StateMask};
pub use registry::{RegistryStats, VariantEntry, VariantId, VariantKey, VariantRegistry};
pub use synth::{synthesize, AttributeLocations, ShaderFeatures, StageSources};
pub use toolchain::ToolchainGuard;

use std::collections::HashMap;

use thiserror::Error;

/// Variant pipeline configuration
#[derive(Debug, Clone)]
pub struct VariantPipelineConfig {
    /// Maximum cached variants (0 = unlimited)
    pub max_cached_variants: usize,
}

impl Default for VariantPipelineConfig {
    fn default() -> Self {
        Self {
            max_cached_variants: 256,
        }
    }
}

/// Errors from the variant pipeline
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("variant not found: {0:?}")]
    NotFound(VariantId),
}

/// The variant pipeline: synthesize, compile, cache.
///
/// Compiled variants go through the modern (non-compat) convention;
/// compat-mode synthesis targets the legacy named-uniform consumer
/// and is available directly through [`synthesize`].
pub struct VariantPipeline {
    compiler: ShaderCompiler,
    registry: VariantRegistry,
}

impl VariantPipeline {
    pub fn new(config: VariantPipelineConfig) -> Self {
        Self {
            compiler: ShaderCompiler::new(),
            registry: VariantRegistry::new(config.max_cached_variants),
        }
    }

    /// Get or build the compiled variant for a mask pair.
    pub fn variant(
        &self,
        state: StateMask,
        attributes: AttributeMask,
    ) -> Result<VariantId, ShaderError> {
        let key = VariantKey {
            state,
            attributes,
            compat: false,
        };
        if let Some(id) = self.registry.id_for_key(&key) {
            return Ok(id);
        }

        let sources = synth::synthesize(state, attributes, key.compat);
        let mut batch = [
            ShaderUnit::new(ShaderStage::Vertex, sources.vertex.clone()),
            ShaderUnit::new(ShaderStage::Fragment, sources.fragment.clone()),
        ];
        let log = self.compiler.compile(&mut batch)?;
        if !log.is_empty() {
            log::warn!("variant {key:?} compiled with diagnostics:\n{log}");
        }

        let mut binaries = HashMap::new();
        for unit in &mut batch {
            binaries.insert(unit.stage(), unit.take_spirv());
        }

        let entry = VariantEntry::new(key, sources.vertex, sources.fragment, binaries);
        Ok(self.registry.register(entry))
    }

    pub fn get(&self, id: VariantId) -> Result<VariantEntry, ShaderError> {
        self.registry.get(id).ok_or(ShaderError::NotFound(id))
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    pub fn compiler(&self) -> &ShaderCompiler {
        &self.compiler
    }
}

impl Default for VariantPipeline {
    fn default() -> Self {
        Self::new(VariantPipelineConfig::default())
    }
}
