//! Shader batch compilation
//!
//! Drives the shader toolchain over a batch of stage-tagged units:
//! stage mapping, independent per-unit parsing against a fixed
//! Vulkan-style target environment, cross-stage linking, and SPIR-V
//! emission written into each unit in place. A failed batch never
//! exposes partial binaries.

use std::borrow::Cow;

use naga::back::spv;
use naga::front::glsl;
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use thiserror::Error;

use crate::diagnostics::{CompileLog, DiagnosticPhase};
use crate::link;
use crate::toolchain::ToolchainGuard;

/// SPIR-V version emitted for every stage.
const SPIRV_VERSION: (u8, u8) = (1, 0);

/// Programmable pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
    RayGen,
    AnyHit,
    ClosestHit,
    Miss,
    Intersection,
    Callable,
    Task,
    Mesh,
}

impl ShaderStage {
    /// Map to the toolchain's stage enumeration. The embedded
    /// front-end covers the vertex, fragment and compute stages;
    /// every other value is unmappable and fails its batch.
    fn toolchain_stage(self) -> Option<naga::ShaderStage> {
        match self {
            ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
            ShaderStage::Fragment => Some(naga::ShaderStage::Fragment),
            ShaderStage::Compute => Some(naga::ShaderStage::Compute),
            _ => None,
        }
    }
}

/// One stage's source text and, after compilation, its binary.
///
/// Units are owned by the caller; a compile call writes `spirv` in
/// place on success and guarantees it is empty after any failure.
#[derive(Debug, Clone)]
pub struct ShaderUnit {
    stage: ShaderStage,
    source: String,
    spirv: Vec<u32>,
}

impl ShaderUnit {
    pub fn new(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            spirv: Vec::new(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the source text. Any compiled binary is stale and is
    /// discarded.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.spirv.clear();
    }

    /// Compiled SPIR-V words; empty until a compile call succeeds.
    pub fn spirv(&self) -> &[u32] {
        &self.spirv
    }

    pub fn take_spirv(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.spirv)
    }
}

/// Batch-fatal compilation errors.
///
/// Per-unit parse and validation failures are not errors by
/// themselves: they surface as [`CompileLog`] entries, and fail the
/// batch through [`CompileError::EmptyBatch`] or the link step when
/// they leave the program incomplete.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("shader stage {stage:?} has no mapping in the target toolchain")]
    UnsupportedStage { stage: ShaderStage },

    #[error("no shader unit in the batch was accepted by the front-end\n{log}")]
    EmptyBatch { log: CompileLog },

    #[error("failed to link shader program: {reason}\n{log}")]
    LinkFailure { reason: String, log: CompileLog },

    #[error("SPIR-V emission failed for {stage:?} stage: {message}")]
    Backend { stage: ShaderStage, message: String },
}

/// The separate-shader-objects pragma is implied by the Vulkan
/// target; the front-end does not recognize it, so drop it before
/// parsing.
fn strip_sso_pragma(source: &str) -> Cow<'_, str> {
    if !source.contains("GL_ARB_separate_shader_objects") {
        return Cow::Borrowed(source);
    }
    let kept: Vec<&str> = source
        .lines()
        .filter(|line| {
            !(line.trim_start().starts_with("#extension")
                && line.contains("GL_ARB_separate_shader_objects"))
        })
        .collect();
    Cow::Owned(kept.join("\n"))
}

/// Shader compiler
///
/// Holds a handle on the process-wide toolchain for its lifetime;
/// the handle is released on drop along every exit path.
pub struct ShaderCompiler {
    _toolchain: ToolchainGuard,
}

impl ShaderCompiler {
    pub fn new() -> Self {
        Self {
            _toolchain: ToolchainGuard::acquire(),
        }
    }

    fn spirv_options() -> spv::Options<'static> {
        spv::Options {
            lang_version: SPIRV_VERSION,
            flags: spv::WriterFlags::empty(),
            binding_map: Default::default(),
            capabilities: None,
            bounds_check_policies: Default::default(),
            zero_initialize_workgroup_memory: spv::ZeroInitializeWorkgroupMemoryMode::None,
            debug_info: None,
        }
    }

    /// Target SPIR-V version as `major.minor`.
    pub fn spirv_version(&self) -> String {
        format!("{}.{}", SPIRV_VERSION.0, SPIRV_VERSION.1)
    }

    /// Compile a batch of shader units as one linked program.
    ///
    /// Synchronous and blocking. On success every unit carries its
    /// SPIR-V words and the returned log holds any non-fatal
    /// diagnostics; on failure every unit's binary is empty and the
    /// error carries the accumulated log.
    pub fn compile(&self, batch: &mut [ShaderUnit]) -> Result<CompileLog, CompileError> {
        // Scrub output first so a failed batch never leaves binaries
        // behind, including output from an earlier call on reused
        // units.
        for unit in batch.iter_mut() {
            unit.spirv.clear();
        }

        // Stage mapping happens before any parsing; an unmappable
        // stage fails the batch with no partial work.
        let mut stages = Vec::with_capacity(batch.len());
        for unit in batch.iter() {
            let stage = unit
                .stage
                .toolchain_stage()
                .ok_or(CompileError::UnsupportedStage { stage: unit.stage })?;
            stages.push(stage);
        }

        let mut log = CompileLog::default();
        let mut frontend = glsl::Frontend::default();
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());

        // Independent per-unit parse and validation; a rejected unit
        // is recorded and drops out of the link set.
        let mut parsed: Vec<Option<(naga::Module, ModuleInfo)>> =
            Vec::with_capacity(batch.len());
        for (unit, &stage) in batch.iter().zip(&stages) {
            let source = strip_sso_pragma(&unit.source);
            match frontend.parse(&glsl::Options::from(stage), &source) {
                Ok(module) => match validator.validate(&module) {
                    Ok(info) => parsed.push(Some((module, info))),
                    Err(err) => {
                        let message = format!("{err:?}");
                        log::error!("{:?} stage failed validation: {message}", unit.stage);
                        log.push(DiagnosticPhase::Validate, Some(unit.stage), message);
                        parsed.push(None);
                    }
                },
                Err(err) => {
                    let message = err
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("\n");
                    log::error!("{:?} stage failed to parse: {message}", unit.stage);
                    log.push(DiagnosticPhase::Parse, Some(unit.stage), message);
                    parsed.push(None);
                }
            }
        }

        if parsed.iter().all(Option::is_none) {
            return Err(CompileError::EmptyBatch { log });
        }

        if let Err(reason) = link::link_program(batch, &parsed) {
            log::error!("shader program failed to link: {reason}");
            log.push(DiagnosticPhase::Link, None, reason.clone());
            return Err(CompileError::LinkFailure { reason, log });
        }

        // Translate every stage first; binaries are written back only
        // once the whole batch has translated.
        let options = Self::spirv_options();
        let mut binaries: Vec<Option<Vec<u32>>> = Vec::with_capacity(batch.len());
        for (unit, slot) in batch.iter().zip(&parsed) {
            match slot {
                Some((module, info)) => {
                    let words =
                        spv::write_vec(module, info, &options, None).map_err(|err| {
                            CompileError::Backend {
                                stage: unit.stage,
                                message: err.to_string(),
                            }
                        })?;
                    binaries.push(Some(words));
                }
                None => binaries.push(None),
            }
        }
        for (unit, words) in batch.iter_mut().zip(binaries) {
            if let Some(words) = words {
                unit.spirv = words;
            }
        }

        log::debug!("compiled shader batch of {} unit(s)", batch.len());
        Ok(log)
    }
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        Self::new()
    }
}
