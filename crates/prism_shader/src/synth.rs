//! Shader source synthesis
//!
//! Pure generation of matching vertex/fragment GLSL 450 source from a
//! (state, attribute) mask pair. Feature predicates are evaluated once
//! into [`ShaderFeatures`] and consumed by straight-line emission code
//! for both stages, so the two stages can never disagree about which
//! interface variables exist.
//!
//! Synthesis is total: it never fails, and mask bits it does not
//! recognize are ignored.

use std::fmt::Write;

use crate::mask::{AttributeMask, StateMask};

/// Tangent input slot. Sits outside the densely assigned range, per
/// the legacy attribute convention.
pub const TANGENT_LOCATION: u32 = 6;

// Inter-stage varying slots, identical in both stages.
const VARYING_TEXCOORD0: u32 = 0;
const VARYING_NORMAL_DIR: u32 = 1;
const VARYING_VIEW_DIR: u32 = 2;
const VARYING_LIGHT_DIR: u32 = 3;
const VARYING_COLOR: u32 = 4;

/// Feature predicates derived from a mask pair.
///
/// A feature is active only when the geometry supplies the attributes
/// it consumes AND the render state requests the effect; absence of
/// either suppresses the feature without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderFeatures {
    pub has_normal: bool,
    pub has_color: bool,
    pub has_tex0: bool,
    pub has_tangent: bool,
    pub use_normal: bool,
    pub use_color: bool,
    pub use_tex0: bool,
    pub use_lighting: bool,
    pub use_diffuse_map: bool,
    pub use_normal_map: bool,
}

impl ShaderFeatures {
    pub fn derive(state: StateMask, attributes: AttributeMask) -> Self {
        let has_normal = attributes.contains(AttributeMask::NORMAL);
        let has_color = attributes.contains(AttributeMask::COLOR);
        let has_tex0 = attributes.contains(AttributeMask::TEXCOORD0);
        let has_tangent = attributes.contains(AttributeMask::TANGENT);

        let use_normal = has_normal
            && state.intersects(StateMask::LIGHTING | StateMask::NORMAL_MAP);
        let use_tex0 = has_tex0
            && state.intersects(StateMask::DIFFUSE_MAP | StateMask::NORMAL_MAP);
        let use_lighting = use_normal && state.contains(StateMask::LIGHTING);
        let use_diffuse_map = use_tex0 && state.contains(StateMask::DIFFUSE_MAP);
        // Tangent-space normal mapping consumes the normal and tangent
        // channels to build its TBN basis, so both must be present.
        let use_normal_map = use_tex0
            && has_normal
            && has_tangent
            && state.contains(StateMask::NORMAL_MAP);

        Self {
            has_normal,
            has_color,
            has_tex0,
            has_tangent,
            use_normal,
            // A supplied color channel is always forwarded; no state
            // bit gates it.
            use_color: has_color,
            use_tex0,
            use_lighting,
            use_diffuse_map,
            use_normal_map,
        }
    }

    /// Whether the vertex stage emits view/light direction varyings.
    pub fn needs_light_vectors(&self) -> bool {
        self.use_lighting || self.use_normal_map
    }
}

/// Input slot assignment for the vertex stage.
///
/// `None` means the attribute is not declared for this variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLocations {
    pub vertex: u32,
    pub normal: Option<u32>,
    pub color: Option<u32>,
    pub tex0: Option<u32>,
    pub tangent: Option<u32>,
}

impl AttributeLocations {
    /// Assign input slots for a variant.
    ///
    /// In compat mode the slots are fixed (vertex=0, normal=1,
    /// color=2, texcoord0=3) to match the legacy convention.
    /// Otherwise slots are assigned densely, starting at 0, in the
    /// fixed priority order vertex, normal, color, texcoord0,
    /// counting only attributes the variant declares. The tangent
    /// keeps its fixed slot in both modes.
    pub fn assign(features: &ShaderFeatures, compat: bool) -> Self {
        let declare_normal = features.use_normal;
        let declare_color = features.use_color;
        let declare_tex0 = features.use_tex0;
        let declare_tangent = features.use_normal_map;

        if compat {
            return Self {
                vertex: 0,
                normal: declare_normal.then_some(1),
                color: declare_color.then_some(2),
                tex0: declare_tex0.then_some(3),
                tangent: declare_tangent.then_some(TANGENT_LOCATION),
            };
        }

        let mut next = 0u32;
        let mut take = |declared: bool| {
            if declared {
                let slot = next;
                next += 1;
                Some(slot)
            } else {
                None
            }
        };

        let vertex = take(true).unwrap_or(0);
        Self {
            vertex,
            normal: take(declare_normal),
            color: take(declare_color),
            tex0: take(declare_tex0),
            tangent: declare_tangent.then_some(TANGENT_LOCATION),
        }
    }
}

/// Synthesized source text for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

/// Synthesize matching vertex and fragment source for a mask pair.
///
/// Deterministic: identical inputs yield byte-identical output, so
/// callers may cache variants by mask key.
pub fn synthesize(state: StateMask, attributes: AttributeMask, compat: bool) -> StageSources {
    let features = ShaderFeatures::derive(state, attributes);
    let locations = AttributeLocations::assign(&features, compat);

    log::trace!(
        "synthesizing variant state={state:?} attributes={attributes:?} compat={compat}"
    );

    StageSources {
        vertex: emit_vertex(&features, &locations, compat),
        fragment: emit_fragment(&features, compat),
    }
}

fn header(compat: bool) -> String {
    let mut out = String::from("#version 450\n");
    if !compat {
        out.push_str("#extension GL_ARB_separate_shader_objects : enable\n");
    }
    out
}

/// Matrix expressions for the two uniform conventions.
struct MatrixExprs {
    mvp: &'static str,
    mv: &'static str,
    compat: bool,
}

fn matrix_exprs(compat: bool) -> MatrixExprs {
    if compat {
        MatrixExprs {
            mvp: "sg_ModelViewProjectionMatrix",
            mv: "sg_ModelViewMatrix",
            compat,
        }
    } else {
        MatrixExprs {
            mvp: "(pc.projection * pc.view * pc.model)",
            mv: "(pc.view * pc.model)",
            compat,
        }
    }
}

impl MatrixExprs {
    /// Normal-transform expression for a vec3. The legacy convention
    /// carries a dedicated normal matrix; the push-constant
    /// convention rotates through the model-view matrix with w = 0.
    fn rotate(&self, vector: &str) -> String {
        if self.compat {
            format!("sg_NormalMatrix * {vector}")
        } else {
            format!("({} * vec4({vector}, 0.0)).xyz", self.mv)
        }
    }
}

fn emit_vertex(features: &ShaderFeatures, locations: &AttributeLocations, compat: bool) -> String {
    let m = matrix_exprs(compat);

    let mut uniforms = String::new();
    if compat {
        uniforms.push_str("uniform mat4 sg_ModelViewProjectionMatrix;\n");
        if features.needs_light_vectors() {
            uniforms.push_str("uniform mat4 sg_ModelViewMatrix;\n");
            uniforms.push_str("uniform mat3 sg_NormalMatrix;\n");
        }
    } else {
        uniforms.push_str("layout(push_constant) uniform PushConstants {\n");
        uniforms.push_str("  mat4 projection;\n");
        uniforms.push_str("  mat4 view;\n");
        uniforms.push_str("  mat4 model;\n");
        uniforms.push_str("} pc;\n");
    }

    let mut inputs = String::new();
    let _ = writeln!(
        inputs,
        "layout(location = {}) in vec3 sg_Vertex;",
        locations.vertex
    );
    if let Some(slot) = locations.normal {
        let _ = writeln!(inputs, "layout(location = {slot}) in vec3 sg_Normal;");
    }
    if let Some(slot) = locations.color {
        let _ = writeln!(inputs, "layout(location = {slot}) in vec4 sg_Color;");
    }
    if let Some(slot) = locations.tex0 {
        let _ = writeln!(
            inputs,
            "layout(location = {slot}) in vec2 sg_MultiTexCoord0;"
        );
    }
    if let Some(slot) = locations.tangent {
        let _ = writeln!(inputs, "layout(location = {slot}) in vec3 sg_Tangent;");
    }

    let mut outputs = String::new();
    if features.use_tex0 {
        let _ = writeln!(
            outputs,
            "layout(location = {VARYING_TEXCOORD0}) out vec2 texCoord0;"
        );
    }
    // The eye-space normal is only interpolated for plain lighting;
    // the normal-mapped path rotates its vectors into tangent space
    // instead.
    if features.use_lighting && !features.use_normal_map {
        let _ = writeln!(
            outputs,
            "layout(location = {VARYING_NORMAL_DIR}) out vec3 normalDir;"
        );
    }
    if features.needs_light_vectors() {
        let _ = writeln!(
            outputs,
            "layout(location = {VARYING_VIEW_DIR}) out vec3 viewDir;"
        );
        let _ = writeln!(
            outputs,
            "layout(location = {VARYING_LIGHT_DIR}) out vec3 lightDir;"
        );
    }
    if features.use_color {
        let _ = writeln!(
            outputs,
            "layout(location = {VARYING_COLOR}) out vec4 vertColor;"
        );
    }

    let mut body = String::new();
    let _ = writeln!(
        body,
        "  gl_Position = {} * vec4(sg_Vertex, 1.0);",
        m.mvp
    );
    if features.use_tex0 {
        body.push_str("  texCoord0 = sg_MultiTexCoord0.st;\n");
    }
    if features.use_color {
        body.push_str("  vertColor = sg_Color;\n");
    }

    if features.needs_light_vectors() {
        // Fixed light; w == 0 marks a directional source.
        body.push_str("  vec4 lpos = vec4(0.0, 0.25, 1.0, 0.0);\n");
    }

    if features.use_normal_map {
        let _ = writeln!(body, "  vec3 n = {};", m.rotate("sg_Normal"));
        let _ = writeln!(body, "  vec3 t = {};", m.rotate("sg_Tangent"));
        body.push_str("  vec3 b = cross(n, t);\n");
        let _ = writeln!(
            body,
            "  vec3 dir = -vec3({} * vec4(sg_Vertex, 1.0));",
            m.mv
        );
        body.push_str("  viewDir.x = dot(dir, t);\n");
        body.push_str("  viewDir.y = dot(dir, b);\n");
        body.push_str("  viewDir.z = dot(dir, n);\n");
        body.push_str("  if (lpos.w == 0.0) {\n");
        body.push_str("    dir = lpos.xyz;\n");
        body.push_str("  } else {\n");
        body.push_str("    dir += lpos.xyz;\n");
        body.push_str("  }\n");
        body.push_str("  lightDir.x = dot(dir, t);\n");
        body.push_str("  lightDir.y = dot(dir, b);\n");
        body.push_str("  lightDir.z = dot(dir, n);\n");
    } else if features.use_lighting {
        let _ = writeln!(body, "  normalDir = {};", m.rotate("sg_Normal"));
        let _ = writeln!(
            body,
            "  vec3 dir = -vec3({} * vec4(sg_Vertex, 1.0));",
            m.mv
        );
        body.push_str("  viewDir = dir;\n");
        body.push_str("  if (lpos.w == 0.0) {\n");
        body.push_str("    lightDir = lpos.xyz;\n");
        body.push_str("  } else {\n");
        body.push_str("    lightDir = lpos.xyz + dir;\n");
        body.push_str("  }\n");
    }

    let mut source = header(compat);
    source.push_str(&uniforms);
    source.push_str(&inputs);
    source.push_str(&outputs);
    source.push_str("\nvoid main()\n{\n");
    source.push_str(&body);
    source.push_str("}\n");
    source
}

fn emit_fragment(features: &ShaderFeatures, compat: bool) -> String {
    let mut uniforms = String::new();
    if features.use_diffuse_map {
        uniforms.push_str("layout(binding = 0) uniform sampler2D diffuseMap;\n");
    }
    if features.use_normal_map {
        uniforms.push_str("layout(binding = 1) uniform sampler2D normalMap;\n");
    }

    // Inputs mirror the vertex stage's outputs slot for slot.
    let mut inputs = String::new();
    if features.use_tex0 {
        let _ = writeln!(
            inputs,
            "layout(location = {VARYING_TEXCOORD0}) in vec2 texCoord0;"
        );
    }
    if features.use_lighting && !features.use_normal_map {
        let _ = writeln!(
            inputs,
            "layout(location = {VARYING_NORMAL_DIR}) in vec3 normalDir;"
        );
    }
    if features.needs_light_vectors() {
        let _ = writeln!(
            inputs,
            "layout(location = {VARYING_VIEW_DIR}) in vec3 viewDir;"
        );
        let _ = writeln!(
            inputs,
            "layout(location = {VARYING_LIGHT_DIR}) in vec3 lightDir;"
        );
    }
    if features.use_color {
        let _ = writeln!(
            inputs,
            "layout(location = {VARYING_COLOR}) in vec4 vertColor;"
        );
    }

    let outputs = "layout(location = 0) out vec4 outColor;\n";

    let mut body = String::new();
    if features.use_diffuse_map {
        body.push_str("  vec4 base = texture(diffuseMap, texCoord0.st);\n");
    } else {
        body.push_str("  vec4 base = vec4(1.0);\n");
    }
    if features.use_color {
        body.push_str("  base *= vertColor;\n");
    }
    if features.use_normal_map {
        body.push_str("  vec3 normalDir = texture(normalMap, texCoord0.st).xyz * 2.0 - 1.0;\n");
    }

    if features.needs_light_vectors() {
        body.push_str("  vec3 nd = normalize(normalDir);\n");
        body.push_str("  vec3 ld = normalize(lightDir);\n");
        body.push_str("  vec3 vd = normalize(viewDir);\n");
        body.push_str("  vec4 color = vec4(0.01, 0.01, 0.01, 1.0);\n");
        body.push_str("  color += vec4(0.1, 0.1, 0.1, 0.0);\n");
        body.push_str("  float diff = max(dot(ld, nd), 0.0);\n");
        body.push_str("  color += vec4(0.8, 0.8, 0.8, 0.0) * diff;\n");
        body.push_str("  color *= base;\n");
        body.push_str("  if (diff > 0.0) {\n");
        body.push_str("    vec3 halfDir = normalize(ld + vd);\n");
        body.push_str(
            "    color += vec4(base.a * vec3(0.2, 0.2, 0.2) * pow(max(dot(halfDir, nd), 0.0), 16.0), 0.0);\n",
        );
        body.push_str("  }\n");
    } else {
        body.push_str("  vec4 color = base;\n");
    }
    body.push_str("  outColor = color;\n");

    let mut source = header(compat);
    source.push_str(&uniforms);
    source.push_str(&inputs);
    source.push_str(outputs);
    source.push_str("\nvoid main()\n{\n");
    source.push_str(&body);
    source.push_str("}\n");
    source
}
