//! Shader preview
//!
//! Builds a sample mesh and a set of render states, derives their
//! feature masks, then synthesizes and compiles every variant
//! through the pipeline. Prints a per-variant summary; pass `--dump`
//! to also print the generated GLSL.

use glam::{Vec2, Vec3, Vec4};

use prism_convert::{
    ArrayData, Indices, MeshGeometry, PrimitiveMode, RenderState, TextureAttachment,
    VertexChannel,
};
use prism_shader::{ShaderStage, VariantPipeline, VariantPipelineConfig};

/// A unit quad with normals, colors, texture coordinates and
/// tangents, so every shader feature can activate.
fn build_sample_mesh() -> MeshGeometry {
    let positions = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    let indices = Indices::from_u32(&[0, 1, 2, 2, 3, 0]);

    let mut mesh = MeshGeometry::new(positions, indices, PrimitiveMode::Triangles);
    mesh.normals = Some(VertexChannel::per_vertex(ArrayData::Vec3(vec![Vec3::Z; 4])));
    mesh.colors = Some(VertexChannel::per_vertex(ArrayData::Vec4(vec![Vec4::ONE; 4])));
    mesh.texcoords[0] = Some(VertexChannel::per_vertex(ArrayData::Vec2(vec![
        Vec2::ZERO,
        Vec2::X,
        Vec2::ONE,
        Vec2::Y,
    ])));
    mesh.tangents = Some(VertexChannel::per_vertex(ArrayData::Vec3(vec![Vec3::X; 4])));
    mesh
}

fn sample_states() -> Vec<(&'static str, RenderState)> {
    vec![
        (
            "unshaded",
            RenderState {
                lighting: false,
                diffuse_map: None,
                normal_map: None,
            },
        ),
        ("lit", RenderState::default()),
        (
            "lit + diffuse map",
            RenderState {
                diffuse_map: Some(TextureAttachment::default()),
                ..RenderState::default()
            },
        ),
        (
            "lit + diffuse + normal map",
            RenderState {
                diffuse_map: Some(TextureAttachment::default()),
                normal_map: Some(TextureAttachment::default()),
                ..RenderState::default()
            },
        ),
    ]
}

fn main() {
    env_logger::init();

    let dump = std::env::args().any(|arg| arg == "--dump");

    let mesh = build_sample_mesh();
    if let Err(err) = mesh.validate() {
        log::error!("sample mesh is invalid: {err}");
        std::process::exit(1);
    }
    let attributes = mesh.attribute_mask();
    println!("mesh attributes: {attributes:?}");

    let pipeline = VariantPipeline::new(VariantPipelineConfig::default());

    println!();
    println!(
        "{:<28} {:<26} {:>10} {:>10}",
        "state", "variant", "vs words", "fs words"
    );
    for (label, state) in sample_states() {
        let mask = state.state_mask();
        let id = match pipeline.variant(mask, attributes) {
            Ok(id) => id,
            Err(err) => {
                log::error!("failed to build variant for '{label}': {err}");
                std::process::exit(1);
            }
        };
        let entry = match pipeline.get(id) {
            Ok(entry) => entry,
            Err(err) => {
                log::error!("variant lookup failed for '{label}': {err}");
                std::process::exit(1);
            }
        };

        let vs_words = entry.spirv(ShaderStage::Vertex).map_or(0, <[u32]>::len);
        let fs_words = entry.spirv(ShaderStage::Fragment).map_or(0, <[u32]>::len);
        println!(
            "{label:<28} {:<26} {vs_words:>10} {fs_words:>10}",
            entry.name
        );

        if dump {
            println!(
                "\n--- {} vertex stage ---\n{}",
                entry.name, entry.vertex_source
            );
            println!(
                "--- {} fragment stage ---\n{}",
                entry.name, entry.fragment_source
            );
        }
    }

    let stats = pipeline.registry().stats();
    println!();
    println!(
        "{} variant(s) cached, {} source bytes, {} binary bytes",
        stats.variants, stats.source_bytes, stats.binary_bytes
    );
}
