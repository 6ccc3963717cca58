//! Cross-stage program linking
//!
//! The front-end parses and validates one module at a time; this
//! module combines the parsed stages into a single program. Linking
//! requires that every stage submitted with the batch survived
//! parsing, that no stage appears twice, and that the fragment
//! stage's inputs agree with the vertex stage's outputs slot for
//! slot and type for type.

use naga::valid::ModuleInfo;
use naga::{Binding, Handle, Module, Type, TypeInner};

use crate::compiler::{ShaderStage, ShaderUnit};

/// Flattened interface variable type, comparable across modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoType {
    Scalar {
        kind: naga::ScalarKind,
        width: u8,
    },
    Vector {
        size: naga::VectorSize,
        kind: naga::ScalarKind,
        width: u8,
    },
    Matrix {
        columns: naga::VectorSize,
        rows: naga::VectorSize,
        width: u8,
    },
}

fn io_type(module: &Module, ty: Handle<Type>) -> Option<IoType> {
    match module.types[ty].inner {
        TypeInner::Scalar { kind, width } => Some(IoType::Scalar { kind, width }),
        TypeInner::Vector { size, kind, width } => Some(IoType::Vector { size, kind, width }),
        TypeInner::Matrix {
            columns,
            rows,
            width,
        } => Some(IoType::Matrix {
            columns,
            rows,
            width,
        }),
        _ => None,
    }
}

/// Collect `(location, type)` pairs from a bound value, flattening
/// through an unbound struct whose members carry the bindings.
fn collect_bound(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    vars: &mut Vec<(u32, IoType)>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some(io) = io_type(module, ty) {
                vars.push((*location, io));
            }
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { ref members, .. } = module.types[ty].inner {
                for member in members {
                    collect_bound(module, member.ty, member.binding.as_ref(), vars);
                }
            }
        }
    }
}

fn entry_inputs(module: &Module) -> Vec<(u32, IoType)> {
    let mut vars = Vec::new();
    if let Some(ep) = module.entry_points.first() {
        for arg in &ep.function.arguments {
            collect_bound(module, arg.ty, arg.binding.as_ref(), &mut vars);
        }
    }
    vars
}

fn entry_outputs(module: &Module) -> Vec<(u32, IoType)> {
    let mut vars = Vec::new();
    if let Some(ep) = module.entry_points.first() {
        if let Some(result) = &ep.function.result {
            collect_bound(module, result.ty, result.binding.as_ref(), &mut vars);
        }
    }
    vars
}

/// Link the parsed set as one program. `parsed` runs parallel to
/// `units`; `None` marks a unit the front-end rejected.
pub(crate) fn link_program(
    units: &[ShaderUnit],
    parsed: &[Option<(Module, ModuleInfo)>],
) -> Result<(), String> {
    // Every requested stage must be present; a program missing one
    // of its stages is not linkable.
    let missing: Vec<ShaderStage> = units
        .iter()
        .zip(parsed)
        .filter(|(_, slot)| slot.is_none())
        .map(|(unit, _)| unit.stage())
        .collect();
    if !missing.is_empty() {
        return Err(format!(
            "program is missing {missing:?} stage(s) rejected by the front-end"
        ));
    }

    for (index, unit) in units.iter().enumerate() {
        if units[..index].iter().any(|u| u.stage() == unit.stage()) {
            return Err(format!("duplicate {:?} stage in batch", unit.stage()));
        }
    }

    let position = |stage: ShaderStage| units.iter().position(|u| u.stage() == stage);
    if let (Some(vi), Some(fi)) = (position(ShaderStage::Vertex), position(ShaderStage::Fragment))
    {
        if let (Some((vertex, _)), Some((fragment, _))) =
            (parsed[vi].as_ref(), parsed[fi].as_ref())
        {
            let outputs = entry_outputs(vertex);
            for (location, ty) in entry_inputs(fragment) {
                let satisfied = outputs.iter().any(|(l, t)| *l == location && *t == ty);
                if !satisfied {
                    return Err(format!(
                        "fragment input at location {location} ({ty:?}) has no matching \
                         vertex output"
                    ));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use naga::front::glsl;
    use naga::valid::{Capabilities, ValidationFlags, Validator};

    fn parse(stage: naga::ShaderStage, source: &str) -> (Module, ModuleInfo) {
        let module = glsl::Frontend::default()
            .parse(&glsl::Options::from(stage), source)
            .expect("test shader parses");
        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .expect("test shader validates");
        (module, info)
    }

    const VS: &str = "#version 450\n\
        layout(location = 0) in vec3 pos;\n\
        layout(location = 0) out vec3 shade;\n\
        void main() { shade = pos; gl_Position = vec4(pos, 1.0); }\n";

    const FS: &str = "#version 450\n\
        layout(location = 0) in vec3 shade;\n\
        layout(location = 0) out vec4 color;\n\
        void main() { color = vec4(shade, 1.0); }\n";

    #[test]
    fn test_interface_extraction() {
        let (vertex, _) = parse(naga::ShaderStage::Vertex, VS);
        let outputs = entry_outputs(&vertex);
        // gl_Position is a builtin and is not part of the location
        // interface.
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, 0);

        let (fragment, _) = parse(naga::ShaderStage::Fragment, FS);
        let inputs = entry_inputs(&fragment);
        assert_eq!(inputs, outputs);
    }

    #[test]
    fn test_matching_interface_links() {
        let units = [
            ShaderUnit::new(ShaderStage::Vertex, VS),
            ShaderUnit::new(ShaderStage::Fragment, FS),
        ];
        let parsed = vec![
            Some(parse(naga::ShaderStage::Vertex, VS)),
            Some(parse(naga::ShaderStage::Fragment, FS)),
        ];
        assert!(link_program(&units, &parsed).is_ok());
    }

    #[test]
    fn test_missing_stage_fails() {
        let units = [
            ShaderUnit::new(ShaderStage::Vertex, VS),
            ShaderUnit::new(ShaderStage::Fragment, FS),
        ];
        let parsed = vec![Some(parse(naga::ShaderStage::Vertex, VS)), None];
        let reason = link_program(&units, &parsed).unwrap_err();
        assert!(reason.contains("Fragment"));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let wide_fs = "#version 450\n\
            layout(location = 0) in vec4 shade;\n\
            layout(location = 0) out vec4 color;\n\
            void main() { color = shade; }\n";
        let units = [
            ShaderUnit::new(ShaderStage::Vertex, VS),
            ShaderUnit::new(ShaderStage::Fragment, wide_fs),
        ];
        let parsed = vec![
            Some(parse(naga::ShaderStage::Vertex, VS)),
            Some(parse(naga::ShaderStage::Fragment, wide_fs)),
        ];
        let reason = link_program(&units, &parsed).unwrap_err();
        assert!(reason.contains("location 0"));
    }
}
