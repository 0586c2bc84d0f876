//! Argument translation between calling conventions.
//!
//! Given the bindings in scope and the parameters of the callee, produce one C++
//! expression per callee parameter.
use crate::error::{CodegenError, Result};

use super::types::{Binding, BindingSource};

/// `const at::Tensor &` and `at::Tensor &` both name the value type `at::Tensor`.
fn value_type(ctype: &str) -> &str {
    let ctype = ctype.trim();
    let ctype = ctype.strip_prefix("const ").unwrap_or(ctype);
    ctype.strip_suffix('&').unwrap_or(ctype).trim()
}

fn convert(have: &str, goal: &str, expr: &str) -> Option<String> {
    if have == goal {
        return Some(expr.to_string());
    }
    let converted = match (have, goal) {
        ("int64_t", "c10::SymInt") => format!("c10::SymInt({expr})"),
        ("c10::SymInt", "int64_t") => format!("{expr}.guard_int(__FILE__, __LINE__)"),
        ("at::IntArrayRef", "c10::SymIntArrayRef") => format!("c10::fromIntArrayRefSlow({expr})"),
        ("c10::SymIntArrayRef", "at::IntArrayRef") => format!("C10_AS_INTARRAYREF_SLOW({expr})"),
        ("c10::optional<int64_t>", "c10::optional<c10::SymInt>") => {
            format!("{expr}.has_value() ? c10::make_optional(c10::SymInt(*{expr})) : c10::nullopt")
        }
        ("c10::optional<c10::SymInt>", "c10::optional<int64_t>") => format!(
            "{expr}.has_value() ? c10::make_optional({expr}->guard_int(__FILE__, __LINE__)) : c10::nullopt"
        ),
        ("at::OptionalIntArrayRef", "at::OptionalSymIntArrayRef") => format!(
            "{expr}.has_value() ? at::OptionalSymIntArrayRef(c10::fromIntArrayRefSlow(*{expr})) : c10::nullopt"
        ),
        ("at::OptionalSymIntArrayRef", "at::OptionalIntArrayRef") => format!(
            "{expr}.has_value() ? c10::make_optional(C10_AS_INTARRAYREF_SLOW(*{expr})) : c10::nullopt"
        ),
        ("c10::optional<at::Tensor>", "at::OptionalTensorRef") => format!(
            "(({expr}.has_value() && (*{expr}).defined()) ? at::OptionalTensorRef(*{expr}) : at::OptionalTensorRef())"
        ),
        ("c10::optional<at::Scalar>", "at::OptionalScalarRef") => format!(
            "({expr}.has_value() ? at::OptionalScalarRef(&({expr}.value())) : at::OptionalScalarRef())"
        ),
        ("at::TensorList", "at::ITensorListRef") => expr.to_string(),
        _ => return None,
    };
    Some(converted)
}

/// Expression for one scattered tensor option read from a gathered `options`.
fn unpack_options(field: &str, options: &str) -> Option<String> {
    let expr = match field {
        "dtype" => format!("c10::optTypeMetaToScalarType({options}.dtype_opt())"),
        "layout" => format!("{options}.layout_opt()"),
        "device" => format!("{options}.device_opt()"),
        "pin_memory" => format!("{options}.pinned_memory_opt()"),
        _ => return None,
    };
    Some(expr)
}

/// Translate `bindings` into one expression per entry of `goals`.
pub fn translate(bindings: &[Binding], goals: &[Binding], context: &str) -> Result<Vec<String>> {
    let gathered = bindings
        .iter()
        .find(|b| matches!(b.source, BindingSource::TensorOptions(_)));
    goals
        .iter()
        .map(|goal| translate_one(bindings, gathered, goal, context))
        .collect()
}

fn translate_one(
    bindings: &[Binding],
    gathered: Option<&Binding>,
    goal: &Binding,
    context: &str,
) -> Result<String> {
    let failed = || CodegenError::Translate {
        goal: goal.defn(),
        context: context.to_string(),
    };
    match &goal.source {
        BindingSource::Precomputed(_) => return Ok(format!("precompute.{}", goal.name)),
        BindingSource::TensorOptions(_) => {
            let scattered: Option<Vec<&str>> = ["dtype", "layout", "device", "pin_memory"]
                .iter()
                .map(|field| bindings.iter().find(|b| b.name == *field).map(|b| b.name.as_str()))
                .collect();
            return match (bindings.iter().find(|b| b.name == goal.name), scattered) {
                (Some(have), _) => Ok(have.name.clone()),
                (None, Some(fields)) => Ok(format!(
                    "at::TensorOptions().dtype({}).layout({}).device({}).pinned_memory({})",
                    fields[0], fields[1], fields[2], fields[3]
                )),
                (None, None) => Err(failed()),
            };
        }
        BindingSource::Argument(_) => {}
    }

    let have = bindings
        .iter()
        .find(|b| b.name == goal.name && !matches!(b.source, BindingSource::TensorOptions(_)));
    if let Some(have) = have {
        return convert(value_type(&have.ctype), value_type(&goal.ctype), &have.name)
            .ok_or_else(failed);
    }
    gathered
        .and_then(|options| unpack_options(&goal.name, &options.name))
        .ok_or_else(failed)
}

