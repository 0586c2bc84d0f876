//! Structured kernel convention used by `meta()` and `impl()`.
//!
//! Structured kernels never see SymInt or gathered tensor options, and every
//! tensor (outputs included) arrives as a const reference.
use crate::error::{CodegenError, Result};
use crate::model::native_function::NativeFunction;
use crate::model::schema::{Argument, ArgumentItem};
use crate::model::types::{BaseTy, Type};

use super::cpp;
use super::types::{Binding, BindingSource};

pub fn argumenttype_type(ty: &Type) -> String {
    match ty {
        Type::Base(BaseTy::Tensor) => "const at::Tensor &".to_string(),
        Type::Optional(elem) if elem.is_base(BaseTy::Tensor) => "at::OptionalTensorRef".to_string(),
        Type::Optional(elem) if elem.is_base(BaseTy::Scalar) => "at::OptionalScalarRef".to_string(),
        Type::List { elem, .. } if elem.is_base(BaseTy::Tensor) => {
            "const at::ITensorListRef &".to_string()
        }
        other => cpp::argumenttype_type(other, false, false),
    }
}

fn binding(arg: &Argument, source: BindingSource) -> Binding {
    Binding {
        name: arg.name.clone(),
        ctype: argumenttype_type(&arg.ty),
        default: None,
        source,
    }
}

/// Bindings for one grouped argument; tensor options cannot appear here.
pub fn argument(item: ArgumentItem<'_>) -> Result<Binding> {
    match item {
        ArgumentItem::Plain(arg) | ArgumentItem::SelfArg(arg) => {
            Ok(binding(arg, BindingSource::Argument(arg.clone())))
        }
        ArgumentItem::TensorOptions(_) => Err(CodegenError::Translate {
            goal: "options".to_string(),
            context: "structured kernels do not take tensor options".to_string(),
        }),
    }
}

pub fn meta_arguments(f: &NativeFunction) -> Result<Vec<Binding>> {
    f.func.arguments.non_out().into_iter().map(argument).collect()
}

pub fn out_arguments(f: &NativeFunction) -> Result<Vec<Binding>> {
    f.func.arguments.out_items().into_iter().map(argument).collect()
}

/// `impl()` arguments: non-out with precomputed replacements, extra precomputed values, outs.
pub fn impl_arguments(f: &NativeFunction) -> Result<Vec<Binding>> {
    let mut bindings = Vec::new();
    let precomputed = f.precomputed.as_ref();
    for item in f.func.arguments.non_out() {
        let replaced = match item {
            ArgumentItem::Plain(arg) | ArgumentItem::SelfArg(arg) => {
                precomputed.and_then(|p| p.replacement(&arg.name))
            }
            ArgumentItem::TensorOptions(_) => None,
        };
        match replaced {
            Some(with) => bindings.extend(
                with.iter()
                    .map(|arg| binding(arg, BindingSource::Precomputed(arg.clone()))),
            ),
            None => bindings.push(argument(item)?),
        }
    }
    if let Some(precomputed) = precomputed {
        bindings.extend(
            precomputed
                .add
                .iter()
                .map(|arg| binding(arg, BindingSource::Precomputed(arg.clone()))),
        );
    }
    bindings.extend(out_arguments(f)?);
    Ok(bindings)
}

/// Name of the host meta struct a structured out kernel derives from,
/// `at::meta::structured_<name>`.
///
/// The name comes from the functional operator delegating to `f`; without one
/// the out overload is stripped from `f`'s own name.
pub fn meta_name(f: &NativeFunction, universe: &[NativeFunction]) -> String {
    let delegate = universe.iter().find(|g| {
        !g.func.name.name.inplace && g.structured_delegate.as_ref() == Some(&f.func.name)
    });
    if let Some(functional) = delegate {
        return functional.func.name.to_string().replace('.', "_");
    }
    let base = f.func.name.name.base.as_str();
    match f.func.name.overload_name.as_str() {
        "" | "out" => base.to_string(),
        overload => match overload.strip_suffix("_out") {
            Some(prefix) => format!("{base}_{prefix}"),
            None => format!("{base}_{overload}"),
        },
    }
}
