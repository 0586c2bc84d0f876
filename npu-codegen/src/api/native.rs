//! Native kernel convention: the signature backend kernels are written against.
//!
//! Non-out arguments come first, then outs; tensor options stay scattered.
use crate::model::schema::{Argument, FunctionSchema};
use crate::model::types::{BaseTy, Type};

use super::cpp;
use super::types::{drop_leading_defaults, Binding, BindingSource, Signature};

pub fn argument(arg: &Argument, symint: bool) -> Binding {
    let ctype = match &arg.ty {
        // Kernels take optional tensors by const reference even when mutable.
        Type::Optional(inner) if inner.is_base(BaseTy::Tensor) => {
            cpp::argumenttype_type(&arg.ty, false, symint)
        }
        ty => cpp::argumenttype_type(ty, arg.is_write(), symint),
    };
    Binding {
        name: arg.name.clone(),
        ctype,
        default: arg.default.as_deref().map(|d| cpp::default_expr(d, &arg.ty)),
        source: BindingSource::Argument(arg.clone()),
    }
}

pub fn arguments(func: &FunctionSchema, symint: bool) -> Vec<Binding> {
    let args = &func.arguments;
    let mut bindings: Vec<Binding> = args
        .flat_non_out()
        .into_iter()
        .chain(args.out.iter())
        .map(|arg| argument(arg, symint))
        .collect();
    drop_leading_defaults(&mut bindings);
    bindings
}

/// Signature of the backend kernel `kernel`.
pub fn kernel_signature(func: &FunctionSchema, kernel: &str, symint: bool) -> Signature {
    Signature {
        name: kernel.to_string(),
        returns_type: cpp::returns_type(&func.returns, symint),
        bindings: arguments(func, symint),
    }
}
