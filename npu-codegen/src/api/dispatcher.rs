//! Dispatcher calling convention: schema order, SymInt types, no defaults.
use crate::model::native_function::NativeFunction;
use crate::model::schema::{Argument, FunctionSchema};

use super::cpp;
use super::types::{Binding, BindingSource, Signature};

pub fn argument(arg: &Argument, symint: bool) -> Binding {
    Binding {
        name: arg.name.clone(),
        ctype: cpp::argumenttype_type(&arg.ty, arg.is_write(), symint),
        default: None,
        source: BindingSource::Argument(arg.clone()),
    }
}

pub fn arguments(func: &FunctionSchema, symint: bool) -> Vec<Binding> {
    func.arguments
        .flat_all()
        .into_iter()
        .map(|arg| argument(arg, symint))
        .collect()
}

/// Symbol of the anonymous wrapper registered with the dispatcher:
/// `wrapper_<key>_<overload>_<cppname>`.
pub fn wrapper_name(func: &FunctionSchema, dispatch_key_display: &str) -> String {
    format!(
        "wrapper_{}_{}_{}",
        dispatch_key_display,
        func.name.overload_name,
        cpp::name(func, false, false)
    )
}

pub fn wrapper_signature(f: &NativeFunction, dispatch_key_display: &str) -> Signature {
    Signature {
        name: wrapper_name(&f.func, dispatch_key_display),
        returns_type: cpp::returns_type(&f.func.returns, true),
        bindings: arguments(&f.func, true),
    }
}
