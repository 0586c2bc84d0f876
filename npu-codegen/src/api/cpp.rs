//! Public C++ API: names, parameter types, defaults and signature variants.
use crate::model::native_function::NativeFunction;
use crate::model::schema::{Argument, ArgumentItem, Arguments, FunctionSchema, Return};
use crate::model::types::{BaseTy, Type};

use super::types::{drop_leading_defaults, Binding, BindingSource, Signature};

/// Public C++ name of an operator.
///
/// Out overloads get `_out`, or `_outf` for the faithful variant.
pub fn name(
    func: &FunctionSchema,
    faithful_name_for_out_overloads: bool,
    symint_overload: bool,
) -> String {
    let mut name = func.name.name.to_string();
    if symint_overload {
        name.push_str("_symint");
    }
    if func.is_out_fn() {
        if faithful_name_for_out_overloads {
            name.push_str("_outf");
        } else {
            name.push_str("_out");
        }
    }
    name
}

/// C++ type for types passed by value, `None` for reference types.
pub fn valuetype_type(ty: &Type, symint: bool) -> Option<String> {
    match ty {
        Type::Base(base) => {
            let text = match base {
                BaseTy::Tensor | BaseTy::Scalar => return None,
                BaseTy::Int => "int64_t",
                BaseTy::SymInt if symint => "c10::SymInt",
                BaseTy::SymInt => "int64_t",
                BaseTy::SymBool if symint => "c10::SymBool",
                BaseTy::SymBool => "bool",
                BaseTy::Float => "double",
                BaseTy::Bool => "bool",
                BaseTy::Str => "c10::string_view",
                BaseTy::ScalarType => "at::ScalarType",
                BaseTy::Layout => "at::Layout",
                BaseTy::Device => "at::Device",
                BaseTy::DeviceIndex => "at::DeviceIndex",
                BaseTy::MemoryFormat => "at::MemoryFormat",
                BaseTy::Dimname => "at::Dimname",
                BaseTy::DimVector => "at::DimVector",
                BaseTy::Generator => "at::Generator",
                BaseTy::QScheme => "at::QScheme",
                BaseTy::Storage => "at::Storage",
                BaseTy::Stream => "at::Stream",
                BaseTy::ConstQuantizerPtr => "at::ConstQuantizerPtr",
            };
            Some(text.to_string())
        }
        Type::Optional(elem) => {
            valuetype_type(elem, symint).map(|inner| format!("c10::optional<{inner}>"))
        }
        Type::List { elem, size: Some(size) } if elem.is_base(BaseTy::Bool) => {
            Some(format!("::std::array<bool,{size}>"))
        }
        Type::List { .. } => None,
    }
}

/// C++ parameter type of a schema type.
pub fn argumenttype_type(ty: &Type, mutable: bool, symint: bool) -> String {
    if let Some(value) = valuetype_type(ty, symint) {
        return value;
    }
    match ty {
        Type::Base(BaseTy::Tensor) if mutable => "at::Tensor &".to_string(),
        Type::Base(BaseTy::Tensor) => "const at::Tensor &".to_string(),
        Type::Base(_) => "const at::Scalar &".to_string(),
        Type::Optional(elem) => match elem.as_ref() {
            Type::Base(BaseTy::Tensor) if mutable => "c10::optional<at::Tensor> &".to_string(),
            Type::Base(BaseTy::Tensor) => "const c10::optional<at::Tensor> &".to_string(),
            Type::Base(BaseTy::Scalar) => "const c10::optional<at::Scalar> &".to_string(),
            Type::List { elem, .. } if elem.is_base(BaseTy::Int) => {
                "at::OptionalIntArrayRef".to_string()
            }
            Type::List { elem, .. } if elem.is_base(BaseTy::SymInt) => {
                if symint {
                    "at::OptionalSymIntArrayRef".to_string()
                } else {
                    "at::OptionalIntArrayRef".to_string()
                }
            }
            other => format!("c10::optional<{}>", argumenttype_type(other, mutable, symint)),
        },
        Type::List { elem, .. } => match elem.as_ref() {
            Type::Base(BaseTy::Tensor) => "at::TensorList".to_string(),
            Type::Optional(inner) if inner.is_base(BaseTy::Tensor) => {
                "const c10::List<c10::optional<at::Tensor>> &".to_string()
            }
            Type::Base(BaseTy::Int) => "at::IntArrayRef".to_string(),
            Type::Base(BaseTy::SymInt) if symint => "c10::SymIntArrayRef".to_string(),
            Type::Base(BaseTy::SymInt) => "at::IntArrayRef".to_string(),
            Type::Base(BaseTy::Dimname) => "at::DimnameList".to_string(),
            Type::Base(BaseTy::Scalar) => "at::ArrayRef<at::Scalar>".to_string(),
            other => format!("at::ArrayRef<{}>", argumenttype_type(other, false, symint)),
        },
    }
}

fn return_type(ret: &Return, symint: bool) -> String {
    match &ret.ty {
        Type::Base(BaseTy::Tensor) if ret.is_write() => "at::Tensor &".to_string(),
        Type::Base(BaseTy::Tensor) => "at::Tensor".to_string(),
        Type::Base(BaseTy::Scalar) => "at::Scalar".to_string(),
        Type::Optional(elem) if elem.is_base(BaseTy::Tensor) => {
            "c10::optional<at::Tensor>".to_string()
        }
        Type::List { elem, .. } if elem.is_base(BaseTy::Tensor) => {
            "::std::vector<at::Tensor>".to_string()
        }
        Type::List { elem, .. } if elem.is_base(BaseTy::SymInt) && symint => {
            "::std::vector<c10::SymInt>".to_string()
        }
        Type::List { elem, .. } if elem.is_base(BaseTy::Int) || elem.is_base(BaseTy::SymInt) => {
            "::std::vector<int64_t>".to_string()
        }
        other => valuetype_type(other, symint).unwrap_or_else(|| "at::Tensor".to_string()),
    }
}

/// C++ return type; several returns become a tuple.
pub fn returns_type(returns: &[Return], symint: bool) -> String {
    match returns {
        [] => "void".to_string(),
        [single] => return_type(single, symint),
        many => {
            let parts: Vec<String> = many.iter().map(|r| return_type(r, symint)).collect();
            format!("::std::tuple<{}>", parts.join(","))
        }
    }
}

/// C++ expression for a schema default value.
pub fn default_expr(default: &str, ty: &Type) -> String {
    if default == "None" {
        return match ty {
            Type::Optional(elem) if elem.is_base(BaseTy::Tensor) => "{}".to_string(),
            _ => "c10::nullopt".to_string(),
        };
    }
    match default {
        "True" => return "true".to_string(),
        "False" => return "false".to_string(),
        "contiguous_format" => return "at::MemoryFormat::Contiguous".to_string(),
        "per_tensor_affine" => return "at::kPerTensorAffine".to_string(),
        "long" => return "at::kLong".to_string(),
        "Mean" => return "at::Reduction::Mean".to_string(),
        _ => {}
    }
    let quoted = (default.starts_with('\'') && default.ends_with('\''))
        || (default.starts_with('"') && default.ends_with('"'));
    if quoted && default.len() >= 2 {
        let inner = &default[1..default.len() - 1];
        return format!("\"{}\"", inner.replace('\\', "\\\\").replace('"', "\\\""));
    }
    match (ty, default.strip_prefix('[').and_then(|d| d.strip_suffix(']'))) {
        (Type::List { .. }, Some(inner)) => format!("{{{inner}}}"),
        // `int[2] stride=1` keeps the scalar; the C++ array ref broadcasts it.
        _ => default.to_string(),
    }
}

fn argument_binding(arg: &Argument, symint: bool) -> Binding {
    Binding {
        name: arg.name.clone(),
        ctype: argumenttype_type(&arg.ty, arg.is_write(), symint),
        default: arg.default.as_deref().map(|d| default_expr(d, &arg.ty)),
        source: BindingSource::Argument(arg.clone()),
    }
}

/// Bindings for one grouped argument.
pub fn argument(item: ArgumentItem<'_>, faithful: bool, symint: bool) -> Vec<Binding> {
    match item {
        ArgumentItem::Plain(arg) | ArgumentItem::SelfArg(arg) => {
            vec![argument_binding(arg, symint)]
        }
        ArgumentItem::TensorOptions(options) if faithful => options
            .all()
            .into_iter()
            .map(|arg| argument_binding(arg, symint))
            .collect(),
        ArgumentItem::TensorOptions(options) => vec![Binding {
            name: "options".to_string(),
            ctype: "at::TensorOptions".to_string(),
            default: Some("{}".to_string()),
            source: BindingSource::TensorOptions(options.clone()),
        }],
    }
}

/// Public C++ parameters: non-out arguments, then out arguments.
///
/// Faithful signatures carry no defaults and keep tensor options scattered.
/// A default is also dropped when a parameter without one follows it.
pub fn arguments(args: &Arguments, faithful: bool, symint: bool) -> Vec<Binding> {
    let mut items = args.non_out();
    items.extend(args.out_items());
    let mut bindings: Vec<Binding> = items
        .into_iter()
        .flat_map(|item| argument(item, faithful, symint))
        .map(|binding| if faithful { binding.no_default() } else { binding })
        .collect();
    drop_leading_defaults(&mut bindings);
    bindings
}

fn signature(func: &FunctionSchema, faithful: bool, symint: bool) -> Signature {
    Signature {
        name: name(func, faithful, symint),
        returns_type: returns_type(&func.returns, symint),
        bindings: arguments(&func.arguments, faithful, symint),
    }
}

/// The public signature variants of one operator.
#[derive(Debug, Clone)]
pub struct CppSignatureGroup {
    pub signature: Signature,
    pub faithful_signature: Option<Signature>,
    pub symint_signature: Option<Signature>,
    pub symint_faithful_signature: Option<Signature>,
}

impl CppSignatureGroup {
    pub fn from_native_function(f: &NativeFunction) -> Self {
        let func = &f.func;
        let has_faithful = func.arguments.tensor_options.is_some() || func.is_out_fn();
        let has_symint = func.has_symint();
        Self {
            signature: signature(func, false, false),
            faithful_signature: has_faithful.then(|| signature(func, true, false)),
            symint_signature: has_symint.then(|| signature(func, false, true)),
            symint_faithful_signature: (has_symint && has_faithful)
                .then(|| signature(func, true, true)),
        }
    }

    pub fn signatures(&self, symint: bool) -> Vec<&Signature> {
        let mut out = vec![&self.signature];
        out.extend(self.faithful_signature.iter());
        if symint {
            out.extend(self.symint_signature.iter());
            out.extend(self.symint_faithful_signature.iter());
        }
        out
    }
}
