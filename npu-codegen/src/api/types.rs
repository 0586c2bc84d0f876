use crate::model::schema::{Argument, TensorOptionsArguments};

/// Where a C++ binding comes from in the schema.
#[derive(Debug, Clone)]
pub enum BindingSource {
    Argument(Argument),
    /// The gathered `at::TensorOptions options` parameter.
    TensorOptions(TensorOptionsArguments),
    /// Produced by a structured kernel's `meta()` step.
    Precomputed(Argument),
}

/// One C++ parameter: its type, name and optional default.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ctype: String,
    pub default: Option<String>,
    pub source: BindingSource,
}

impl Binding {
    pub fn decl(&self) -> String {
        match &self.default {
            Some(default) => format!("{} {}={}", self.ctype, self.name, default),
            None => self.defn(),
        }
    }

    pub fn defn(&self) -> String {
        format!("{} {}", self.ctype, self.name)
    }

    pub fn no_default(mut self) -> Self {
        self.default = None;
        self
    }

    pub fn is_tensor_like(&self) -> bool {
        match &self.source {
            BindingSource::Argument(arg) | BindingSource::Precomputed(arg) => {
                arg.ty.is_tensor_like()
            }
            BindingSource::TensorOptions(_) => false,
        }
    }
}

/// Clear defaults on parameters followed by a parameter without one.
pub fn drop_leading_defaults(bindings: &mut [Binding]) {
    if let Some(last_required) = bindings.iter().rposition(|b| b.default.is_none()) {
        for binding in &mut bindings[..last_required] {
            binding.default = None;
        }
    }
}

/// A named C++ function signature.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub returns_type: String,
    pub bindings: Vec<Binding>,
}

impl Signature {
    pub fn decl(&self) -> String {
        let args: Vec<String> = self.bindings.iter().map(Binding::decl).collect();
        format!("{} {}({})", self.returns_type, self.name, args.join(", "))
    }

    pub fn defn(&self) -> String {
        format!("{} {}({})", self.returns_type, self.name, self.args_defn())
    }

    pub fn args_defn(&self) -> String {
        let args: Vec<String> = self.bindings.iter().map(Binding::defn).collect();
        args.join(", ")
    }
}
