//! Per-operator C++ synthesis for one backend dispatch key.
//!
//! Each call to [`RegisterDispatchKey::generate`] produces the text for a
//! single operator and a single [`Target`]; `Ok(None)` means the operator
//! contributes nothing to that target.
use std::fmt;

use crate::api::cpp::CppSignatureGroup;
use crate::api::dispatcher;
use crate::api::native;
use crate::api::structured;
use crate::api::translate::translate;
use crate::api::types::{Binding, Signature};
use crate::backend::{BackendIndex, BackendMetadata};
use crate::error::{CodegenError, Result};
use crate::model::dispatch_key::display_name;
use crate::model::native_function::{DeviceCheckType, NativeFunction};
use crate::model::schema::{Argument, ArgumentItem};
use crate::selector::OperatorSelector;
use crate::settings::Settings;
use crate::state::CodegenState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Out-of-line definition of a kernel class member.
    Definition,
    /// Declaration of a kernel class member.
    Declaration,
    /// `m.impl(...)` statement inside a `TORCH_LIBRARY_IMPL` block.
    Registration,
    /// The dispatcher wrapper itself, in an anonymous namespace.
    AnonymousDefinition,
    /// Public forwarding function for direct callers.
    NamespacedDefinition,
    /// Public forward declaration for direct callers.
    NamespacedDeclaration,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::Definition => "DEFINITION",
            Target::Declaration => "DECLARATION",
            Target::Registration => "REGISTRATION",
            Target::AnonymousDefinition => "ANONYMOUS_DEFINITION",
            Target::NamespacedDefinition => "NAMESPACED_DEFINITION",
            Target::NamespacedDeclaration => "NAMESPACED_DECLARATION",
        };
        f.write_str(name)
    }
}

const PROFILER_PROLOGUE: &str =
    "#ifndef BUILD_LIBTORCH\ntorch_npu::profiler::NPURecordFunction guard;\n#endif\n";
const NO_DEVICE_CHECK: &str = "  // No device check\n";
const NO_DEVICE_GUARD: &str = "// DeviceGuard omitted";

pub struct RegisterDispatchKey<'a> {
    pub backend_index: &'a BackendIndex,
    pub target: Target,
    pub selector: &'a OperatorSelector,
    pub state: &'a CodegenState,
    pub settings: &'a Settings,
    /// Display name of the backend (`NPU`).
    pub backend: &'a str,
    /// Set when the op-plugin checkout was found on disk.
    pub op_plugin_enabled: bool,
    /// Also emit the SymInt variants of the public signatures.
    pub symint: bool,
}

impl<'a> RegisterDispatchKey<'a> {
    pub fn generate(&self, f: &NativeFunction) -> Result<Option<String>> {
        if !self.backend_index.has_kernel(f) || f.manual_kernel_registration {
            return Ok(None);
        }
        if self.target == Target::Registration && !self.selector.is_native_function_selected(f) {
            crate::trace_full!("{} not selected", f.op_key());
            return Ok(None);
        }

        let sig = self.wrapper_signature(f);
        match self.target {
            Target::NamespacedDeclaration => {
                let group = CppSignatureGroup::from_native_function(f);
                let text = group
                    .signatures(self.symint)
                    .into_iter()
                    .map(|cpp_sig| format!("TORCH_API {};\n", cpp_sig.decl()))
                    .collect();
                Ok(Some(text))
            }
            Target::NamespacedDefinition => {
                let group = CppSignatureGroup::from_native_function(f);
                let mut text = String::new();
                for cpp_sig in group.signatures(self.symint) {
                    let exprs = translate(&cpp_sig.bindings, &sig.bindings, &cpp_sig.name)?;
                    text.push_str(&format!(
                        "\n{} {{\nreturn {}({});\n}}\n",
                        cpp_sig.defn(),
                        sig.name,
                        exprs.join(", ")
                    ));
                }
                Ok(Some(text))
            }
            Target::AnonymousDefinition => {
                let Some(metadata) = self.backend_index.get_kernel(f) else {
                    return Ok(None);
                };
                let body = if metadata.structured {
                    self.structured_body(f, &sig, metadata)?
                } else {
                    self.dispatch_body(f, &sig, metadata)?
                };
                Ok(Some(format!(
                    "namespace {{\n\n{} {{\n{}{}\n{}\n{}}}\n\n}} // anonymous namespace\n",
                    sig.defn(),
                    self.profiler_prologue(),
                    self.device_check(f, &sig.name),
                    self.device_guard(f),
                    body
                )))
            }
            Target::Registration => {
                if f.manual_kernel_registration || self.settings.skip_dispatcher_op_registration {
                    return Ok(None);
                }
                Ok(Some(format!(
                    "m.impl(\"{}\",\nTORCH_FN({}));\n",
                    f.func.name, sig.name
                )))
            }
            Target::Definition | Target::Declaration => Err(CodegenError::UnsupportedTarget {
                target: self.target.to_string(),
                generator: "RegisterDispatchKey",
            }),
        }
    }

    pub fn wrapper_signature(&self, f: &NativeFunction) -> Signature {
        let key = display_name(self.backend_index.dispatch_key, self.backend);
        dispatcher::wrapper_signature(f, &key)
    }

    fn profiler_prologue(&self) -> &'static str {
        if self.settings.profiler {
            PROFILER_PROLOGUE
        } else {
            ""
        }
    }

    fn device_check(&self, f: &NativeFunction, method_name: &str) -> String {
        if !self.backend_index.device_guard {
            return NO_DEVICE_CHECK.to_string();
        }
        let args = f.func.arguments.out.iter().chain(f.func.arguments.flat_positional());
        gen_device_check(f.device_check, args, method_name)
    }

    fn device_guard(&self, f: &NativeFunction) -> String {
        if !(f.device_guard && self.backend_index.device_guard) {
            return NO_DEVICE_GUARD.to_string();
        }
        let has_tensor_options = f
            .func
            .arguments
            .non_out()
            .iter()
            .any(|item| matches!(item, ArgumentItem::TensorOptions(_)));
        if has_tensor_options {
            let guard = "const DeviceGuard device_guard(device_or_default(device));";
            return if self.backend_index.dispatch_key.is_cuda() {
                format!("globalContext().lazyInitCUDA();\n{guard}")
            } else {
                guard.to_string()
            };
        }
        let args = &f.func.arguments;
        let candidate = args
            .self_arg
            .iter()
            .chain(args.out.iter())
            .chain(args.flat_positional())
            .find(|arg| arg.ty.is_tensor_like());
        match candidate {
            Some(arg) => format!(
                "const OptionalDeviceGuard device_guard(device_of({}));",
                arg.name
            ),
            None => NO_DEVICE_GUARD.to_string(),
        }
    }

    /// Kernel call, with a runtime choice of the op-api kernel when the operator opted in.
    fn dispatch_body(
        &self,
        f: &NativeFunction,
        sig: &Signature,
        metadata: &BackendMetadata,
    ) -> Result<String> {
        let op_key = f.op_key();
        let mut impl_name = format!(
            "{}::{}::{}",
            metadata.cpp_namespace, self.settings.native_class, metadata.kernel
        );
        let wrap_name = self.state.wrap_names.get(&op_key);
        if let (true, Some(wrap_name)) = (self.op_plugin_enabled, wrap_name) {
            impl_name = format!("{}::{}", self.settings.op_plugin_namespace, wrap_name);
        }

        let kernel_sig =
            native::kernel_signature(&f.func, &metadata.kernel, metadata.supports_symint());
        let args = translate(&sig.bindings, &kernel_sig.bindings, &sig.name)?.join(", ");

        if self.state.op_api.contains(&op_key) && wrap_name.is_none() {
            crate::trace!("{op_key}: op-api branch");
            let op_api_name = format!(
                "{}::{}::{}",
                metadata.cpp_namespace, self.settings.op_api_class, metadata.kernel
            );
            let format_checks: String = tensor_like_bindings(sig)
                .into_iter()
                .map(|b| {
                    format!(" && at_npu::native::FormatHelper::IsOpInputBaseFormat({})", b.name)
                })
                .collect();
            return Ok(format!(
                "if (at_npu::native::env::CheckJitDisable(){format_checks}) {{\n    \
                 return {op_api_name}({args});\n\
                 }} else {{\n    \
                 return {impl_name}({args});\n\
                 }}\n"
            ));
        }
        Ok(format!("return {impl_name}({args});\n"))
    }

    /// `structured_<kernel>` instantiation running `meta()` then `impl()`.
    fn structured_body(
        &self,
        f: &NativeFunction,
        sig: &Signature,
        metadata: &BackendMetadata,
    ) -> Result<String> {
        let meta_args = translate(&sig.bindings, &structured::meta_arguments(f)?, &sig.name)?;
        let impl_args = translate(&sig.bindings, &structured::impl_arguments(f)?, &sig.name)?;
        let precompute = if f.precomputed.is_some() {
            "auto precompute = "
        } else {
            ""
        };
        let outs: Vec<&str> = f.func.arguments.out.iter().map(|a| a.name.as_str()).collect();
        let ret = match outs.as_slice() {
            [] => String::new(),
            [single] => format!("return {single};\n"),
            many => format!("return ::std::forward_as_tuple({});\n", many.join(", ")),
        };
        Ok(format!(
            "{}::structured_{} op;\n{}op.meta({});\nop.impl({});\n{}",
            metadata.cpp_namespace,
            metadata.kernel,
            precompute,
            meta_args.join(", "),
            impl_args.join(", "),
            ret
        ))
    }
}

/// Device consistency check over the tensor-like `args`.
pub fn gen_device_check<'b>(
    check: DeviceCheckType,
    args: impl IntoIterator<Item = &'b Argument>,
    method_name: &str,
) -> String {
    match check {
        DeviceCheckType::NoCheck => NO_DEVICE_CHECK.to_string(),
        DeviceCheckType::ExactSame => {
            let mut text = String::from(
                "  c10::optional<Device> common_device = c10::nullopt;\n\
                 (void)common_device; // Suppress unused variable warning\n",
            );
            for arg in args.into_iter().filter(|arg| arg.ty.is_tensor_like()) {
                text.push_str(&format!(
                    "\n  c10::impl::check_and_update_common_device(common_device, {}, \"{}\", \"{}\");",
                    arg.name, method_name, arg.name
                ));
            }
            text
        }
    }
}

fn tensor_like_bindings(sig: &Signature) -> Vec<&Binding> {
    sig.bindings.iter().filter(|b| b.is_tensor_like()).collect()
}
