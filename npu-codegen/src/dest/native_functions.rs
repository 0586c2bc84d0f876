//! Kernel declarations for the backend's native function classes.
use std::collections::HashSet;

use crate::api::native;
use crate::api::structured;
use crate::backend::BackendIndex;
use crate::error::Result;
use crate::model::native_function::NativeFunction;

/// `static` member declarations of every unstructured kernel in `indices`.
///
/// `keep` narrows the operators (the op-api class only declares opted-in ones).
/// A kernel registered under several keys is declared once.
pub fn kernel_declarations(
    functions: &[NativeFunction],
    indices: &[&BackendIndex],
    keep: impl Fn(&NativeFunction) -> bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut decls = Vec::new();
    for f in functions.iter().filter(|f| keep(f)) {
        for index in indices {
            let Some(metadata) = index.get_kernel(f) else {
                continue;
            };
            if metadata.structured {
                continue;
            }
            let sig =
                native::kernel_signature(&f.func, &metadata.kernel, metadata.supports_symint());
            let decl = format!("static {};", sig.decl());
            if seen.insert(decl.clone()) {
                decls.push(decl);
            }
        }
    }
    decls
}

/// Struct declarations for structured kernels.
pub fn structured_declarations(
    functions: &[NativeFunction],
    indices: &[&BackendIndex],
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut decls = Vec::new();
    for f in functions {
        for index in indices {
            let Some(metadata) = index.get_kernel(f) else {
                continue;
            };
            if !metadata.structured || !seen.insert(metadata.kernel.clone()) {
                continue;
            }
            let impl_args: Vec<String> = structured::impl_arguments(f)?
                .iter()
                .map(|b| b.defn())
                .collect();
            decls.push(format!(
                "struct TORCH_API structured_{} : public at::meta::structured_{} {{\nvoid impl({});\n}};",
                metadata.kernel,
                structured::meta_name(f, functions),
                impl_args.join(", ")
            ));
        }
    }
    Ok(decls)
}

/// A `struct TORCH_API <name> { ... };` block of static members.
pub fn render_class(class_name: &str, decls: &[String]) -> String {
    let mut text = format!("struct TORCH_API {class_name} {{\n\n");
    for decl in decls {
        text.push_str(decl);
        text.push('\n');
    }
    text.push_str("\n};\n");
    text
}
