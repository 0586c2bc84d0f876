//! Generator pipeline: merge, resolve, index, synthesize, write.
//!
//! Every output file is rendered in memory first; nothing is written unless
//! every operator rendered successfully.
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{
    parse_backend_yaml, parse_native_functions, BackendIndex, BackendYaml, CUSTOM_NAMESPACE,
};
use crate::dest::native_functions::{kernel_declarations, render_class, structured_declarations};
use crate::dest::register_dispatch_key::{RegisterDispatchKey, Target};
use crate::error::{CodegenError, Result};
use crate::model::dispatch_key::display_name;
use crate::model::native_function::NativeFunction;
use crate::resolver::resolve_function_schemas;
use crate::selector::OperatorSelector;
use crate::settings::Settings;
use crate::state::{CodegenState, NameConflict};
use crate::yaml::loader::{load_yaml_with_lines, parse_npu_str, parse_npu_yaml};
use crate::yaml::merge::{gen_custom_yaml_path, merge_custom_yaml, merge_files, render_merged};

const GENERATED_BANNER: &str = "// @generated by npu-codegen. Do not edit.\n";

/// Operator schema of the op-plugin checkout, relative to its directory.
pub const OP_PLUGIN_YAML: &str = "config/op_plugin_functions.yaml";

pub const CUSTOM_SCHEMA_FILE: &str = "CustomRegisterSchema.cpp";

/// Names of the files one run produces for `backend`.
pub fn generated_files(backend: &str) -> Vec<String> {
    vec![
        format!("Register{backend}.cpp"),
        format!("{backend}Functions.h"),
        format!("{backend}NativeFunctions.h"),
        CUSTOM_SCHEMA_FILE.to_string(),
    ]
}

#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Root the op-plugin directory is probed under.
    pub source_root: PathBuf,
    /// First-party backend schema.
    pub npu_yaml: PathBuf,
    /// Host framework operator list.
    pub native_functions: PathBuf,
    /// Op-plugin schema; defaults to [`OP_PLUGIN_YAML`] inside the op-plugin directory.
    pub op_plugin_yaml: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub settings: Settings,
    pub selector: OperatorSelector,
    /// Render everything but write nothing, not even the merged schema.
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

#[derive(Debug)]
pub struct GenOutput {
    pub files: Vec<GeneratedFile>,
    pub conflicts: Vec<NameConflict>,
    pub op_plugin_enabled: bool,
    /// Operators bound to the backend dispatch key.
    pub kernel_count: usize,
}

impl GenOutput {
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.contents.as_str())
    }
}

/// Run the whole generator.
pub fn run(opts: &GenOptions) -> Result<GenOutput> {
    let settings = &opts.settings;
    let mut state = CodegenState::default();
    let op_plugin_enabled = settings.op_plugin_enabled(&opts.source_root);

    let mut conflicts = Vec::new();
    let (backend_doc, backend_source) = if op_plugin_enabled {
        let plugin_yaml = opts.op_plugin_yaml.clone().unwrap_or_else(|| {
            opts.source_root
                .join(&settings.op_plugin_dir)
                .join(OP_PLUGIN_YAML)
        });
        crate::trace!("op-plugin enabled, schema {}", plugin_yaml.display());
        let merged_path = gen_custom_yaml_path(&opts.npu_yaml);
        // Both modes load the merged text through the same lenient loader.
        let merged_text = if opts.dry_run {
            render_merged(&merge_files(&opts.npu_yaml, &plugin_yaml)?, &merged_path)?
        } else {
            merge_custom_yaml(&opts.npu_yaml, &plugin_yaml)?
        };
        let doc = parse_npu_str(&merged_text, &merged_path)?;

        let plugin_source = plugin_yaml.display().to_string();
        let (_, found) =
            resolve_function_schemas(parse_npu_yaml(&plugin_yaml)?, &plugin_source, &mut state)?;
        conflicts = found;
        (doc, merged_path.display().to_string())
    } else {
        (parse_npu_yaml(&opts.npu_yaml)?, opts.npu_yaml.display().to_string())
    };

    let native_source = opts.native_functions.display().to_string();
    let host =
        parse_native_functions(&load_yaml_with_lines(&opts.native_functions)?, &native_source)?;
    let backend = parse_backend_yaml(backend_doc, host, settings, &mut state, &backend_source)?;
    crate::trace!(
        "{} kernels for {}, {} op-api operators, {} plugin wrappers",
        backend.backend_index.len(),
        backend.backend,
        state.op_api.len(),
        state.wrap_names.len()
    );

    let renderer = Renderer {
        opts,
        backend: &backend,
        state: &state,
        op_plugin_enabled,
    };
    let names = generated_files(&backend.backend);
    let contents = [
        renderer.register_dispatch_key()?,
        renderer.functions_header()?,
        renderer.native_functions_header()?,
        renderer.custom_register_schema(),
    ];
    let files: Vec<GeneratedFile> = names
        .into_iter()
        .zip(contents)
        .map(|(name, contents)| GeneratedFile { name, contents })
        .collect();

    if !opts.dry_run {
        write_files(&opts.output_dir, &files)?;
    }

    Ok(GenOutput {
        files,
        conflicts,
        op_plugin_enabled,
        kernel_count: backend.backend_index.len(),
    })
}

fn write_files(output_dir: &Path, files: &[GeneratedFile]) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|err| CodegenError::io(output_dir, err))?;
    for file in files {
        let path = output_dir.join(&file.name);
        fs::write(&path, &file.contents).map_err(|err| CodegenError::io(&path, err))?;
        crate::trace!("wrote {}", path.display());
    }
    Ok(())
}

struct Renderer<'a> {
    opts: &'a GenOptions,
    backend: &'a BackendYaml,
    state: &'a CodegenState,
    op_plugin_enabled: bool,
}

impl<'a> Renderer<'a> {
    fn indices(&self) -> Vec<&'a BackendIndex> {
        let mut indices = vec![&self.backend.backend_index];
        indices.extend(self.backend.autograd_index.iter());
        indices
    }

    fn generator(&self, index: &'a BackendIndex, target: Target) -> RegisterDispatchKey<'a> {
        RegisterDispatchKey {
            backend_index: index,
            target,
            selector: &self.opts.selector,
            state: self.state,
            settings: &self.opts.settings,
            backend: &self.backend.backend,
            op_plugin_enabled: self.op_plugin_enabled,
            symint: true,
        }
    }

    fn collect<'f>(
        &self,
        generator: &RegisterDispatchKey<'_>,
        functions: impl IntoIterator<Item = &'f NativeFunction>,
    ) -> Result<String> {
        let mut text = String::new();
        for f in functions {
            if let Some(piece) = generator.generate(f)? {
                text.push_str(&piece);
                text.push('\n');
            }
        }
        Ok(text)
    }

    /// Library namespaces in order of first appearance.
    fn namespaces(&self) -> Vec<&'a str> {
        let mut namespaces: Vec<&str> = Vec::new();
        for f in &self.backend.native_functions {
            if !namespaces.contains(&f.namespace.as_str()) {
                namespaces.push(&f.namespace);
            }
        }
        namespaces
    }

    fn register_dispatch_key(&self) -> Result<String> {
        let functions = &self.backend.native_functions;
        let mut out = String::from(GENERATED_BANNER);
        out.push_str(REGISTER_INCLUDES);
        if self.op_plugin_enabled {
            out.push_str("#include \"op_plugin/OpInterface.h\"\n");
        }
        out.push_str(&format!(
            "#include \"torch_npu/csrc/aten/{}Functions.h\"\n#include \"torch_npu/csrc/aten/{}NativeFunctions.h\"\n\n",
            self.backend.backend, self.backend.backend
        ));
        out.push_str("namespace at {\n\n");

        for index in self.indices() {
            let anonymous =
                self.collect(&self.generator(index, Target::AnonymousDefinition), functions)?;
            out.push_str(&anonymous);

            let registration = self.generator(index, Target::Registration);
            for namespace in self.namespaces() {
                let members = functions.iter().filter(|f| f.namespace == namespace);
                let body = self.collect(&registration, members)?;
                if body.is_empty() {
                    continue;
                }
                out.push_str(&format!(
                    "TORCH_LIBRARY_IMPL({}, {}, m) {{\n{}}}\n\n",
                    namespace,
                    index.dispatch_key.variant_name(),
                    body
                ));
            }
        }

        let definitions = self.collect(
            &self.generator(&self.backend.backend_index, Target::NamespacedDefinition),
            functions,
        )?;
        out.push_str(&format!(
            "namespace {} {{\n{}\n}} // namespace {}\n\n",
            self.dispatch_namespace(),
            definitions,
            self.dispatch_namespace()
        ));
        out.push_str("} // namespace at\n");
        Ok(out)
    }

    /// Namespace of the public per-backend functions (`at::npu`).
    fn dispatch_namespace(&self) -> String {
        display_name(self.backend.backend_index.dispatch_key, &self.backend.backend).to_lowercase()
    }

    fn functions_header(&self) -> Result<String> {
        let declarations = self.collect(
            &self.generator(&self.backend.backend_index, Target::NamespacedDeclaration),
            &self.backend.native_functions,
        )?;
        let namespace = self.dispatch_namespace();
        Ok(format!(
            "{GENERATED_BANNER}#pragma once\n\n#include <ATen/Tensor.h>\n#include <ATen/ATen.h>\n\n\
             namespace at {{\nnamespace {namespace} {{\n\n{declarations}\n}} // namespace {namespace}\n}} // namespace at\n"
        ))
    }

    fn native_functions_header(&self) -> Result<String> {
        let settings = &self.opts.settings;
        let functions = &self.backend.native_functions;
        let indices = self.indices();

        let mut body = render_class(
            &settings.native_class,
            &kernel_declarations(functions, &indices, |_| true),
        );
        let op_api = kernel_declarations(functions, &indices, |f| {
            let op_key = f.op_key();
            self.state.op_api.contains(&op_key) && !self.state.wrap_names.contains(&op_key)
        });
        if !op_api.is_empty() {
            body.push('\n');
            body.push_str(&render_class(&settings.op_api_class, &op_api));
        }
        for decl in structured_declarations(functions, &indices)? {
            body.push('\n');
            body.push_str(&decl);
            body.push('\n');
        }

        let (open, close) = namespace_fences(&self.backend.cpp_namespace);
        Ok(format!(
            "{GENERATED_BANNER}#pragma once\n\n#include <ATen/Tensor.h>\n#include <ATen/ATen.h>\n\n{open}\n{body}\n{close}"
        ))
    }

    fn custom_register_schema(&self) -> String {
        let mut out = String::from(GENERATED_BANNER);
        out.push_str("#include <torch/library.h>\n\n");
        let defs: String = self
            .backend
            .custom_functions
            .iter()
            .map(|f| format!("  m.def(\"{}\");\n", f.func.to_string().replace('"', "\\\"")))
            .collect();
        out.push_str(&format!("TORCH_LIBRARY({CUSTOM_NAMESPACE}, m) {{\n{defs}}}\n"));
        out
    }
}

const REGISTER_INCLUDES: &str = "#include <ATen/Tensor.h>\n\
#include <ATen/core/op_registration/adaption.h>\n\
#include <c10/core/DeviceGuard.h>\n\
#include <c10/util/Optional.h>\n\
#include <torch/library.h>\n\n\
#include \"torch_npu/csrc/core/npu/NPUFormat.h\"\n\
#include \"torch_npu/csrc/framework/FormatHelper.h\"\n\
#include \"torch_npu/csrc/framework/utils/ForceJitCompileList.h\"\n\
#include \"torch_npu/csrc/profiler/utils.h\"\n";

/// `namespace a {\nnamespace b {` and the matching closers for `a::b`.
fn namespace_fences(cpp_namespace: &str) -> (String, String) {
    let parts: Vec<&str> = cpp_namespace.split("::").filter(|p| !p.is_empty()).collect();
    let open = parts.iter().map(|p| format!("namespace {p} {{\n")).collect();
    let close = parts
        .iter()
        .rev()
        .map(|p| format!("}} // namespace {p}\n"))
        .collect();
    (open, close)
}
