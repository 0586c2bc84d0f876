use anyhow::{anyhow, Result};
use npu_codegen::yaml::merge::CUSTOM_YAML_NAME;
use npu_codegen::{
    generated_files, run, CodegenError, GenOptions, GenOutput, OperatorSelector, Settings,
};
use std::path::Path;

use crate::common;

const NPU_YAML_PATH: &str = "torch_npu/csrc/aten/npu_native_functions.yaml";
const PLUGIN_YAML_PATH: &str = "third_party/op-plugin/op_plugin/config/op_plugin_functions.yaml";

fn setup(root: &Path, npu_yaml: &str) -> Result<GenOptions> {
    let native_functions =
        common::write_file(root, "native_functions.yaml", common::NATIVE_FUNCTIONS)?;
    let npu_yaml = common::write_file(root, NPU_YAML_PATH, npu_yaml)?;
    Ok(GenOptions {
        source_root: root.to_path_buf(),
        npu_yaml,
        native_functions,
        op_plugin_yaml: None,
        output_dir: root.join("out"),
        settings: Settings::default(),
        selector: OperatorSelector::All,
        dry_run: false,
    })
}

fn file<'a>(output: &'a GenOutput, name: &str) -> Result<&'a str> {
    output.file(name).ok_or_else(|| anyhow!("{name} was not generated"))
}

#[test]
fn generates_every_file_without_op_plugin() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let opts = setup(dir.path(), common::NPU_YAML)?;
    let output = run(&opts)?;

    assert!(!output.op_plugin_enabled);
    assert!(output.conflicts.is_empty());
    assert_eq!(output.kernel_count, 7);
    for name in generated_files("NPU") {
        assert!(opts.output_dir.join(&name).exists(), "{name}");
    }
    assert!(!dir.path().join("torch_npu/csrc/aten").join(CUSTOM_YAML_NAME).exists());

    let register = file(&output, "RegisterNPU.cpp")?;
    assert!(register.starts_with("// @generated"));
    assert!(!register.contains("op_plugin/OpInterface.h"));
    assert!(register.contains("TORCH_LIBRARY_IMPL(aten, PrivateUse1, m) {\nm.impl(\"abs\",\nTORCH_FN(wrapper_NPU__abs));\n"));
    assert!(register.contains("m.impl(\"add.out\",\nTORCH_FN(wrapper_NPU_out_add_out));\n"));
    assert!(register.contains("TORCH_LIBRARY_IMPL(npu, PrivateUse1, m) {\nm.impl(\"npu_format_cast\",\nTORCH_FN(wrapper_NPU__npu_format_cast));\n"));
    assert!(register.contains("TORCH_LIBRARY_IMPL(npu, AutogradPrivateUse1, m) {\nm.impl(\"npu_dropout\",\nTORCH_FN(wrapper_AutogradNPU__npu_dropout));\n"));
    assert!(!register.contains("TORCH_LIBRARY_IMPL(aten, AutogradPrivateUse1"));
    assert!(register.contains("return at_npu::native::NPUNativeOpApiFunctions::add(self, other, alpha);"));
    assert!(register.contains("at_npu::native::structured_add_out op;"));
    assert!(register.contains("namespace npu {\n"));
    assert!(register.trim_end().ends_with("} // namespace at"));

    let functions = file(&output, "NPUFunctions.h")?;
    assert!(functions.contains("namespace at {\nnamespace npu {\n"));
    assert!(functions.contains("TORCH_API at::Tensor relu(const at::Tensor & self);\n"));
    assert!(functions.contains("TORCH_API at::Tensor view_symint(const at::Tensor & self, c10::SymIntArrayRef size);\n"));
    assert!(!functions.contains("npu_dropout"));

    let native = file(&output, "NPUNativeFunctions.h")?;
    assert!(native.contains("namespace at_npu {\nnamespace native {\n"));
    assert!(native.contains("struct TORCH_API NPUNativeFunctions {\n"));
    assert!(native.contains("struct TORCH_API NPUNativeOpApiFunctions {\n"));
    assert!(native.contains("struct TORCH_API structured_add_out : public at::meta::structured_add_Tensor {\n"));
    assert!(native.contains("} // namespace native\n} // namespace at_npu\n"));

    let schema = file(&output, "CustomRegisterSchema.cpp")?;
    assert!(schema.contains(
        "TORCH_LIBRARY(npu, m) {\n  m.def(\"npu_format_cast(Tensor self, int acl_format) -> Tensor\");\n  m.def(\"npu_dropout(Tensor self, float p) -> (Tensor, Tensor)\");\n}\n"
    ));
    Ok(())
}

#[test]
fn op_plugin_routes_cached_operators() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let opts = setup(dir.path(), common::NPU_YAML)?;
    common::write_file(dir.path(), PLUGIN_YAML_PATH, common::OP_PLUGIN_YAML)?;
    let output = run(&opts)?;

    assert!(output.op_plugin_enabled);
    assert!(output.conflicts.is_empty());
    assert_eq!(output.kernel_count, 8);
    assert!(dir.path().join("torch_npu/csrc/aten").join(CUSTOM_YAML_NAME).exists());

    let register = file(&output, "RegisterNPU.cpp")?;
    assert!(register.contains("#include \"op_plugin/OpInterface.h\"\n"));
    assert!(register.contains("return op_plugin::relu(self);\n"));
    assert!(!register.contains("NPUNativeOpApiFunctions::relu"));
    assert!(register.contains("return op_plugin::npu_fast_gelu(self);\n"));
    assert!(register.contains("m.impl(\"npu_fast_gelu\",\nTORCH_FN(wrapper_NPU__npu_fast_gelu));\n"));
    assert!(register.contains("return at_npu::native::NPUNativeOpApiFunctions::add(self, other, alpha);"));

    let native = file(&output, "NPUNativeFunctions.h")?;
    let op_api_class = native
        .split("struct TORCH_API NPUNativeOpApiFunctions {")
        .nth(1)
        .and_then(|rest| rest.split("};").next())
        .ok_or_else(|| anyhow!("op-api class missing"))?;
    assert!(op_api_class.contains(" add("));
    assert!(!op_api_class.contains(" relu("));

    let schema = file(&output, "CustomRegisterSchema.cpp")?;
    assert!(schema.contains("m.def(\"npu_fast_gelu(Tensor self) -> Tensor\");"));
    Ok(())
}

#[test]
fn dry_run_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = setup(dir.path(), common::NPU_YAML)?;
    opts.dry_run = true;
    common::write_file(dir.path(), PLUGIN_YAML_PATH, common::OP_PLUGIN_YAML)?;
    let output = run(&opts)?;

    assert!(output.op_plugin_enabled);
    assert_eq!(output.files.len(), 4);
    assert!(file(&output, "RegisterNPU.cpp")?.contains("op_plugin::relu(self)"));
    assert!(!opts.output_dir.exists());
    assert!(!dir.path().join("torch_npu/csrc/aten").join(CUSTOM_YAML_NAME).exists());
    Ok(())
}

#[test]
fn dry_run_matches_a_real_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = setup(dir.path(), "supported:\n  - relu\n  - func: abs\n")?;
    common::write_file(
        dir.path(),
        PLUGIN_YAML_PATH,
        "custom:\n  - func: npu_fast_gelu(Tensor self) -> Tensor\n",
    )?;

    opts.dry_run = true;
    let dry = run(&opts)?;
    opts.dry_run = false;
    let real = run(&opts)?;

    // Bare `- relu` has no `:` and is dropped when the merged schema is loaded.
    assert_eq!(real.kernel_count, 2);
    assert_eq!(dry.kernel_count, real.kernel_count);
    assert!(!file(&real, "RegisterNPU.cpp")?.contains("m.impl(\"relu\""));
    for (dry_file, real_file) in dry.files.iter().zip(&real.files) {
        assert_eq!(dry_file.name, real_file.name);
        assert_eq!(dry_file.contents, real_file.contents, "{}", real_file.name);
    }
    Ok(())
}

#[test]
fn explicit_op_plugin_schema_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = setup(dir.path(), common::NPU_YAML)?;
    std::fs::create_dir_all(dir.path().join("third_party/op-plugin/op_plugin"))?;
    opts.op_plugin_yaml = Some(common::write_file(
        dir.path(),
        "elsewhere/plugin.yaml",
        "official:\n  - func: abs(Tensor self) -> Tensor\n",
    )?);
    let output = run(&opts)?;
    let register = file(&output, "RegisterNPU.cpp")?;
    assert!(register.contains("return op_plugin::abs(self);\n"));
    assert!(register.contains("return at_npu::native::NPUNativeFunctions::relu(self);\n"));
    Ok(())
}

#[test]
fn selection_limits_registrations() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = setup(dir.path(), common::NPU_YAML)?;
    opts.selector = OperatorSelector::from_list("relu,npu_dropout")?;
    let output = run(&opts)?;
    let register = file(&output, "RegisterNPU.cpp")?;
    assert!(register.contains("m.impl(\"relu\","));
    assert!(register.contains("m.impl(\"npu_dropout\","));
    assert!(!register.contains("m.impl(\"abs\","));
    assert!(!register.contains("TORCH_LIBRARY_IMPL(npu, PrivateUse1, m)"));
    assert!(register.contains("wrapper_NPU__abs(const at::Tensor & self) {"));
    Ok(())
}

#[test]
fn unknown_operator_aborts_before_writing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let opts = setup(dir.path(), "backend: NPU\nsupported:\n  - func: relu\n  - func: frobnicate\n")?;
    match run(&opts) {
        Err(CodegenError::UnknownOperator(name)) => assert_eq!(name, "frobnicate"),
        other => panic!("expected UnknownOperator, got {other:?}"),
    }
    assert!(!opts.output_dir.exists());
    Ok(())
}

#[test]
fn empty_backend_schema_generates_empty_shells() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let opts = setup(dir.path(), "# nothing yet\n")?;
    let output = run(&opts)?;
    assert_eq!(output.kernel_count, 0);
    let register = file(&output, "RegisterNPU.cpp")?;
    assert!(!register.contains("TORCH_LIBRARY_IMPL"));
    assert!(file(&output, "CustomRegisterSchema.cpp")?.contains("TORCH_LIBRARY(npu, m) {\n}\n"));
    Ok(())
}
