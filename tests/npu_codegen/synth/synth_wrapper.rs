use anyhow::Result;
use npu_codegen::dest::register_dispatch_key::{gen_device_check, Target};
use npu_codegen::model::dispatch_key::DispatchKey;
use npu_codegen::model::native_function::DeviceCheckType;

use crate::common::{self, SynthFixture};

#[test]
fn plain_wrapper() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "relu")?)?;
    let expected = "namespace {\n\n\
at::Tensor wrapper_NPU__relu(const at::Tensor & self) {\n\
#ifndef BUILD_LIBTORCH\n\
torch_npu::profiler::NPURecordFunction guard;\n\
#endif\n\
\x20 c10::optional<Device> common_device = c10::nullopt;\n\
(void)common_device; // Suppress unused variable warning\n\
\n\
\x20 c10::impl::check_and_update_common_device(common_device, self, \"wrapper_NPU__relu\", \"self\");\n\
const OptionalDeviceGuard device_guard(device_of(self));\n\
return at_npu::native::NPUNativeFunctions::relu(self);\n\
}\n\
\n\
} // anonymous namespace\n";
    assert_eq!(text, expected);
    Ok(())
}

#[test]
fn profiler_prologue_can_be_disabled() -> Result<()> {
    let functions = common::host_functions()?;
    let mut fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    fixture.settings.profiler = false;
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "relu")?)?;
    assert!(!text.contains("NPURecordFunction"));
    Ok(())
}

#[test]
fn op_api_operators_branch_at_runtime() -> Result<()> {
    let functions = common::host_functions()?;
    let mut fixture = SynthFixture::npu(&[("add.Tensor", "add", false)]);
    fixture.state.op_api.insert("add.Tensor");
    let text =
        fixture.render(Target::AnonymousDefinition, common::find(&functions, "add.Tensor")?)?;
    let branch = "if (at_npu::native::env::CheckJitDisable() \
&& at_npu::native::FormatHelper::IsOpInputBaseFormat(self) \
&& at_npu::native::FormatHelper::IsOpInputBaseFormat(other)) {\n    \
return at_npu::native::NPUNativeOpApiFunctions::add(self, other, alpha);\n\
} else {\n    \
return at_npu::native::NPUNativeFunctions::add(self, other, alpha);\n\
}\n";
    assert!(text.contains(branch), "{text}");
    Ok(())
}

#[test]
fn op_plugin_kernels_replace_the_native_class() -> Result<()> {
    let functions = common::host_functions()?;
    let relu = common::find(&functions, "relu")?;
    let mut fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    fixture.state.op_api.insert("relu");
    fixture.state.wrap_names.insert("relu", "relu");

    // The cached wrap name also suppresses the op-api branch.
    let text = fixture.render(Target::AnonymousDefinition, relu)?;
    assert!(text.contains("return at_npu::native::NPUNativeFunctions::relu(self);\n"));
    assert!(!text.contains("CheckJitDisable"));

    fixture.op_plugin_enabled = true;
    let text = fixture.render(Target::AnonymousDefinition, relu)?;
    assert!(text.contains("return op_plugin::relu(self);\n"));
    Ok(())
}

#[test]
fn symint_kernels_and_disabled_checks() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("view", "view_symint", false)]);
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "view")?)?;
    assert!(text.contains("at::Tensor wrapper_NPU__view(const at::Tensor & self, c10::SymIntArrayRef size) {\n"));
    assert!(text.contains("  // No device check\n\n// DeviceGuard omitted\n"));
    assert!(text.contains("return at_npu::native::NPUNativeFunctions::view_symint(self, size);\n"));
    Ok(())
}

#[test]
fn non_symint_kernels_get_concrete_sizes() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("zeros", "zeros", false)]);
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "zeros")?)?;
    assert!(text.contains("const DeviceGuard device_guard(device_or_default(device));\n"));
    assert!(text.contains(
        "return at_npu::native::NPUNativeFunctions::zeros(C10_AS_INTARRAYREF_SLOW(size), dtype, layout, device, pin_memory);\n"
    ));
    assert!(!text.contains("check_and_update_common_device"));
    Ok(())
}

#[test]
fn cuda_keys_initialize_the_context() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::new(DispatchKey::Cuda, true, &[("zeros", "zeros", false)]);
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "zeros")?)?;
    assert!(text.contains(
        "globalContext().lazyInitCUDA();\nconst DeviceGuard device_guard(device_or_default(device));"
    ));
    assert!(text.contains("wrapper_CUDA__zeros"));
    Ok(())
}

#[test]
fn device_guard_prefers_self_then_out_then_positional() -> Result<()> {
    let cases = [
        ("pick(Tensor other, Tensor self) -> Tensor", "self"),
        ("pick.out(int dim, Tensor src, *, Tensor(a!) out) -> Tensor(a!)", "out"),
        ("pick.opt(int dim, Tensor? weight, Tensor input) -> Tensor", "weight"),
    ];
    for (schema, guarded) in cases {
        let f = common::native_function(schema, "")?;
        let op_key = f.op_key();
        let fixture = SynthFixture::npu(&[(op_key.as_str(), "pick", false)]);
        let text = fixture.render(Target::AnonymousDefinition, &f)?;
        let guard = format!("const OptionalDeviceGuard device_guard(device_of({guarded}));");
        assert!(text.contains(&guard), "{schema}: {text}");
    }

    let f = common::native_function("pick.int(int dim) -> Tensor", "")?;
    let fixture = SynthFixture::npu(&[("pick.int", "pick", false)]);
    assert!(fixture
        .render(Target::AnonymousDefinition, &f)?
        .contains("// DeviceGuard omitted"));

    let f = common::native_function("pick(Tensor self) -> Tensor", "device_guard: false\n")?;
    let fixture = SynthFixture::npu(&[("pick", "pick", false)]);
    assert!(fixture
        .render(Target::AnonymousDefinition, &f)?
        .contains("// DeviceGuard omitted"));
    Ok(())
}

#[test]
fn device_check_covers_out_then_positional_tensors() -> Result<()> {
    let f = common::native_function(
        "mix.out(Tensor self, int dim, Tensor[] others, *, Tensor(a!) out) -> Tensor(a!)",
        "",
    )?;
    let args = f.func.arguments.out.iter().chain(f.func.arguments.flat_positional());
    let text = gen_device_check(DeviceCheckType::ExactSame, args, "wrapper_NPU_out_mix_out");
    let checked: Vec<&str> = text
        .lines()
        .filter_map(|line| {
            line.trim()
                .strip_prefix("c10::impl::check_and_update_common_device(common_device, ")
        })
        .filter_map(|rest| rest.split(',').next())
        .collect();
    assert_eq!(checked, vec!["out", "self", "others"]);

    let none = gen_device_check(DeviceCheckType::NoCheck, f.func.arguments.out.iter(), "x");
    assert_eq!(none, "  // No device check\n");
    Ok(())
}

#[test]
fn structured_kernels_run_meta_then_impl() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("add.out", "add_out", true)]);
    let text = fixture.render(Target::AnonymousDefinition, common::find(&functions, "add.out")?)?;
    assert!(text.contains(
        "at::Tensor & wrapper_NPU_out_add_out(const at::Tensor & self, const at::Tensor & other, const at::Scalar & alpha, at::Tensor & out) {\n"
    ));
    assert!(text.contains(
        "at_npu::native::structured_add_out op;\nop.meta(self, other, alpha);\nop.impl(self, other, alpha, out);\nreturn out;\n"
    ));
    Ok(())
}

#[test]
fn structured_kernels_with_precompute_and_several_outs() -> Result<()> {
    let f = common::native_function(
        "pool.out(Tensor self, int[2] kernel_size, *, Tensor(a!) out, Tensor(b!) indices) -> (Tensor(a!), Tensor(b!))",
        "structured: true\nprecomputed:\n  - kernel_size -> int kH, int kW\n",
    )?;
    let fixture = SynthFixture::npu(&[("pool.out", "pool_out", true)]);
    let text = fixture.render(Target::AnonymousDefinition, &f)?;
    assert!(text.contains("auto precompute = op.meta(self, kernel_size);\n"));
    assert!(text.contains("op.impl(self, precompute.kH, precompute.kW, out, indices);\n"));
    assert!(text.contains("return ::std::forward_as_tuple(out, indices);\n"));
    Ok(())
}
