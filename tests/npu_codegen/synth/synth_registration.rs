use anyhow::Result;
use npu_codegen::dest::register_dispatch_key::Target;
use npu_codegen::model::dispatch_key::DispatchKey;
use npu_codegen::{CodegenError, OperatorSelector};

use crate::common::{self, SynthFixture};

const ALL_TARGETS: [Target; 6] = [
    Target::Definition,
    Target::Declaration,
    Target::Registration,
    Target::AnonymousDefinition,
    Target::NamespacedDefinition,
    Target::NamespacedDeclaration,
];

#[test]
fn registration_line() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("add.out", "add_out", true), ("relu", "relu", false)]);
    assert_eq!(
        fixture.render(Target::Registration, common::find(&functions, "add.out")?)?,
        "m.impl(\"add.out\",\nTORCH_FN(wrapper_NPU_out_add_out));\n"
    );
    assert_eq!(
        fixture.render(Target::Registration, common::find(&functions, "relu")?)?,
        "m.impl(\"relu\",\nTORCH_FN(wrapper_NPU__relu));\n"
    );
    Ok(())
}

#[test]
fn autograd_registration_uses_the_autograd_wrapper() -> Result<()> {
    let dropout = common::native_function("npu_dropout(Tensor self, float p) -> (Tensor, Tensor)", "")?;
    let fixture = SynthFixture::new(
        DispatchKey::AutogradPrivateUse1,
        false,
        &[("npu_dropout", "npu_dropout", false)],
    );
    assert_eq!(
        fixture.render(Target::Registration, &dropout)?,
        "m.impl(\"npu_dropout\",\nTORCH_FN(wrapper_AutogradNPU__npu_dropout));\n"
    );
    Ok(())
}

#[test]
fn operators_without_a_kernel_produce_nothing() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    let abs = common::find(&functions, "abs")?;
    for target in ALL_TARGETS {
        assert!(fixture.generator(target).generate(abs)?.is_none(), "{target}");
    }
    Ok(())
}

#[test]
fn manual_registration_produces_nothing() -> Result<()> {
    let f = common::native_function("npu_manual(Tensor self) -> Tensor", "manual_kernel_registration: true\n")?;
    let fixture = SynthFixture::npu(&[("npu_manual", "npu_manual", false)]);
    for target in ALL_TARGETS {
        assert!(fixture.generator(target).generate(&f)?.is_none(), "{target}");
    }
    Ok(())
}

#[test]
fn member_targets_are_unsupported() -> Result<()> {
    let functions = common::host_functions()?;
    let fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    let relu = common::find(&functions, "relu")?;
    for target in [Target::Definition, Target::Declaration] {
        match fixture.generator(target).generate(relu) {
            Err(CodegenError::UnsupportedTarget { target: name, .. }) => {
                assert_eq!(name, target.to_string());
            }
            other => panic!("{target}: expected UnsupportedTarget, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn skipping_dispatcher_registration_keeps_wrappers() -> Result<()> {
    let functions = common::host_functions()?;
    let relu = common::find(&functions, "relu")?;
    let mut fixture = SynthFixture::npu(&[("relu", "relu", false)]);
    fixture.settings.skip_dispatcher_op_registration = true;
    assert!(fixture.generator(Target::Registration).generate(relu)?.is_none());
    assert!(fixture.generator(Target::AnonymousDefinition).generate(relu)?.is_some());
    Ok(())
}

#[test]
fn selection_only_narrows_registrations() -> Result<()> {
    let functions = common::host_functions()?;
    let mut fixture = SynthFixture::npu(&[("relu", "relu", false), ("add.Tensor", "add", false)]);
    fixture.selector = OperatorSelector::from_list("relu")?;
    let add = common::find(&functions, "add.Tensor")?;
    assert!(fixture.generator(Target::Registration).generate(add)?.is_none());
    assert!(fixture.generator(Target::AnonymousDefinition).generate(add)?.is_some());
    assert!(fixture
        .generator(Target::Registration)
        .generate(common::find(&functions, "relu")?)?
        .is_some());
    Ok(())
}

#[test]
fn target_names() {
    assert_eq!(Target::AnonymousDefinition.to_string(), "ANONYMOUS_DEFINITION");
    assert_eq!(Target::NamespacedDeclaration.to_string(), "NAMESPACED_DECLARATION");
}
