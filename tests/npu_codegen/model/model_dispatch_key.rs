use anyhow::Result;
use npu_codegen::model::dispatch_key::{display_name, parse_display_name, DispatchKey};
use npu_codegen::CodegenError;

#[test]
fn private_use_renders_as_backend() {
    assert_eq!(display_name(DispatchKey::PrivateUse1, "NPU"), "NPU");
    assert_eq!(display_name(DispatchKey::AutogradPrivateUse1, "NPU"), "AutogradNPU");
    assert_eq!(display_name(DispatchKey::Cpu, "NPU"), "CPU");
    assert_eq!(DispatchKey::AutogradPrivateUse1.variant_name(), "AutogradPrivateUse1");
}

#[test]
fn display_names_parse_back() -> Result<()> {
    for key in [
        DispatchKey::PrivateUse1,
        DispatchKey::AutogradPrivateUse1,
        DispatchKey::QuantizedPrivateUse1,
        DispatchKey::CompositeExplicitAutograd,
    ] {
        assert_eq!(parse_display_name(&display_name(key, "NPU"), "NPU")?, key);
    }
    assert_eq!(parse_display_name("PrivateUse1", "NPU")?, DispatchKey::PrivateUse1);
    Ok(())
}

#[test]
fn unknown_key_is_reported() {
    match parse_display_name("AutogradXPU", "NPU") {
        Err(CodegenError::UnknownDispatchKey(name)) => assert_eq!(name, "AutogradXPU"),
        other => panic!("expected UnknownDispatchKey, got {other:?}"),
    }
}

#[test]
fn cuda_keys() {
    assert!(DispatchKey::Cuda.is_cuda());
    assert!(DispatchKey::AutogradCuda.is_cuda());
    assert!(!DispatchKey::PrivateUse1.is_cuda());
}
