//! Dispatch keys and their backend-facing display names.
//!
//! The host dispatcher knows the accelerator as `PrivateUse1`; generated
//! identifiers use the backend name instead (`wrapper_NPU_...`).
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{CodegenError, Result};

pub const PRIVATE_USE_NAME: &str = "PrivateUse1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    Cpu,
    Cuda,
    Meta,
    PrivateUse1,
    AutogradCpu,
    AutogradCuda,
    AutogradPrivateUse1,
    QuantizedPrivateUse1,
    SparsePrivateUse1,
    NestedTensorPrivateUse1,
    Autograd,
    CompositeImplicitAutograd,
    CompositeExplicitAutograd,
    CompositeExplicitAutogradNonFunctional,
}

const VARIANT_NAMES: &[(DispatchKey, &str)] = &[
    (DispatchKey::Cpu, "CPU"),
    (DispatchKey::Cuda, "CUDA"),
    (DispatchKey::Meta, "Meta"),
    (DispatchKey::PrivateUse1, "PrivateUse1"),
    (DispatchKey::AutogradCpu, "AutogradCPU"),
    (DispatchKey::AutogradCuda, "AutogradCUDA"),
    (DispatchKey::AutogradPrivateUse1, "AutogradPrivateUse1"),
    (DispatchKey::QuantizedPrivateUse1, "QuantizedPrivateUse1"),
    (DispatchKey::SparsePrivateUse1, "SparsePrivateUse1"),
    (DispatchKey::NestedTensorPrivateUse1, "NestedTensorPrivateUse1"),
    (DispatchKey::Autograd, "Autograd"),
    (DispatchKey::CompositeImplicitAutograd, "CompositeImplicitAutograd"),
    (DispatchKey::CompositeExplicitAutograd, "CompositeExplicitAutograd"),
    (
        DispatchKey::CompositeExplicitAutogradNonFunctional,
        "CompositeExplicitAutogradNonFunctional",
    ),
];

static BY_VARIANT_NAME: Lazy<HashMap<&'static str, DispatchKey>> =
    Lazy::new(|| VARIANT_NAMES.iter().map(|(key, name)| (*name, *key)).collect());

impl DispatchKey {
    /// Name of the enum variant on the host side (`AutogradPrivateUse1`).
    pub fn variant_name(self) -> &'static str {
        VARIANT_NAMES
            .iter()
            .find(|(key, _)| *key == self)
            .map(|(_, name)| *name)
            .unwrap_or(PRIVATE_USE_NAME)
    }

    pub fn from_variant_name(name: &str) -> Option<Self> {
        BY_VARIANT_NAME.get(name).copied()
    }

    pub fn is_cuda(self) -> bool {
        matches!(self, DispatchKey::Cuda | DispatchKey::AutogradCuda)
    }
}

/// Display name with `PrivateUse1` replaced by `backend` (`AutogradNPU`).
pub fn display_name(key: DispatchKey, backend: &str) -> String {
    key.variant_name().replace(PRIVATE_USE_NAME, backend)
}

/// Inverse of [`display_name`]; host variant names are accepted as well.
pub fn parse_display_name(name: &str, backend: &str) -> Result<DispatchKey> {
    if let Some(key) = DispatchKey::from_variant_name(name) {
        return Ok(key);
    }
    if !backend.is_empty() {
        let host_name = name.replace(backend, PRIVATE_USE_NAME);
        if let Some(key) = DispatchKey::from_variant_name(&host_name) {
            return Ok(key);
        }
    }
    Err(CodegenError::UnknownDispatchKey(name.to_string()))
}
