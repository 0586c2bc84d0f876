//! Generator settings read from `settings.json`.
//!
//! ```json
//! { "codegen": { "backend": "NPU", "cpp_namespace": "at_npu::native" } }
//! ```
//! Every key is optional; a missing file yields the defaults.
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CodegenError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display name of the backend; also replaces `PrivateUse1` in dispatch key names.
    pub backend: String,
    pub cpp_namespace: String,
    pub native_class: String,
    pub op_api_class: String,
    /// Directory, relative to the source root, whose presence enables op-plugin routing.
    pub op_plugin_dir: String,
    pub op_plugin_namespace: String,
    pub skip_dispatcher_op_registration: bool,
    /// Emit the profiler record prologue in every wrapper.
    pub profiler: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: "NPU".to_string(),
            cpp_namespace: "at_npu::native".to_string(),
            native_class: "NPUNativeFunctions".to_string(),
            op_api_class: "NPUNativeOpApiFunctions".to_string(),
            op_plugin_dir: "third_party/op-plugin/op_plugin".to_string(),
            op_plugin_namespace: "op_plugin".to_string(),
            skip_dispatcher_op_registration: false,
            profiler: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    codegen: Option<Settings>,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(path).map_err(|err| CodegenError::io(path, err))?;
        let file: SettingsFile =
            serde_json::from_str(&contents).map_err(|source| CodegenError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(file.codegen.unwrap_or_default())
    }

    /// Whether the op-plugin checkout is present under `source_root`.
    pub fn op_plugin_enabled(&self, source_root: &Path) -> bool {
        source_root.join(&self.op_plugin_dir).exists()
    }
}
