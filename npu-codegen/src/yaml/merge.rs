//! Merge the first-party backend schema with the op-plugin schema.
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{CodegenError, Result};

use super::loader::is_blank_document;

/// Name of the merged schema written next to the base schema.
pub const CUSTOM_YAML_NAME: &str = "npu_native_functions_by_codegen.yaml";

/// Keys of the additional document renamed while merging.
const KEY_RENAMES: &[(&str, &str)] = &[("official", "supported")];

fn map_key(key: Value) -> Value {
    if let Some(name) = key.as_str() {
        if let Some((_, to)) = KEY_RENAMES.iter().find(|(from, _)| *from == name) {
            return Value::from(*to);
        }
    }
    key
}

/// Merge `additional` into `base`; `base` wins every scalar conflict.
///
/// Mappings merge key by key (renaming the additional side's keys), sequences
/// append additional items that are not already structurally present. Any
/// other combination keeps `base` as is.
pub fn merge_yaml(base: Value, additional: Value) -> Value {
    match (base, additional) {
        (Value::Mapping(mut base), Value::Mapping(additional)) => {
            for (key, value) in additional {
                let key = map_key(key);
                match base.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::replace(existing, Value::Null);
                        *existing = merge_yaml(current, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (Value::Sequence(mut base), Value::Sequence(additional)) => {
            for item in additional {
                if !base.contains(&item) {
                    base.push(item);
                }
            }
            Value::Sequence(base)
        }
        (base, _) => base,
    }
}

/// Path of the merged schema for a given base schema path.
pub fn gen_custom_yaml_path(original: &Path) -> PathBuf {
    original
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(CUSTOM_YAML_NAME)
}

fn read_plain(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).map_err(|err| CodegenError::io(path, err))?;
    if is_blank_document(&contents) {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&contents).map_err(|err| CodegenError::yaml(path, err))
}

/// Merge two schema files in memory.
pub fn merge_files(base_path: &Path, plugin_path: &Path) -> Result<Value> {
    let base = read_plain(base_path)?;
    let plugin = read_plain(plugin_path)?;
    Ok(merge_yaml(base, plugin))
}

/// Text of the merged schema as it is written to the side file.
pub fn render_merged(merged: &Value, merged_path: &Path) -> Result<String> {
    serde_yaml::to_string(merged).map_err(|err| CodegenError::yaml(merged_path, err))
}

/// Merge two schema files, write the result next to `base_path`, and return
/// the text written.
pub fn merge_custom_yaml(base_path: &Path, plugin_path: &Path) -> Result<String> {
    let merged = merge_files(base_path, plugin_path)?;
    let merged_path = gen_custom_yaml_path(base_path);
    let text = render_merged(&merged, &merged_path)?;
    fs::write(&merged_path, &text).map_err(|err| CodegenError::io(&merged_path, err))?;
    crate::trace!(
        "merged {} and {} into {}",
        base_path.display(),
        plugin_path.display(),
        merged_path.display()
    );
    Ok(text)
}
