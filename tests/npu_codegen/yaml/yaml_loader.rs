use anyhow::Result;
use npu_codegen::yaml::loader::{load_yaml_with_lines, parse_npu_yaml, record_line};
use npu_codegen::CodegenError;
use serde_yaml::Value;

use crate::common;

fn records(doc: &serde_yaml::Mapping, key: &str) -> Vec<serde_yaml::Mapping> {
    match doc.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.as_mapping().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

#[test]
fn missing_file_is_empty_schema() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let doc = parse_npu_yaml(&dir.path().join("absent.yaml"))?;
    assert!(doc.is_empty());
    Ok(())
}

#[test]
fn comment_only_file_is_empty_schema() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(dir.path(), "npu.yaml", "# nothing here\n\n---\n")?;
    assert!(parse_npu_yaml(&path)?.is_empty());
    Ok(())
}

#[test]
fn lines_without_colon_are_dropped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(
        dir.path(),
        "npu.yaml",
        "backend: NPU\nsupported:\n  - func: abs\n  - relu\n  - func: view\n",
    )?;
    let doc = parse_npu_yaml(&path)?;
    let supported = records(&doc, "supported");
    let funcs: Vec<&str> = supported
        .iter()
        .filter_map(|r| r.get("func").and_then(Value::as_str))
        .collect();
    assert_eq!(funcs, vec!["abs", "view"]);
    Ok(())
}

#[test]
fn records_carry_source_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(
        dir.path(),
        "npu.yaml",
        "backend: NPU\n# kernels\nsupported:\n  - func: abs\n  - func: relu\n    op_api: true\ncustom:\n  - func: npu_format_cast(Tensor self, int acl_format) -> Tensor\n",
    )?;
    let doc = parse_npu_yaml(&path)?;
    let supported = records(&doc, "supported");
    let lines: Vec<Option<u64>> = supported.iter().map(record_line).collect();
    assert_eq!(lines, vec![Some(4), Some(5)]);
    let custom = records(&doc, "custom");
    assert_eq!(record_line(&custom[0]), Some(8));
    Ok(())
}

#[test]
fn top_level_sequence_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(dir.path(), "npu.yaml", "- func: abs\n")?;
    match parse_npu_yaml(&path) {
        Err(CodegenError::SchemaMalformed { .. }) => Ok(()),
        other => panic!("expected SchemaMalformed, got {other:?}"),
    }
}

#[test]
fn invalid_yaml_reports_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(dir.path(), "npu.yaml", "supported: [abs\n")?;
    match parse_npu_yaml(&path) {
        Err(CodegenError::Yaml { path: reported, .. }) => {
            assert_eq!(reported, path);
            Ok(())
        }
        other => panic!("expected Yaml error, got {other:?}"),
    }
}

#[test]
fn native_function_list_keeps_every_line() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::write_file(dir.path(), "native_functions.yaml", common::NATIVE_FUNCTIONS)?;
    let doc = load_yaml_with_lines(&path)?;
    let items = doc.as_sequence().cloned().unwrap_or_default();
    assert_eq!(items.len(), 8);
    let lines: Vec<Option<u64>> = items
        .iter()
        .filter_map(Value::as_mapping)
        .map(record_line)
        .take(3)
        .collect();
    assert_eq!(lines, vec![Some(1), Some(3), Some(5)]);
    Ok(())
}
