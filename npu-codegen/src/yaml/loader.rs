//! Lenient schema loading with source line tagging.
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Sequence, Value};

use crate::error::{CodegenError, Result};

/// Key inserted into every record mapping that is an item of a top-level sequence.
pub const LINE_KEY: &str = "__line__";

/// Load an operator schema document.
///
/// A missing file is an empty schema. Lines without a `:` are dropped before
/// parsing; whatever is left must be valid YAML.
pub fn parse_npu_yaml(path: &Path) -> Result<Mapping> {
    if !path.exists() {
        return Ok(Mapping::new());
    }
    let contents = fs::read_to_string(path).map_err(|err| CodegenError::io(path, err))?;
    parse_npu_str(&contents, path)
}

/// [`parse_npu_yaml`] over text already in memory; `path` only names the source.
pub fn parse_npu_str(contents: &str, path: &Path) -> Result<Mapping> {
    let mut filtered = String::with_capacity(contents.len());
    let mut source_lines = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if !line.contains(':') {
            continue;
        }
        filtered.push_str(line);
        filtered.push('\n');
        source_lines.push(idx + 1);
    }
    match parse_tagged(path, &filtered, &source_lines)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(root) => Ok(root),
        _ => Err(CodegenError::malformed(
            path.display().to_string(),
            "top-level document must be a mapping",
        )),
    }
}

/// Load a document verbatim (no line filtering), still tagging record lines.
///
/// Used for the host framework's native function list, whose top level is a sequence.
pub fn load_yaml_with_lines(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Null);
    }
    let contents = fs::read_to_string(path).map_err(|err| CodegenError::io(path, err))?;
    let source_lines: Vec<usize> = (1..=contents.lines().count()).collect();
    parse_tagged(path, &contents, &source_lines)
}

/// Source line recorded for a record, if the loader tagged it.
pub fn record_line(record: &Mapping) -> Option<u64> {
    record.get(LINE_KEY).and_then(Value::as_u64)
}

/// `path:line` for error messages, or just `path` for untagged records.
pub fn record_loc(source: &str, record: &Mapping) -> String {
    match record_line(record) {
        Some(line) => format!("{source}:{line}"),
        None => source.to_string(),
    }
}

/// Nothing but blank lines, comments and document markers.
pub(crate) fn is_blank_document(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}

fn parse_tagged(path: &Path, text: &str, source_lines: &[usize]) -> Result<Value> {
    if is_blank_document(text) {
        return Ok(Value::Null);
    }
    let mut root: Value =
        serde_yaml::from_str(text).map_err(|err| CodegenError::yaml(path, err))?;
    let lines: Vec<&str> = text.lines().collect();
    match &mut root {
        Value::Sequence(items) => {
            let block: Vec<(usize, &str)> = lines.iter().copied().enumerate().collect();
            tag_items(items, &item_lines(&block, source_lines));
        }
        Value::Mapping(map) => {
            for (key, block) in top_level_blocks(&lines) {
                if let Some(Value::Sequence(items)) = map.get_mut(key.as_str()) {
                    tag_items(items, &item_lines(&block, source_lines));
                }
            }
        }
        _ => {}
    }
    Ok(root)
}

/// Split a block-style document into `key -> lines` for each unindented key.
fn top_level_blocks<'a>(lines: &[&'a str]) -> Vec<(String, Vec<(usize, &'a str)>)> {
    let mut blocks: Vec<(String, Vec<(usize, &'a str)>)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let starts_key = !line.starts_with(|c: char| c.is_whitespace() || c == '-' || c == '#')
            && line.contains(':');
        if starts_key {
            let key = line
                .split(':')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string();
            blocks.push((key, Vec::new()));
        } else if let Some((_, block)) = blocks.last_mut() {
            block.push((idx, line));
        }
    }
    blocks
}

/// Source lines of the outermost `- ` items in a block.
fn item_lines(block: &[(usize, &str)], source_lines: &[usize]) -> Vec<usize> {
    let starts: Vec<(usize, usize)> = block
        .iter()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim_start();
            let is_item = trimmed == "-" || trimmed.starts_with("- ");
            is_item.then(|| (*idx, line.len() - trimmed.len()))
        })
        .collect();
    let Some(indent) = starts.iter().map(|(_, indent)| *indent).min() else {
        return Vec::new();
    };
    starts
        .into_iter()
        .filter(|(_, item_indent)| *item_indent == indent)
        .filter_map(|(idx, _)| source_lines.get(idx).copied())
        .collect()
}

fn tag_items(items: &mut Sequence, lines: &[usize]) {
    // Flow-style or otherwise unusual layouts: leave untagged.
    if items.len() != lines.len() {
        return;
    }
    for (item, line) in items.iter_mut().zip(lines) {
        if let Value::Mapping(record) = item {
            record.insert(Value::from(LINE_KEY), Value::from(*line as u64));
        }
    }
}
