//! Function schema resolution for op-plugin schema documents.
use std::collections::HashSet;

use serde_yaml::{Mapping, Sequence, Value};

use crate::api::cpp;
use crate::error::{CodegenError, Result};
use crate::model::schema::FunctionSchema;
use crate::state::{CodegenState, NameConflict, OpApiSet};
use crate::yaml::loader::record_loc;

/// Backend routing overrides removed from records before code generation.
pub const ROUTING_FIELDS: &[&str] = &["wrap_impl", "impl_name", "impl_ns", "op_api"];

/// Resolve `custom`, `official` and `symint` into the wrap-name cache.
///
/// The three keys are removed from `doc`; the rest of the document is returned
/// untouched. `custom` entries resolve before `official` ones, so on a clash the
/// official symbol is the one that stays cached.
pub fn resolve_function_schemas(
    mut doc: Mapping,
    source: &str,
    state: &mut CodegenState,
) -> Result<(Mapping, Vec<NameConflict>)> {
    let custom = take_list(&mut doc, "custom", source)?;
    let official = take_list(&mut doc, "official", source)?;
    let symint = take_list(&mut doc, "symint", source)?;

    let mut symint_set = HashSet::new();
    for entry in &symint {
        let text = match entry {
            Value::Mapping(record) => record.get("func").and_then(Value::as_str),
            Value::String(text) => Some(text.as_str()),
            _ => None,
        }
        .ok_or_else(|| {
            CodegenError::malformed(source, format!("symint entry is not a schema: {entry:?}"))
        })?;
        symint_set.insert(FunctionSchema::parse(text)?.name.to_string());
    }

    let mut conflicts = Vec::new();
    for entry in custom.iter().chain(official.iter()) {
        let func = match entry {
            Value::Mapping(record) => match record.get("func") {
                Some(Value::String(func)) => func,
                other => {
                    return Err(CodegenError::malformed(
                        record_loc(source, record),
                        format!("not a str : {other:?}"),
                    ))
                }
            },
            other => {
                return Err(CodegenError::malformed(
                    source,
                    format!("operator entry must be a mapping, got {other:?}"),
                ))
            }
        };
        let schema = FunctionSchema::parse(func)?;
        let op_key = schema.name.to_string();
        let mut wrap_name = cpp::name(&schema, false, false);
        if symint_set.contains(&op_key) {
            wrap_name.push_str("_symint");
        }
        crate::trace_full!("{op_key} -> {wrap_name}");
        if let Some(conflict) = state.wrap_names.insert(op_key, wrap_name) {
            conflicts.push(conflict);
        }
    }
    Ok((doc, conflicts))
}

/// Remove `key` from `doc`; absent or null values are an empty list.
fn take_list(doc: &mut Mapping, key: &str, source: &str) -> Result<Sequence> {
    match doc.remove(key) {
        None | Some(Value::Null) => Ok(Sequence::new()),
        Some(Value::Sequence(items)) => Ok(items),
        Some(other) => Err(CodegenError::malformed(
            source,
            format!("`{key}` must be a list, got {other:?}"),
        )),
    }
}

/// Record `entry` in the op-api set when it opts in with a truthy `op_api`.
pub fn collect_op_api(entry: &Value, op_api: &mut OpApiSet) {
    match entry {
        Value::String(_) => {}
        Value::Mapping(record) => {
            let enabled = match record.get("op_api") {
                Some(Value::Bool(flag)) => *flag,
                Some(Value::Null) | None => false,
                Some(Value::String(text)) => !text.is_empty(),
                Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
                Some(_) => true,
            };
            if !enabled {
                return;
            }
            if let Some(func) = record.get("func").and_then(Value::as_str) {
                let key = func.split('(').next().unwrap_or(func).trim();
                op_api.insert(key);
            }
        }
        other => {
            crate::warning!(
                "Unsupported parameter types, only str and dict is supported, but input is {other:?}"
            );
        }
    }
}

/// Strip [`ROUTING_FIELDS`] from every mapping entry.
pub fn strip_routing_fields(entries: &mut Sequence) {
    for entry in entries.iter_mut() {
        match entry {
            Value::Mapping(record) => {
                for field in ROUTING_FIELDS {
                    record.remove(*field);
                }
            }
            other => crate::trace_full!("leaving non-record entry as is: {other:?}"),
        }
    }
}
