//! Backend kernel index built from the merged backend schema document.
//!
//! Recognized keys:
//! - `backend`, `cpp_namespace`: override the settings values.
//! - `supported`: operator names or records bound to the backend dispatch key.
//! - `custom`: full-signature records that define new operators in the `npu` namespace.
//! - `autograd`, `custom_autograd`: the same, bound to the backend autograd key.
//! - `symint`: operators whose kernels take SymInt (kernel name gets `_symint`).
//!
//! Other keys are passed over.
use std::collections::{HashMap, HashSet};

use serde_yaml::{Mapping, Value};

use crate::api::cpp;
use crate::error::{CodegenError, Result};
use crate::model::dispatch_key::DispatchKey;
use crate::model::native_function::NativeFunction;
use crate::model::schema::FunctionSchema;
use crate::resolver::{collect_op_api, strip_routing_fields};
use crate::settings::Settings;
use crate::state::CodegenState;
use crate::yaml::loader::record_loc;

/// Namespace of operators defined by the backend itself.
pub const CUSTOM_NAMESPACE: &str = "npu";

const OPERATOR_LISTS: &[&str] = &["supported", "custom", "autograd", "custom_autograd", "symint"];

/// How one operator is implemented by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendMetadata {
    pub kernel: String,
    pub structured: bool,
    pub cpp_namespace: String,
}

impl BackendMetadata {
    pub fn supports_symint(&self) -> bool {
        self.kernel.ends_with("_symint")
    }
}

/// Kernels registered under one dispatch key, keyed by canonical operator name.
#[derive(Debug, Clone)]
pub struct BackendIndex {
    pub dispatch_key: DispatchKey,
    /// Whether wrappers for this key get device checks and guards.
    pub device_guard: bool,
    index: HashMap<String, BackendMetadata>,
}

impl BackendIndex {
    pub fn new(dispatch_key: DispatchKey, device_guard: bool) -> Self {
        Self {
            dispatch_key,
            device_guard,
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, op_key: impl Into<String>, metadata: BackendMetadata) {
        self.index.insert(op_key.into(), metadata);
    }

    pub fn has_kernel(&self, f: &NativeFunction) -> bool {
        self.index.contains_key(&f.op_key())
    }

    pub fn get_kernel(&self, f: &NativeFunction) -> Option<&BackendMetadata> {
        self.index.get(&f.op_key())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Everything the generator needs from the backend schema.
#[derive(Debug)]
pub struct BackendYaml {
    pub backend: String,
    pub cpp_namespace: String,
    /// Host operators followed by the ones the backend defines itself.
    pub native_functions: Vec<NativeFunction>,
    /// Operators defined by the backend, in declaration order.
    pub custom_functions: Vec<NativeFunction>,
    pub backend_index: BackendIndex,
    pub autograd_index: Option<BackendIndex>,
}

/// Host native functions from `native_functions.yaml` content.
///
/// Records whose schema cannot be parsed are skipped with a warning; naming
/// one of them in the backend schema later fails as an unknown operator.
pub fn parse_native_functions(doc: &Value, source: &str) -> Result<Vec<NativeFunction>> {
    let records = match doc {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(records) => records,
        _ => {
            return Err(CodegenError::malformed(
                source,
                "native functions must be a list of records",
            ))
        }
    };
    let mut functions = Vec::with_capacity(records.len());
    for record in records {
        let Value::Mapping(record) = record else {
            return Err(CodegenError::malformed(source, "native function entry must be a mapping"));
        };
        match NativeFunction::from_yaml(record, "aten", source) {
            Ok(f) => functions.push(f),
            Err(err @ CodegenError::SchemaMalformed { .. }) => return Err(err),
            Err(err) => crate::warning!("skipping {}: {err}", record_loc(source, record)),
        }
    }
    Ok(functions)
}

fn list_entries(doc: &mut Mapping, key: &str, source: &str) -> Result<Vec<Value>> {
    match doc.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => Ok(items),
        Some(other) => Err(CodegenError::malformed(
            source,
            format!("`{key}` must be a list, got {other:?}"),
        )),
    }
}

fn string_field(doc: &Mapping, key: &str, fallback: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Canonical operator key named by a `symint` entry.
fn symint_key(entry: &Value, source: &str) -> Result<String> {
    let text = match entry {
        Value::String(text) => text.as_str(),
        Value::Mapping(record) => record
            .get("func")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CodegenError::malformed(record_loc(source, record), "symint record needs `func`")
            })?,
        other => {
            return Err(CodegenError::malformed(
                source,
                format!("symint entry must be a name or a record, got {other:?}"),
            ))
        }
    };
    if text.contains('(') {
        Ok(FunctionSchema::parse(text)?.name.to_string())
    } else {
        Ok(text.trim().to_string())
    }
}

struct Universe {
    functions: Vec<NativeFunction>,
    by_key: HashMap<String, usize>,
    custom: Vec<usize>,
}

impl Universe {
    fn new(host: Vec<NativeFunction>) -> Self {
        let by_key = host
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.op_key(), idx))
            .collect();
        Self {
            functions: host,
            by_key,
            custom: Vec::new(),
        }
    }

    fn lookup(&self, op_key: &str) -> Option<&NativeFunction> {
        self.by_key.get(op_key).map(|idx| &self.functions[*idx])
    }

    /// Add a backend-defined operator; a second definition of the same key keeps the first.
    fn define(&mut self, f: NativeFunction) -> String {
        let op_key = f.op_key();
        if self.by_key.contains_key(&op_key) {
            crate::warning!(
                "{op_key} is defined more than once; keeping the first definition ({})",
                f.loc
            );
            return op_key;
        }
        self.by_key.insert(op_key.clone(), self.functions.len());
        self.custom.push(self.functions.len());
        self.functions.push(f);
        op_key
    }
}

/// Resolve one entry of an operator list to `(op_key, structured)`.
fn resolve_entry(
    entry: &Value,
    universe: &mut Universe,
    define_namespace: Option<&str>,
    source: &str,
) -> Result<(String, bool)> {
    match entry {
        Value::String(name) => {
            let name = name.trim();
            if universe.lookup(name).is_none() {
                return Err(CodegenError::UnknownOperator(name.to_string()));
            }
            Ok((name.to_string(), false))
        }
        Value::Mapping(record) => {
            let func = match record.get("func") {
                Some(Value::String(func)) => func,
                other => {
                    return Err(CodegenError::malformed(
                        record_loc(source, record),
                        format!("not a str : {other:?}"),
                    ))
                }
            };
            let structured = matches!(record.get("structured"), Some(Value::Bool(true)));
            if !func.contains('(') {
                let name = func.trim();
                if universe.lookup(name).is_none() {
                    return Err(CodegenError::UnknownOperator(name.to_string()));
                }
                return Ok((name.to_string(), structured));
            }
            let op_key = FunctionSchema::parse(func)?.name.to_string();
            if universe.lookup(&op_key).is_some() && define_namespace.is_none() {
                return Ok((op_key, structured));
            }
            let namespace = define_namespace.unwrap_or(CUSTOM_NAMESPACE);
            let f = NativeFunction::from_yaml(record, namespace, source)?;
            Ok((universe.define(f), structured))
        }
        other => Err(CodegenError::malformed(
            source,
            format!("operator entry must be a name or a record, got {other:?}"),
        )),
    }
}

/// Build the backend indices from the merged backend document.
///
/// Op-api opt-ins are collected into `state` before routing fields are stripped.
pub fn parse_backend_yaml(
    mut doc: Mapping,
    host: Vec<NativeFunction>,
    settings: &Settings,
    state: &mut CodegenState,
    source: &str,
) -> Result<BackendYaml> {
    let backend = string_field(&doc, "backend", &settings.backend);
    let cpp_namespace = string_field(&doc, "cpp_namespace", &settings.cpp_namespace);

    let mut lists = HashMap::new();
    for key in OPERATOR_LISTS {
        let mut entries = list_entries(&mut doc, key, source)?;
        for entry in &entries {
            collect_op_api(entry, &mut state.op_api);
        }
        strip_routing_fields(&mut entries);
        lists.insert(*key, entries);
    }
    for (key, _) in &doc {
        crate::trace_full!("ignoring backend key {key:?}");
    }

    let symint: HashSet<String> = lists["symint"]
        .iter()
        .map(|entry| symint_key(entry, source))
        .collect::<Result<_>>()?;

    let mut universe = Universe::new(host);
    let mut backend_index = BackendIndex::new(DispatchKey::PrivateUse1, true);
    let mut autograd_index = BackendIndex::new(DispatchKey::AutogradPrivateUse1, false);

    let plan: [(&str, Option<&str>, bool); 4] = [
        ("supported", None, false),
        ("custom", Some(CUSTOM_NAMESPACE), false),
        ("autograd", None, true),
        ("custom_autograd", Some(CUSTOM_NAMESPACE), true),
    ];
    for (key, define_namespace, autograd) in plan {
        for entry in &lists[key] {
            let (op_key, structured) =
                resolve_entry(entry, &mut universe, define_namespace, source)?;
            let Some(f) = universe.lookup(&op_key) else {
                return Err(CodegenError::UnknownOperator(op_key));
            };
            let mut kernel = cpp::name(&f.func, false, false);
            if symint.contains(&op_key) {
                kernel.push_str("_symint");
            }
            let metadata = BackendMetadata {
                kernel,
                structured: structured && f.func.is_out_fn(),
                cpp_namespace: cpp_namespace.clone(),
            };
            crate::trace_full!("{key}: {op_key} -> {}", metadata.kernel);
            let index = if autograd { &mut autograd_index } else { &mut backend_index };
            index.insert(op_key, metadata);
        }
    }

    let custom_functions = universe
        .custom
        .iter()
        .map(|idx| universe.functions[*idx].clone())
        .collect();
    Ok(BackendYaml {
        backend,
        cpp_namespace,
        native_functions: universe.functions,
        custom_functions,
        backend_index,
        autograd_index: (!autograd_index.is_empty()).then_some(autograd_index),
    })
}
