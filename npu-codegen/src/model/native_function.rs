use std::fmt;

use serde_yaml::{Mapping, Value};

use crate::error::{CodegenError, Result};
use crate::yaml::loader::record_loc;

use super::schema::{Argument, FunctionSchema, OperatorName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCheckType {
    NoCheck,
    ExactSame,
}

/// Replacement of structured kernel arguments by values computed in `meta()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precompute {
    pub replace: Vec<(String, Vec<Argument>)>,
    pub add: Vec<Argument>,
}

impl Precompute {
    /// Parse entries such as `kernel_size -> int kH, int kW` and `int numBatch`.
    pub fn parse(entries: &[Value], loc: &str) -> Result<Self> {
        let mut precompute = Precompute::default();
        for entry in entries {
            let text = entry.as_str().ok_or_else(|| {
                CodegenError::malformed(loc, "precomputed entries must be strings")
            })?;
            let parse_list = |list: &str| -> Result<Vec<Argument>> {
                list.split(',').map(|arg| Argument::parse(arg.trim())).collect()
            };
            match text.split_once(" -> ") {
                Some((arg, with)) => precompute
                    .replace
                    .push((arg.trim().to_string(), parse_list(with)?)),
                None => precompute.add.extend(parse_list(text)?),
            }
        }
        Ok(precompute)
    }

    pub fn replacement(&self, name: &str) -> Option<&[Argument]> {
        self.replace
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, with)| with.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: Option<u64>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => f.write_str(&self.file),
        }
    }
}

/// An operator the generator may bind: its schema plus dispatch metadata.
#[derive(Debug, Clone)]
pub struct NativeFunction {
    /// Library namespace the operator is registered under (`aten`, `npu`).
    pub namespace: String,
    pub func: FunctionSchema,
    pub device_check: DeviceCheckType,
    pub device_guard: bool,
    pub manual_kernel_registration: bool,
    pub structured: bool,
    pub structured_delegate: Option<OperatorName>,
    pub precomputed: Option<Precompute>,
    pub loc: Location,
}

impl NativeFunction {
    pub fn from_yaml(record: &Mapping, namespace: &str, source: &str) -> Result<Self> {
        let loc = record_loc(source, record);
        let func = match record.get("func") {
            Some(Value::String(func)) => func,
            other => {
                return Err(CodegenError::malformed(
                    &loc,
                    format!("not a str : {other:?}"),
                ))
            }
        };
        let func = FunctionSchema::parse(func)?;

        let device_check = match record.get("device_check").and_then(Value::as_str) {
            None | Some("ExactSame") => DeviceCheckType::ExactSame,
            Some("NoCheck") => DeviceCheckType::NoCheck,
            Some(other) => {
                return Err(CodegenError::malformed(
                    &loc,
                    format!("unknown device_check {other}"),
                ))
            }
        };
        let flag = |key: &str, default: bool| -> Result<bool> {
            match record.get(key) {
                None | Some(Value::Null) => Ok(default),
                Some(Value::Bool(value)) => Ok(*value),
                Some(other) => Err(CodegenError::malformed(
                    &loc,
                    format!("{key} must be a bool, got {other:?}"),
                )),
            }
        };
        let device_guard = flag("device_guard", true)?;
        let manual_kernel_registration = flag("manual_kernel_registration", false)?;
        let structured = flag("structured", false)?;
        let structured_delegate = record
            .get("structured_delegate")
            .and_then(Value::as_str)
            .map(OperatorName::parse)
            .transpose()?;
        let precomputed = match record.get("precomputed") {
            Some(Value::Sequence(entries)) => Some(Precompute::parse(entries, &loc)?),
            _ => None,
        };

        Ok(Self {
            namespace: namespace.to_string(),
            func,
            device_check,
            device_guard,
            manual_kernel_registration,
            structured,
            structured_delegate,
            precomputed,
            loc: Location {
                file: source.to_string(),
                line: crate::yaml::loader::record_line(record),
            },
        })
    }

    /// Canonical operator key, e.g. `add.Tensor`.
    pub fn op_key(&self) -> String {
        self.func.name.to_string()
    }
}
