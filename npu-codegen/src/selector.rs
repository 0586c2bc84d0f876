//! Operator selection for `--ops`.
use std::collections::HashSet;

use crate::error::{CodegenError, Result};
use crate::model::native_function::NativeFunction;

/// Which operators get dispatcher registrations.
#[derive(Debug, Clone, Default)]
pub enum OperatorSelector {
    #[default]
    All,
    /// Full names (`add.Tensor`) or base names (`add`).
    Only(HashSet<String>),
}

impl OperatorSelector {
    /// Parse a comma separated list; blank items are ignored but at least one must remain.
    pub fn from_list(value: &str) -> Result<Self> {
        let ops: HashSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|op| !op.is_empty())
            .map(str::to_string)
            .collect();
        if ops.is_empty() {
            return Err(CodegenError::InvalidSelector(
                "--ops must contain at least one op".to_string(),
            ));
        }
        Ok(OperatorSelector::Only(ops))
    }

    pub fn is_operator_selected(&self, op_key: &str) -> bool {
        match self {
            OperatorSelector::All => true,
            OperatorSelector::Only(ops) => {
                let base = op_key.split('.').next().unwrap_or(op_key);
                ops.contains(op_key) || ops.contains(base)
            }
        }
    }

    pub fn is_native_function_selected(&self, f: &NativeFunction) -> bool {
        self.is_operator_selected(&f.op_key())
    }
}
