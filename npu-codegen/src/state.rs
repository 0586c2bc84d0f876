//! Per-run resolution state shared by the resolver and the synthesizer.
//!
//! Both tables are filled while resolving schemas and only read afterwards.
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Two sources bound the same operator to different wrapper symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub op_key: String,
    pub previous: String,
    pub current: String,
}

/// The text logged when the conflict is recorded.
impl fmt::Display for NameConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Find different wrap_name for {} and {} between pta and opplugin, \
             with {} being used as the actual wrap_name",
            self.previous, self.current, self.current
        )
    }
}

/// Canonical operator name -> generated wrapper symbol.
#[derive(Debug, Default)]
pub struct WrapNameCache {
    entries: HashMap<String, String>,
}

impl WrapNameCache {
    /// Record a wrapper symbol. A different existing symbol is reported and overwritten.
    pub fn insert(
        &mut self,
        op_key: impl Into<String>,
        wrap_name: impl Into<String>,
    ) -> Option<NameConflict> {
        let op_key = op_key.into();
        let wrap_name = wrap_name.into();
        let conflict = match self.entries.get(&op_key) {
            Some(previous) if !previous.is_empty() && *previous != wrap_name => Some(NameConflict {
                op_key: op_key.clone(),
                previous: previous.clone(),
                current: wrap_name.clone(),
            }),
            _ => None,
        };
        if let Some(conflict) = &conflict {
            crate::warning!("{conflict}");
        }
        self.entries.insert(op_key, wrap_name);
        conflict
    }

    pub fn get(&self, op_key: &str) -> Option<&str> {
        self.entries.get(op_key).map(String::as_str)
    }

    pub fn contains(&self, op_key: &str) -> bool {
        self.entries.contains_key(op_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Operators opted into the op-api kernel path.
#[derive(Debug, Default)]
pub struct OpApiSet {
    keys: HashSet<String>,
}

impl OpApiSet {
    pub fn insert(&mut self, op_key: impl Into<String>) {
        self.keys.insert(op_key.into());
    }

    pub fn contains(&self, op_key: &str) -> bool {
        self.keys.contains(op_key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CodegenState {
    pub wrap_names: WrapNameCache,
    pub op_api: OpApiSet,
}
