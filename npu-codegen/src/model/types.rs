use std::fmt;

use crate::error::{CodegenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTy {
    Generator,
    ScalarType,
    Tensor,
    Int,
    Dimname,
    DimVector,
    Float,
    Str,
    Bool,
    Layout,
    Device,
    DeviceIndex,
    Scalar,
    MemoryFormat,
    QScheme,
    Storage,
    Stream,
    SymInt,
    SymBool,
    ConstQuantizerPtr,
}

const BASE_TY_NAMES: &[(BaseTy, &str)] = &[
    (BaseTy::Generator, "Generator"),
    (BaseTy::ScalarType, "ScalarType"),
    (BaseTy::Tensor, "Tensor"),
    (BaseTy::Int, "int"),
    (BaseTy::Dimname, "Dimname"),
    (BaseTy::DimVector, "DimVector"),
    (BaseTy::Float, "float"),
    (BaseTy::Str, "str"),
    (BaseTy::Bool, "bool"),
    (BaseTy::Layout, "Layout"),
    (BaseTy::Device, "Device"),
    (BaseTy::DeviceIndex, "DeviceIndex"),
    (BaseTy::Scalar, "Scalar"),
    (BaseTy::MemoryFormat, "MemoryFormat"),
    (BaseTy::QScheme, "QScheme"),
    (BaseTy::Storage, "Storage"),
    (BaseTy::Stream, "Stream"),
    (BaseTy::SymInt, "SymInt"),
    (BaseTy::SymBool, "SymBool"),
    (BaseTy::ConstQuantizerPtr, "ConstQuantizerPtr"),
];

impl BaseTy {
    pub fn parse(name: &str) -> Option<Self> {
        BASE_TY_NAMES
            .iter()
            .find(|(_, text)| *text == name)
            .map(|(ty, _)| *ty)
    }

    pub fn as_str(self) -> &'static str {
        BASE_TY_NAMES
            .iter()
            .find(|(ty, _)| *ty == self)
            .map(|(_, text)| *text)
            .unwrap_or("?")
    }
}

/// Type of a schema argument or return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Base(BaseTy),
    Optional(Box<Type>),
    List { elem: Box<Type>, size: Option<usize> },
}

impl Type {
    pub fn parse(text: &str) -> Result<Type> {
        let text = text.trim();
        if let Some(inner) = text.strip_suffix('?') {
            return Ok(Type::Optional(Box::new(Type::parse(inner)?)));
        }
        if let Some(head) = text.strip_suffix(']') {
            let open = head
                .rfind('[')
                .ok_or_else(|| CodegenError::schema_parse(text, "unbalanced list type"))?;
            let size_text = &head[open + 1..];
            let size = if size_text.is_empty() {
                None
            } else {
                Some(size_text.parse::<usize>().map_err(|_| {
                    CodegenError::schema_parse(text, format!("bad list size `{size_text}`"))
                })?)
            };
            return Ok(Type::List {
                elem: Box::new(Type::parse(&head[..open])?),
                size,
            });
        }
        BaseTy::parse(text)
            .map(Type::Base)
            .ok_or_else(|| CodegenError::schema_parse(text, "unknown type"))
    }

    pub fn is_base(&self, ty: BaseTy) -> bool {
        matches!(self, Type::Base(base) if *base == ty)
    }

    /// Tensor, optional tensor, or list of (optional) tensors.
    pub fn is_tensor_like(&self) -> bool {
        match self {
            Type::Base(base) => *base == BaseTy::Tensor,
            Type::Optional(elem) => elem.is_tensor_like(),
            Type::List { elem, .. } => elem.is_tensor_like(),
        }
    }

    pub fn is_symint_like(&self) -> bool {
        match self {
            Type::Base(base) => *base == BaseTy::SymInt,
            Type::Optional(elem) => elem.is_symint_like(),
            Type::List { elem, .. } => elem.is_symint_like(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Optional(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Base(base) => f.write_str(base.as_str()),
            Type::Optional(elem) => write!(f, "{elem}?"),
            Type::List { elem, size } => match size {
                Some(size) => write!(f, "{elem}[{size}]"),
                None => write!(f, "{elem}[]"),
            },
        }
    }
}

/// Alias annotation such as `a!` or `a -> *`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub alias_set: Vec<String>,
    pub is_write: bool,
    pub alias_set_after: Vec<String>,
}

impl Annotation {
    pub fn parse(text: &str) -> Result<Annotation> {
        let (before, after) = match text.split_once("->") {
            Some((before, after)) => (before.trim(), Some(after.trim())),
            None => (text.trim(), None),
        };
        let (before, is_write) = match before.strip_suffix('!') {
            Some(before) => (before, true),
            None => (before, false),
        };
        if before.is_empty() {
            return Err(CodegenError::schema_parse(text, "empty alias annotation"));
        }
        let split = |s: &str| s.split('|').map(|a| a.trim().to_string()).collect::<Vec<_>>();
        Ok(Annotation {
            alias_set: split(before),
            is_write,
            alias_set_after: after.map(split).unwrap_or_default(),
        })
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias_set.join("|"))?;
        if self.is_write {
            f.write_str("!")?;
        }
        if !self.alias_set_after.is_empty() {
            write!(f, " -> {}", self.alias_set_after.join("|"))?;
        }
        Ok(())
    }
}
