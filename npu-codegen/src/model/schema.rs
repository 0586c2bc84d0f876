//! Function schema model: `name.overload(args) -> returns`.
use std::fmt;

use crate::error::{CodegenError, Result};

use super::types::{Annotation, Type};

/// Augmented assignment dunder names that mark an in-place method (`__iand__`).
const AUGMENTED_ASSIGNMENT_NAMES: &[&str] = &[
    "add", "sub", "mul", "div", "mod", "pow", "lshift", "rshift", "and", "xor", "or",
    "matmul", "truediv", "floordiv",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseOperatorName {
    pub base: String,
    pub inplace: bool,
    pub dunder_method: bool,
}

impl BaseOperatorName {
    pub fn parse(op: &str) -> Result<Self> {
        if op.is_empty() {
            return Err(CodegenError::schema_parse(op, "empty operator name"));
        }
        if op.len() > 4 && op.starts_with("__") && op.ends_with("__") {
            let inner = &op[2..op.len() - 2];
            if let Some(rest) = inner.strip_prefix('i') {
                if AUGMENTED_ASSIGNMENT_NAMES.contains(&rest) {
                    return Ok(Self {
                        base: rest.to_string(),
                        inplace: true,
                        dunder_method: true,
                    });
                }
            }
            return Ok(Self {
                base: inner.to_string(),
                inplace: false,
                dunder_method: true,
            });
        }
        match op.strip_suffix('_') {
            Some(base) => Ok(Self {
                base: base.to_string(),
                inplace: true,
                dunder_method: false,
            }),
            None => Ok(Self {
                base: op.to_string(),
                inplace: false,
                dunder_method: false,
            }),
        }
    }
}

impl fmt::Display for BaseOperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dunder_method, self.inplace) {
            (true, true) => write!(f, "__i{}__", self.base),
            (true, false) => write!(f, "__{}__", self.base),
            (false, true) => write!(f, "{}_", self.base),
            (false, false) => f.write_str(&self.base),
        }
    }
}

/// Canonical operator name: base name plus overload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorName {
    pub name: BaseOperatorName,
    pub overload_name: String,
}

impl OperatorName {
    pub fn parse(text: &str) -> Result<Self> {
        let (name, overload_name) = match text.split_once('.') {
            Some((name, overload)) => (name, overload),
            None => (text, ""),
        };
        Ok(Self {
            name: BaseOperatorName::parse(name.trim())?,
            overload_name: overload_name.trim().to_string(),
        })
    }

    /// `name_overload`, usable as an identifier.
    pub fn unambiguous_name(&self) -> String {
        if self.overload_name.is_empty() {
            self.name.to_string()
        } else {
            format!("{}_{}", self.name, self.overload_name)
        }
    }
}

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overload_name.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.name, self.overload_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    pub name: String,
    pub ty: Type,
    pub default: Option<String>,
    pub annotation: Option<Annotation>,
}

impl Argument {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (type_and_annot, name_and_default) = text
            .rsplit_once(' ')
            .ok_or_else(|| CodegenError::schema_parse(text, "argument needs a type and a name"))?;
        let (name, default) = match name_and_default.split_once('=') {
            Some((name, default)) => (name, Some(default.to_string())),
            None => (name_and_default, None),
        };
        let (ty, annotation) = split_annotation(type_and_annot)?;
        Ok(Self {
            name: name.to_string(),
            ty,
            default,
            annotation,
        })
    }

    pub fn is_write(&self) -> bool {
        self.annotation.as_ref().map_or(false, |a| a.is_write)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&annotated_type(&self.ty, self.annotation.as_ref()))?;
        write!(f, " {}", self.name)?;
        if let Some(default) = &self.default {
            write!(f, "={default}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Return {
    pub name: Option<String>,
    pub ty: Type,
    pub annotation: Option<Annotation>,
}

impl Return {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        // The annotation may contain spaces (`Tensor(a -> *)`), so peel it off first.
        let (type_text, name) = match text.find(')') {
            Some(close) => {
                let (head, tail) = text.split_at(close + 1);
                let tail = tail.trim();
                match tail.split_once(' ') {
                    Some((suffix, name)) => (format!("{head}{suffix}"), name.trim()),
                    None if tail.starts_with('[') => (format!("{head}{tail}"), ""),
                    None => (head.to_string(), tail),
                }
            }
            None => match text.rsplit_once(' ') {
                Some((ty, name)) => (ty.to_string(), name),
                None => (text.to_string(), ""),
            },
        };
        let (ty, annotation) = split_annotation(type_text.trim())?;
        Ok(Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            ty,
            annotation,
        })
    }

    pub fn is_write(&self) -> bool {
        self.annotation.as_ref().map_or(false, |a| a.is_write)
    }
}

impl fmt::Display for Return {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&annotated_type(&self.ty, self.annotation.as_ref()))?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

fn annotated_type(ty: &Type, annotation: Option<&Annotation>) -> String {
    let text = ty.to_string();
    match annotation {
        Some(annotation) => text.replacen("Tensor", &format!("Tensor({annotation})"), 1),
        None => text,
    }
}

/// Split `Tensor(a!)[]` into the type `Tensor[]` and the annotation `a!`.
fn split_annotation(text: &str) -> Result<(Type, Option<Annotation>)> {
    match text.find('(') {
        Some(open) => {
            let close = text[open..]
                .find(')')
                .map(|idx| idx + open)
                .ok_or_else(|| CodegenError::schema_parse(text, "unclosed alias annotation"))?;
            let ty = format!("{}{}", &text[..open], &text[close + 1..]);
            let annotation = Annotation::parse(&text[open + 1..close])?;
            Ok((Type::parse(&ty)?, Some(annotation)))
        }
        None => Ok((Type::parse(text)?, None)),
    }
}

/// The four scattered tensor-option arguments of a factory function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorOptionsArguments {
    pub dtype: Argument,
    pub layout: Argument,
    pub device: Argument,
    pub pin_memory: Argument,
}

impl TensorOptionsArguments {
    pub fn all(&self) -> [&Argument; 4] {
        [&self.dtype, &self.layout, &self.device, &self.pin_memory]
    }
}

const TENSOR_OPTIONS_FIELDS: [(&str, &str); 4] = [
    ("dtype", "ScalarType?"),
    ("layout", "Layout?"),
    ("device", "Device?"),
    ("pin_memory", "bool?"),
];

/// One element of a grouped argument list.
#[derive(Debug, Clone, Copy)]
pub enum ArgumentItem<'a> {
    Plain(&'a Argument),
    SelfArg(&'a Argument),
    TensorOptions(&'a TensorOptionsArguments),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Arguments {
    pub pre_self_positional: Vec<Argument>,
    pub self_arg: Option<Argument>,
    pub post_self_positional: Vec<Argument>,
    pub pre_tensor_options_kwarg_only: Vec<Argument>,
    pub tensor_options: Option<TensorOptionsArguments>,
    pub post_tensor_options_kwarg_only: Vec<Argument>,
    pub out: Vec<Argument>,
}

impl Arguments {
    pub fn parse(text: &str) -> Result<Self> {
        let mut positional = Vec::new();
        let mut kwarg_only = Vec::new();
        let mut in_kwarg_only = false;
        for piece in split_top_level(text) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if piece == "*" {
                if in_kwarg_only {
                    return Err(CodegenError::schema_parse(text, "duplicate `*` marker"));
                }
                in_kwarg_only = true;
                continue;
            }
            let arg = Argument::parse(piece)?;
            if in_kwarg_only {
                kwarg_only.push(arg);
            } else {
                positional.push(arg);
            }
        }

        let (out, kwarg_only): (Vec<Argument>, Vec<Argument>) =
            kwarg_only.into_iter().partition(Argument::is_write);

        let mut args = Arguments::default();
        match positional.iter().position(|arg| arg.name == "self") {
            Some(idx) => {
                args.post_self_positional = positional.split_off(idx + 1);
                args.self_arg = positional.pop();
                args.pre_self_positional = positional;
            }
            None => args.post_self_positional = positional,
        }

        let options_at = kwarg_only.windows(4).position(|window| {
            window
                .iter()
                .zip(TENSOR_OPTIONS_FIELDS)
                .all(|(arg, (name, ty))| arg.name == name && arg.ty.to_string() == ty)
        });
        match options_at {
            Some(idx) => {
                let mut rest = kwarg_only;
                let post = rest.split_off(idx + 4);
                let mut group = rest.split_off(idx);
                let pin_memory = group.pop();
                let device = group.pop();
                let layout = group.pop();
                let dtype = group.pop();
                if let (Some(dtype), Some(layout), Some(device), Some(pin_memory)) =
                    (dtype, layout, device, pin_memory)
                {
                    args.tensor_options = Some(TensorOptionsArguments {
                        dtype,
                        layout,
                        device,
                        pin_memory,
                    });
                }
                args.pre_tensor_options_kwarg_only = rest;
                args.post_tensor_options_kwarg_only = post;
            }
            None => args.pre_tensor_options_kwarg_only = kwarg_only,
        }
        args.out = out;
        Ok(args)
    }

    pub fn flat_positional(&self) -> Vec<&Argument> {
        self.pre_self_positional
            .iter()
            .chain(self.self_arg.iter())
            .chain(self.post_self_positional.iter())
            .collect()
    }

    pub fn flat_kwarg_only(&self) -> Vec<&Argument> {
        let mut args: Vec<&Argument> = self.pre_tensor_options_kwarg_only.iter().collect();
        if let Some(options) = &self.tensor_options {
            args.extend(options.all());
        }
        args.extend(self.post_tensor_options_kwarg_only.iter());
        args
    }

    pub fn flat_non_out(&self) -> Vec<&Argument> {
        let mut args = self.flat_positional();
        args.extend(self.flat_kwarg_only());
        args
    }

    /// Schema order: positional, keyword-only, out.
    pub fn flat_all(&self) -> Vec<&Argument> {
        let mut args = self.flat_non_out();
        args.extend(self.out.iter());
        args
    }

    pub fn positional(&self) -> Vec<ArgumentItem<'_>> {
        let mut items: Vec<ArgumentItem<'_>> =
            self.pre_self_positional.iter().map(ArgumentItem::Plain).collect();
        if let Some(self_arg) = &self.self_arg {
            items.push(ArgumentItem::SelfArg(self_arg));
        }
        items.extend(self.post_self_positional.iter().map(ArgumentItem::Plain));
        items
    }

    pub fn kwarg_only(&self) -> Vec<ArgumentItem<'_>> {
        let mut items: Vec<ArgumentItem<'_>> = self
            .pre_tensor_options_kwarg_only
            .iter()
            .map(ArgumentItem::Plain)
            .collect();
        if let Some(options) = &self.tensor_options {
            items.push(ArgumentItem::TensorOptions(options));
        }
        items.extend(self.post_tensor_options_kwarg_only.iter().map(ArgumentItem::Plain));
        items
    }

    pub fn non_out(&self) -> Vec<ArgumentItem<'_>> {
        let mut items = self.positional();
        items.extend(self.kwarg_only());
        items
    }

    pub fn out_items(&self) -> Vec<ArgumentItem<'_>> {
        self.out.iter().map(ArgumentItem::Plain).collect()
    }

    pub fn has_symint_arg(&self) -> bool {
        self.flat_all().iter().any(|arg| arg.ty.is_symint_like())
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.flat_positional().iter().map(|a| a.to_string()).collect();
        let kwarg_only = self.flat_kwarg_only();
        if !kwarg_only.is_empty() || !self.out.is_empty() {
            parts.push("*".to_string());
            parts.extend(kwarg_only.iter().map(|a| a.to_string()));
            parts.extend(self.out.iter().map(|a| a.to_string()));
        }
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSchema {
    pub name: OperatorName,
    pub arguments: Arguments,
    pub returns: Vec<Return>,
}

impl FunctionSchema {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let split_at = text
            .rfind(") -> ")
            .ok_or_else(|| CodegenError::schema_parse(text, "missing `) -> ` separator"))?;
        let decl = &text[..split_at];
        let returns_text = &text[split_at + 5..];
        let (ops, args) = decl
            .split_once('(')
            .ok_or_else(|| CodegenError::schema_parse(text, "missing argument list"))?;
        Ok(Self {
            name: OperatorName::parse(ops)?,
            arguments: Arguments::parse(args)?,
            returns: parse_returns(returns_text)?,
        })
    }

    pub fn is_out_fn(&self) -> bool {
        !self.arguments.out.is_empty()
    }

    pub fn has_symint(&self) -> bool {
        self.arguments.has_symint_arg()
    }
}

impl fmt::Display for FunctionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> ", self.name, self.arguments)?;
        if self.returns.len() == 1 {
            write!(f, "{}", self.returns[0])
        } else {
            let returns: Vec<String> = self.returns.iter().map(|r| r.to_string()).collect();
            write!(f, "({})", returns.join(", "))
        }
    }
}

fn parse_returns(text: &str) -> Result<Vec<Return>> {
    let text = text.trim();
    match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        // A bare annotated tensor `Tensor(a!)` also ends in `)`; only treat it as a tuple
        // when the opening paren is the first character.
        Some(inner) => split_top_level(inner)
            .into_iter()
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(Return::parse)
            .collect(),
        None => Ok(vec![Return::parse(text)?]),
    }
}

/// Split on commas that are not nested in brackets or parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                pieces.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

