//! Restricted evaluation of Python literal expressions.
//!
//! Manifests and model class attributes declare metadata as plain literals
//! inside a Python module. The analyzer must never execute that code, so
//! values are recovered by walking the syntax tree with a whitelist: scalar
//! constants, list/tuple literals, dict literals with string keys, and the
//! names `True`, `False`, `None`. Everything else evaluates to nothing.

use std::collections::BTreeMap;
use std::path::Path;

use rustpython_ast as ast;
use rustpython_parser::{parse, Mode};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// A safely evaluated Python literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    /// Dict literals are kept key-sorted so serialized forms are canonical.
    Dict(BTreeMap<String, Literal>),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Python truthiness, used for flags like `_transient` and
    /// `installable` that are occasionally declared as `1` or `"1"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Literal::Str(s) => !s.is_empty(),
            Literal::Int(i) => *i != 0,
            Literal::Float(f) => *f != 0.0,
            Literal::Bool(b) => *b,
            Literal::None => false,
            Literal::List(items) => !items.is_empty(),
            Literal::Dict(map) => !map.is_empty(),
        }
    }

    /// `_inherit` and `depends` accept either a single string or a list of
    /// strings; both normalize to a list, dropping non-string entries.
    pub fn as_str_list(&self) -> Vec<String> {
        match self {
            Literal::Str(s) => vec![s.clone()],
            Literal::List(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// String-to-string mapping, as declared by `_inherits`.
    pub fn as_str_map(&self) -> BTreeMap<String, String> {
        match self {
            Literal::Dict(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// JSON form with key-sorted objects; the canonical encoding stored on
    /// graph nodes.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Str(s) => serde_json::Value::String(s.clone()),
            Literal::Int(i) => serde_json::Value::Number((*i).into()),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::None => serde_json::Value::Null,
            Literal::List(items) => {
                serde_json::Value::Array(items.iter().map(Literal::to_json).collect())
            }
            Literal::Dict(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Evaluate an expression node against the literal whitelist.
///
/// Returns `None` for anything outside the whitelist: calls, attribute
/// access, names other than the three reserved ones, comprehensions,
/// f-strings, operators.
pub fn eval_expr(expr: &ast::Expr) -> Option<Literal> {
    match expr {
        ast::Expr::Constant(c) => eval_constant(&c.value),
        ast::Expr::List(list) => eval_sequence(&list.elts),
        ast::Expr::Tuple(tuple) => eval_sequence(&tuple.elts),
        ast::Expr::Dict(dict) => {
            let mut map = BTreeMap::new();
            for (key, value) in dict.keys.iter().zip(dict.values.iter()) {
                // A None key is a `**spread`, which is not a literal.
                let key = key.as_ref()?;
                let Some(Literal::Str(key)) = eval_expr(key) else {
                    return None;
                };
                map.insert(key, eval_expr(value)?);
            }
            Some(Literal::Dict(map))
        }
        ast::Expr::Name(name) => match name.id.as_str() {
            "True" => Some(Literal::Bool(true)),
            "False" => Some(Literal::Bool(false)),
            "None" => Some(Literal::None),
            _ => None,
        },
        _ => None,
    }
}

fn eval_constant(constant: &ast::Constant) -> Option<Literal> {
    match constant {
        ast::Constant::Str(s) => Some(Literal::Str(s.to_string())),
        ast::Constant::Int(i) => Some(Literal::Int(i.try_into().unwrap_or(0i64))),
        ast::Constant::Float(f) => Some(Literal::Float(*f)),
        ast::Constant::Bool(b) => Some(Literal::Bool(*b)),
        ast::Constant::None => Some(Literal::None),
        _ => None,
    }
}

fn eval_sequence(elts: &[ast::Expr]) -> Option<Literal> {
    let items: Option<Vec<Literal>> = elts.iter().map(eval_expr).collect();
    items.map(Literal::List)
}

/// Evaluate a manifest file: a single dict expression.
///
/// A file that does not parse at all is an error (the module is skipped). A
/// file that parses but is not a safe dict literal yields an empty mapping
/// with a warning; the module is still emitted with default fields.
pub fn eval_manifest(source: &str, path: &Path) -> CoreResult<BTreeMap<String, Literal>> {
    let parsed = parse(source, Mode::Expression, &path.to_string_lossy())
        .map_err(|_| CoreError::ManifestParse(path.to_path_buf()))?;

    let ast::Mod::Expression(expr) = parsed else {
        return Err(CoreError::ManifestParse(path.to_path_buf()));
    };

    match eval_expr(&expr.body) {
        Some(Literal::Dict(map)) => Ok(map),
        _ => {
            warn!(path = %path.display(), "manifest is not a literal mapping; using defaults");
            Ok(BTreeMap::new())
        }
    }
}
