//! Runtime arguments for registrations

use super::component::{BoundMethod, Component};
use crate::graph::{Node, Variable};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A directly serializable argument value.
///
/// Adjacently tagged so that a literal nested inside a [`Token`] stays a
/// plain map in YAML; serde_yaml cannot serialize an enum tag inside another
/// enum tag.
///
/// [`Token`]: super::Token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
}

impl Literal {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Literal::Float(v) => Some(*v),
            Literal::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Literal::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Literal::Floats(v) => Some(v),
            _ => None,
        }
    }
}

/// One argument to a registration: a literal, or a reference to something the
/// registry already tracks.
#[derive(Clone, Debug)]
pub enum Arg {
    Literal(Literal),
    Var(Variable),
    Component(Component),
    Method(BoundMethod),
}

impl Arg {
    /// View this argument as an expression, if it evaluates to one.
    pub fn as_node(&self) -> Option<Node> {
        match self {
            Arg::Var(v) => Some(Node::Var(v.clone())),
            Arg::Component(c) => c.as_node(),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Arg::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Literal(Literal::Bool(v))
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Literal(Literal::Int(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Literal(Literal::Float(v))
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Literal(Literal::Float(v as f64))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Literal(Literal::Str(v.to_string()))
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Literal(Literal::Str(v))
    }
}

impl From<Vec<i64>> for Arg {
    fn from(v: Vec<i64>) -> Self {
        Arg::Literal(Literal::Ints(v))
    }
}

impl From<Vec<f32>> for Arg {
    fn from(v: Vec<f32>) -> Self {
        Arg::Literal(Literal::Floats(v))
    }
}

impl From<Variable> for Arg {
    fn from(v: Variable) -> Self {
        Arg::Var(v)
    }
}

impl From<&Variable> for Arg {
    fn from(v: &Variable) -> Self {
        Arg::Var(v.clone())
    }
}

impl From<Component> for Arg {
    fn from(c: Component) -> Self {
        Arg::Component(c)
    }
}

impl From<&Component> for Arg {
    fn from(c: &Component) -> Self {
        Arg::Component(c.clone())
    }
}

impl From<BoundMethod> for Arg {
    fn from(m: BoundMethod) -> Self {
        Arg::Method(m)
    }
}

/// Positional and keyword arguments for one registration.
///
/// # Example
///
/// ```
/// use crucero::Args;
///
/// let args = Args::new().kw("shape", vec![3i64]).kw("init", "ones");
/// assert_eq!(args.len(), 0);
/// assert!(args.keyword("shape").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keyword: BTreeMap<String, Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// No arguments at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn with(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Set a keyword argument.
    pub fn kw(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.keyword.insert(name.into(), arg.into());
        self
    }

    pub(crate) fn from_parts(positional: Vec<Arg>, keyword: BTreeMap<String, Arg>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn keyword(&self, name: &str) -> Option<&Arg> {
        self.keyword.get(name)
    }

    pub fn keywords(&self) -> &BTreeMap<String, Arg> {
        &self.keyword
    }

    /// Positional argument at `idx`, or an error naming the gap.
    pub fn at(&self, idx: usize) -> Result<&Arg> {
        self.positional
            .get(idx)
            .ok_or_else(|| Error::InvalidArgument(format!("missing positional argument {idx}")))
    }

    /// Positional argument at `idx`, as an expression.
    pub fn node_at(&self, idx: usize) -> Result<Node> {
        self.at(idx)?.as_node().ok_or_else(|| {
            Error::InvalidArgument(format!("positional argument {idx} is not an expression"))
        })
    }

    /// Keyword argument as an integer, if present.
    pub fn int_kw(&self, name: &str) -> Result<Option<i64>> {
        match self.keyword.get(name) {
            None => Ok(None),
            Some(arg) => arg
                .as_literal()
                .and_then(Literal::as_int)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("{name} must be an integer"))),
        }
    }

    /// Keyword argument as a float, if present.
    pub fn float_kw(&self, name: &str) -> Result<Option<f64>> {
        match self.keyword.get(name) {
            None => Ok(None),
            Some(arg) => arg
                .as_literal()
                .and_then(Literal::as_float)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("{name} must be a number"))),
        }
    }

    /// Keyword argument as a string, if present.
    pub fn str_kw(&self, name: &str) -> Result<Option<&str>> {
        match self.keyword.get(name) {
            None => Ok(None),
            Some(arg) => arg
                .as_literal()
                .and_then(Literal::as_str)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("{name} must be a string"))),
        }
    }

    /// Keyword argument as an integer list, if present.
    pub fn ints_kw(&self, name: &str) -> Result<Option<&[i64]>> {
        match self.keyword.get(name) {
            None => Ok(None),
            Some(arg) => arg
                .as_literal()
                .and_then(Literal::as_ints)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("{name} must be an integer list"))),
        }
    }
}
