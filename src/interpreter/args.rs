//! Named arguments
//!
//! Actual arguments are expressions evaluated in the caller's scope, before
//! the callee's frame exists. Missing actuals fall back to the formal's
//! default.

use serde::{Deserialize, Serialize};

use super::expr::{Expr, Expression};
use super::value::{TypeDescriptor, Value};
use crate::runtime::error::ExecResult;
use crate::runtime::scope::Scope;
use crate::runtime::world::InitRecord;

/// Formal argument of an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormalArg {
    /// Argument name
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub ty: TypeDescriptor,
    /// Default value expression
    #[serde(default)]
    pub default: Option<Expr>,
}

impl FormalArg {
    /// Untyped formal without a default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TypeDescriptor::any(),
            default: None,
        }
    }

    /// Set the default value expression
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the declared type
    pub fn typed(mut self, ty: TypeDescriptor) -> Self {
        self.ty = ty;
        self
    }
}

/// Ordered name → expression mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments {
    entries: Vec<(String, Expr)>,
}

impl Arguments {
    /// Empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.insert(name, expr);
        self
    }

    /// Insert or replace an argument
    pub fn insert(&mut self, name: impl Into<String>, expr: Expr) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = expr,
            None => self.entries.push((name, expr)),
        }
    }

    /// Expression bound to `name`
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, expr)| expr)
    }

    /// Argument names, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate every argument in `scope`
    pub fn evaluate(&self, scope: &mut Scope) -> ExecResult<BoundArguments> {
        let mut values = Vec::with_capacity(self.entries.len());
        for (name, expr) in &self.entries {
            values.push((name.clone(), expr.evaluate(scope)?));
        }
        Ok(BoundArguments { values })
    }

    /// Evaluate the actuals against `formals`: actuals first, then defaults,
    /// then nil. Actuals not declared by any formal are kept as is.
    pub fn bind(&self, formals: &[FormalArg], scope: &mut Scope) -> ExecResult<BoundArguments> {
        let mut values = Vec::with_capacity(formals.len().max(self.entries.len()));
        for formal in formals {
            let value = match (self.get(&formal.name), &formal.default) {
                (Some(actual), _) => actual.evaluate(scope)?,
                (None, Some(default)) => default.evaluate(scope)?,
                (None, None) => Value::Nil,
            };
            let value = match value.cast(formal.ty.base) {
                Some(casted) if !value.is_nil() => casted,
                _ => value,
            };
            values.push((formal.name.clone(), value));
        }
        for (name, expr) in &self.entries {
            if !formals.iter().any(|formal| formal.name == *name) {
                values.push((name.clone(), expr.evaluate(scope)?));
            }
        }
        Ok(BoundArguments { values })
    }
}

/// Evaluated arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<(String, Value)>,
}

impl BoundArguments {
    /// Value of an argument
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Name/value pairs, in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Use the arguments as initial attribute values
    pub fn into_record(self) -> InitRecord {
        self.values.into_iter().collect()
    }
}
