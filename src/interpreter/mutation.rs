//! `add`, `remove` and `put`
//!
//! Facets are validated when the statement is built: missing or conflicting
//! facets and structural changes to fixed-length containers are errors, type
//! mismatches are warnings. At run time the container is resolved first,
//! then the index, then the item; both are cast best-effort to the
//! container's key and content types, with a warning when the cast is not a
//! plain numeric widening.

use serde::{Deserialize, Serialize};

use super::container::{ContainerRef, Modifiable};
use super::expr::{Expr, Expression};
use super::value::{TypeDescriptor, Value, ValueType};
use crate::runtime::error::{BuildError, BuildResult, ExecError, ExecResult};
use crate::runtime::scope::Scope;

/// Which container statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// `add`
    Add,
    /// `remove`
    Remove,
    /// `put`
    Put,
}

impl MutationKind {
    fn keyword(self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Remove => "remove",
            MutationKind::Put => "put",
        }
    }
}

/// How the item is understood when the container is a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    /// Plain value
    #[default]
    Value,
    /// Graph vertex
    Node,
    /// Graph edge (a pair), optionally weighted
    Edge,
}

/// Facets of a container statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerFacets {
    /// Container expression (`to:` / `from:` / `in:`)
    pub container: Expr,
    /// Item expression
    #[serde(default)]
    pub item: Option<Expr>,
    /// Index expression (`at:`)
    #[serde(default)]
    pub index: Option<Expr>,
    /// `all:` flag
    #[serde(default)]
    pub all: bool,
    /// Graph role of the item
    #[serde(default)]
    pub role: ItemRole,
    /// Edge weight
    #[serde(default)]
    pub weight: Option<Expr>,
}

impl ContainerFacets {
    /// Facets with only a container and an item
    pub fn new(container: Expr, item: Option<Expr>) -> Self {
        Self {
            container,
            item,
            index: None,
            all: false,
            role: ItemRole::Value,
            weight: None,
        }
    }
}

/// Evaluated item
enum Payload {
    Missing,
    One(Value),
    Many(Vec<Value>),
}

/// Built container statement
#[derive(Debug, Clone)]
pub struct ContainerStatement {
    kind: MutationKind,
    facets: ContainerFacets,
    warnings: Vec<String>,
}

impl ContainerStatement {
    /// Validate facets and build the statement
    pub fn new(kind: MutationKind, facets: ContainerFacets) -> BuildResult<Self> {
        let keyword = kind.keyword();
        match kind {
            MutationKind::Add if facets.item.is_none() => {
                return Err(BuildError::Incomplete {
                    statement: "add",
                    detail: "an item to add is required".to_string(),
                });
            }
            MutationKind::Put if facets.item.is_none() => {
                return Err(BuildError::Incomplete {
                    statement: "put",
                    detail: "a value to put is required".to_string(),
                });
            }
            MutationKind::Put if facets.all && facets.index.is_some() => {
                return Err(BuildError::ConflictingFacets {
                    statement: "put",
                    first: "all",
                    second: "at",
                });
            }
            MutationKind::Put if !facets.all && facets.index.is_none() => {
                return Err(BuildError::Incomplete {
                    statement: "put",
                    detail: "either 'at' or 'all' is required".to_string(),
                });
            }
            MutationKind::Remove
                if facets.item.is_none() && facets.index.is_none() && !facets.all =>
            {
                return Err(BuildError::Incomplete {
                    statement: "remove",
                    detail: "an item, an index or 'all' is required".to_string(),
                });
            }
            _ => {}
        }

        let container_type = facets.container.static_type();
        if kind != MutationKind::Put && container_type.is_fixed_length() {
            return Err(BuildError::FixedLengthContainer(format!(
                "{} ({})",
                facets.container, container_type
            )));
        }

        let warnings = Self::type_warnings(kind, &facets, container_type);
        for warning in &warnings {
            tracing::warn!(statement = keyword, "{}", warning);
        }
        Ok(Self {
            kind,
            facets,
            warnings,
        })
    }

    /// `add item to: container`
    pub fn add(container: Expr, item: Expr) -> BuildResult<Self> {
        Self::new(MutationKind::Add, ContainerFacets::new(container, Some(item)))
    }

    /// `put item at: index in: container`
    pub fn put(container: Expr, item: Expr, index: Expr) -> BuildResult<Self> {
        let mut facets = ContainerFacets::new(container, Some(item));
        facets.index = Some(index);
        Self::new(MutationKind::Put, facets)
    }

    /// `remove item from: container`
    pub fn remove(container: Expr, item: Expr) -> BuildResult<Self> {
        Self::new(MutationKind::Remove, ContainerFacets::new(container, Some(item)))
    }

    /// Statement keyword
    pub fn keyword(&self) -> &'static str {
        self.kind.keyword()
    }

    /// Warnings raised while validating the facets
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn type_warnings(
        kind: MutationKind,
        facets: &ContainerFacets,
        container_type: TypeDescriptor,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let base = container_type.base;
        if base != ValueType::Any && !base.is_container() {
            warnings.push(format!(
                "{} is of type {} and cannot be used as a container",
                facets.container, container_type
            ));
            return warnings;
        }

        if let Some(item) = &facets.item {
            let item_type = item.static_type();
            let checked = if facets.all && kind != MutationKind::Put && item_type.is_container() {
                item_type.content
            } else {
                item_type.base
            };
            let expected = container_type.content;
            if base != ValueType::Graph && !checked.is_translatable_into(expected) {
                warnings.push(format!(
                    "the type of the contents of {} ({}) does not match the type of {} ({}); it will be casted",
                    facets.container, expected, item, checked
                ));
            }
        }

        if let Some(index) = &facets.index {
            let index_type = index.static_type().base;
            let allowed = match base {
                ValueType::List => {
                    index_type.is_translatable_into(ValueType::Int)
                        || (kind == MutationKind::Put && index_type == ValueType::Pair)
                }
                ValueType::Matrix => matches!(
                    index_type,
                    ValueType::Any | ValueType::Point | ValueType::List | ValueType::Pair | ValueType::Int
                ),
                ValueType::Graph => matches!(index_type, ValueType::Any | ValueType::Pair),
                _ => index_type.is_translatable_into(container_type.key),
            };
            if !allowed {
                warnings.push(format!(
                    "the type of the index of {} ({}) does not match the type of {} ({})",
                    facets.container, container_type.key, index, index_type
                ));
            }
        }
        warnings
    }

    /// Resolve container, index, then item, and apply the mutation.
    /// Returns the container.
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let target = self.facets.container.evaluate(scope)?;
        let container = target
            .as_container()
            .ok_or_else(|| ExecError::NotAContainer {
                expression: self.facets.container.to_string(),
                found: target.value_type().to_string(),
            })?;

        let index = match &self.facets.index {
            Some(expr) => {
                let value = expr.evaluate(scope)?;
                Some(self.cast_index(scope, &container, value))
            }
            None => None,
        };
        let item = match &self.facets.item {
            Some(expr) => Some(expr.evaluate(scope)?),
            None => None,
        };

        if let ContainerRef::Graph(graph) = &container {
            match (self.kind, self.facets.role, item.clone()) {
                (MutationKind::Add, ItemRole::Node, Some(vertex)) => {
                    graph.write().add_vertex(vertex);
                    return Ok(target);
                }
                (MutationKind::Add, ItemRole::Edge, Some(edge)) => {
                    let weight = match &self.facets.weight {
                        Some(expr) => expr.evaluate(scope)?,
                        None => Value::Nil,
                    };
                    graph.write().add_value_at_index(&edge, weight)?;
                    return Ok(target);
                }
                _ => {}
            }
        }

        let payload = match item {
            None => Payload::Missing,
            Some(value) if self.facets.all && self.kind != MutationKind::Put => {
                match value.as_container() {
                    Some(items) => Payload::Many(
                        items
                            .elements()
                            .into_iter()
                            .map(|element| self.cast_item(scope, &container, element))
                            .collect(),
                    ),
                    None => Payload::One(self.cast_item(scope, &container, value)),
                }
            }
            Some(value) => Payload::One(self.cast_item(scope, &container, value)),
        };

        match self.kind {
            MutationKind::Add => self.apply_add(&container, payload, index)?,
            MutationKind::Remove => self.apply_remove(&container, payload, index)?,
            MutationKind::Put => self.apply_put(&container, payload, index)?,
        }
        Ok(target)
    }

    fn apply_add(
        &self,
        container: &ContainerRef,
        payload: Payload,
        index: Option<Value>,
    ) -> ExecResult<()> {
        container.with_mut(|inner| match (payload, index) {
            (Payload::Many(values), index) => inner.add_values(index.as_ref(), values),
            (Payload::One(value), Some(index)) => inner.add_value_at_index(&index, value),
            (Payload::One(value), None) => inner.add_value(value),
            (Payload::Missing, _) => Ok(()),
        })?;
        Ok(())
    }

    fn apply_remove(
        &self,
        container: &ContainerRef,
        payload: Payload,
        index: Option<Value>,
    ) -> ExecResult<()> {
        let all = self.facets.all;
        let indexes = match &index {
            Some(index) if all && index.as_container().is_some() => Some(index.elements()),
            _ => None,
        };
        container.with_mut(|inner| match (index, indexes, payload) {
            (_, Some(indexes), _) => inner.remove_indexes(&indexes),
            (Some(index), None, _) => inner.remove_index(&index),
            (None, _, Payload::Many(values)) => inner.remove_values(&values),
            (None, _, Payload::One(value)) if all => {
                inner.remove_all_occurrences(&value).map(|_| ())
            }
            (None, _, Payload::One(value)) => inner.remove_value(&value).map(|_| ()),
            (None, _, Payload::Missing) if all => inner.clear(),
            (None, _, Payload::Missing) => Ok(()),
        })?;
        Ok(())
    }

    fn apply_put(
        &self,
        container: &ContainerRef,
        payload: Payload,
        index: Option<Value>,
    ) -> ExecResult<()> {
        let value = match payload {
            Payload::One(value) => value,
            Payload::Many(values) => Value::list(values),
            Payload::Missing => Value::Nil,
        };
        if self.facets.all {
            container.with_mut(|inner| inner.set_all_values(value))?;
            return Ok(());
        }
        let index = index.unwrap_or_default();
        if let (ContainerRef::List(list), Value::Pair(from, to)) = (container, &index) {
            let bounds = (from.as_int(), to.as_int());
            if let (Some(from), Some(to)) = bounds {
                list.write().replace_range(from, to, value)?;
                return Ok(());
            }
        }
        container.with_mut(|inner| inner.set_value_at_index(&index, value))?;
        Ok(())
    }

    fn cast_index(&self, scope: &Scope, container: &ContainerRef, index: Value) -> Value {
        match container {
            ContainerRef::Matrix(_) | ContainerRef::Graph(_) => index,
            ContainerRef::List(_) if matches!(index, Value::Pair(..)) => index,
            ContainerRef::List(_) if self.facets.all && index.as_container().is_some() => index,
            other => coerce(scope, index, other.key_type(), "index"),
        }
    }

    fn cast_item(&self, scope: &Scope, container: &ContainerRef, item: Value) -> Value {
        match container {
            ContainerRef::Graph(_) => item,
            other => coerce(scope, item, other.content_type(), "value"),
        }
    }
}

/// Best-effort cast of `value` to `target`, warning unless the conversion is
/// an integer-to-float widening.
fn coerce(scope: &Scope, value: Value, target: ValueType, what: &str) -> Value {
    let actual = value.value_type();
    if target == ValueType::Any || value.is_nil() || actual == target {
        return value;
    }
    if actual == ValueType::Int && target == ValueType::Float {
        return value.cast(target).unwrap_or(value);
    }
    match value.cast(target) {
        Some(casted) => {
            scope.warn(format!("{} {} ({}) has been casted to {}", what, value, actual, target));
            casted
        }
        None => {
            scope.warn(format!("{} {} ({}) cannot be casted to {}", what, value, actual, target));
            value
        }
    }
}
