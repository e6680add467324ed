use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::container::{ContainerRef, GraphValue, ListValue, MapValue, MatrixValue};
use crate::runtime::agent::AgentRef;

/// Shared, interior-mutable storage used by every container value.
pub type Shared<T> = Arc<RwLock<T>>;

/// Runtime value manipulated by statements and expressions.
///
/// Scalars are copied; containers are shared handles, so a container stored
/// in a variable and the same container reached through an attribute are the
/// same object.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Two-dimensional point.
    Point(f64, f64),
    /// Key/value pair (also used as graph edge descriptor and list range).
    Pair(Box<Value>, Box<Value>),
    /// Ordered list.
    List(Shared<ListValue>),
    /// Insertion-ordered map.
    Map(Shared<MapValue>),
    /// Row-major matrix.
    Matrix(Shared<MatrixValue>),
    /// Weighted graph.
    Graph(Shared<GraphValue>),
    /// Agent handle.
    Agent(AgentRef),
    /// Species reference (by name).
    Species(String),
}

/// Coarse runtime types, used for container key/content declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Unconstrained.
    #[default]
    Any,
    /// The nil type.
    Nil,
    /// Booleans.
    Bool,
    /// Integers.
    Int,
    /// Floats.
    Float,
    /// Strings.
    String,
    /// Points.
    Point,
    /// Pairs.
    Pair,
    /// Lists.
    List,
    /// Maps.
    Map,
    /// Matrices.
    Matrix,
    /// Graphs.
    Graph,
    /// Agents.
    Agent,
    /// Species.
    Species,
}

impl ValueType {
    /// Whether values of this type are containers.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ValueType::List | ValueType::Map | ValueType::Matrix | ValueType::Graph
        )
    }

    /// Whether values of this type are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    /// Whether a value of type `self` can be stored where `target` is
    /// expected without an explicit cast (identity, `any`, or numeric widening).
    pub fn is_translatable_into(self, target: ValueType) -> bool {
        self == target
            || self == ValueType::Any
            || target == ValueType::Any
            || self == ValueType::Nil
            || (self.is_numeric() && target.is_numeric())
    }

    /// Default key (index) type of a container type.
    pub fn default_key_type(self) -> ValueType {
        match self {
            ValueType::List => ValueType::Int,
            ValueType::Matrix => ValueType::Point,
            ValueType::Graph => ValueType::Pair,
            _ => ValueType::Any,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Any => "unknown",
            ValueType::Nil => "nil",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Point => "point",
            ValueType::Pair => "pair",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Matrix => "matrix",
            ValueType::Graph => "graph",
            ValueType::Agent => "agent",
            ValueType::Species => "species",
        };
        f.write_str(name)
    }
}

/// Static type of an expression: a base type plus, for containers, the
/// declared key and content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Base type.
    pub base: ValueType,
    /// Key (index) type for containers.
    #[serde(default)]
    pub key: ValueType,
    /// Content type for containers.
    #[serde(default)]
    pub content: ValueType,
}

impl TypeDescriptor {
    /// The unconstrained type.
    pub fn any() -> Self {
        Self::default()
    }

    /// A scalar type.
    pub fn of(base: ValueType) -> Self {
        Self {
            base,
            key: base.default_key_type(),
            content: ValueType::Any,
        }
    }

    /// A container type with an explicit content type.
    pub fn container(base: ValueType, content: ValueType) -> Self {
        Self {
            base,
            key: base.default_key_type(),
            content,
        }
    }

    /// A map type with explicit key and content types.
    pub fn map(key: ValueType, content: ValueType) -> Self {
        Self {
            base: ValueType::Map,
            key,
            content,
        }
    }

    /// Whether the described values are containers.
    pub fn is_container(&self) -> bool {
        self.base.is_container()
    }

    /// Containers whose size cannot change through add/remove.
    pub fn is_fixed_length(&self) -> bool {
        matches!(
            self.base,
            ValueType::Matrix | ValueType::Pair | ValueType::Point
        )
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base {
            ValueType::Map => write!(f, "map<{}, {}>", self.key, self.content),
            base if base.is_container() => write!(f, "{}<{}>", base, self.content),
            base => write!(f, "{}", base),
        }
    }
}

impl Value {
    /// Build a list value from items, with an unconstrained content type.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(ListValue::new(ValueType::Any, items))))
    }

    /// Build a list value with a declared content type.
    pub fn typed_list(content: ValueType, items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(ListValue::new(content, items))))
    }

    /// Build a map value from ordered entries.
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let mut map = MapValue::new(ValueType::Any, ValueType::Any);
        for (key, value) in entries {
            map.put(key, value);
        }
        Value::Map(Arc::new(RwLock::new(map)))
    }

    /// Build a matrix filled with `fill`.
    pub fn matrix(cols: usize, rows: usize, fill: Value) -> Self {
        Value::Matrix(Arc::new(RwLock::new(MatrixValue::new(cols, rows, fill))))
    }

    /// Build an empty graph.
    pub fn graph() -> Self {
        Value::Graph(Arc::new(RwLock::new(GraphValue::default())))
    }

    /// Build a pair.
    pub fn pair(key: Value, value: Value) -> Self {
        Value::Pair(Box::new(key), Box::new(value))
    }

    /// Runtime type of the value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Point(..) => ValueType::Point,
            Value::Pair(..) => ValueType::Pair,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Matrix(_) => ValueType::Matrix,
            Value::Graph(_) => ValueType::Graph,
            Value::Agent(_) => ValueType::Agent,
            Value::Species(_) => ValueType::Species,
        }
    }

    /// Whether the value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness used by conditions.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(flag) => *flag,
            Value::Int(num) => *num != 0,
            Value::Float(num) => *num != 0.0,
            Value::String(text) => text == "true",
            _ => true,
        }
    }

    /// Integer view of a numeric value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(num) => Some(*num),
            Value::Float(num) => Some(*num as i64),
            Value::Bool(flag) => Some(*flag as i64),
            _ => None,
        }
    }

    /// Float view of a numeric value.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(num) => Some(*num as f64),
            Value::Float(num) => Some(*num),
            _ => None,
        }
    }

    /// Agent view of the value.
    pub fn as_agent(&self) -> Option<&AgentRef> {
        match self {
            Value::Agent(agent) => Some(agent),
            _ => None,
        }
    }

    /// Convenience accessor for string references.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            Value::Species(name) => Some(name),
            _ => None,
        }
    }

    /// Handle on the underlying container, if any.
    pub fn as_container(&self) -> Option<ContainerRef> {
        match self {
            Value::List(list) => Some(ContainerRef::List(list.clone())),
            Value::Map(map) => Some(ContainerRef::Map(map.clone())),
            Value::Matrix(matrix) => Some(ContainerRef::Matrix(matrix.clone())),
            Value::Graph(graph) => Some(ContainerRef::Graph(graph.clone())),
            _ => None,
        }
    }

    /// Snapshot of the elements the value iterates over.
    ///
    /// Non-container values are coerced to a list first: nil is empty, a
    /// pair yields key and value, a point yields its coordinates, anything
    /// else yields itself.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::Nil => Vec::new(),
            Value::Pair(key, value) => vec![(**key).clone(), (**value).clone()],
            Value::Point(x, y) => vec![Value::Float(*x), Value::Float(*y)],
            other => match other.as_container() {
                Some(container) => container.elements(),
                None => vec![other.clone()],
            },
        }
    }

    /// Agents contained in the value (a single agent or a container of agents).
    pub fn agents(&self) -> Vec<AgentRef> {
        match self {
            Value::Agent(agent) => vec![agent.clone()],
            other => other
                .elements()
                .into_iter()
                .filter_map(|item| match item {
                    Value::Agent(agent) => Some(agent),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Best-effort conversion into `target`; `None` when no sensible
    /// conversion exists.
    pub fn cast(&self, target: ValueType) -> Option<Value> {
        if target == ValueType::Any || self.value_type() == target {
            return Some(self.clone());
        }
        match (target, self) {
            (ValueType::Int, Value::Nil) => Some(Value::Int(0)),
            (ValueType::Int, Value::Float(num)) => Some(Value::Int(*num as i64)),
            (ValueType::Int, Value::Bool(flag)) => Some(Value::Int(*flag as i64)),
            (ValueType::Int, Value::String(text)) => text.trim().parse().ok().map(Value::Int),
            (ValueType::Float, Value::Nil) => Some(Value::Float(0.0)),
            (ValueType::Float, Value::Int(num)) => Some(Value::Float(*num as f64)),
            (ValueType::Float, Value::Bool(flag)) => Some(Value::Float(*flag as i64 as f64)),
            (ValueType::Float, Value::String(text)) => {
                text.trim().parse().ok().map(Value::Float)
            }
            (ValueType::Bool, other) => Some(Value::Bool(other.truthy())),
            (ValueType::String, other) => Some(Value::String(other.to_string())),
            (ValueType::Point, Value::Int(_) | Value::Float(_)) => {
                let v = self.as_float()?;
                Some(Value::Point(v, v))
            }
            (ValueType::Point, other) if other.as_container().is_some() => {
                match other.elements().as_slice() {
                    [x, y] => Some(Value::Point(x.as_float()?, y.as_float()?)),
                    _ => None,
                }
            }
            (ValueType::Pair, other) if other.as_container().is_some() => {
                match other.elements().as_slice() {
                    [key, value] => Some(Value::pair(key.clone(), value.clone())),
                    _ => None,
                }
            }
            (ValueType::List, other) => Some(Value::list(other.elements())),
            (ValueType::Species, Value::String(name)) => Some(Value::Species(name.clone())),
            (ValueType::Species, Value::Agent(agent)) => {
                Some(Value::Species(agent.species_name()))
            }
            _ => None,
        }
    }

    /// Deep copy of the value: containers are duplicated, not shared.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(list) => Value::List(Arc::new(RwLock::new(list.read().clone()))),
            Value::Map(map) => Value::Map(Arc::new(RwLock::new(map.read().clone()))),
            Value::Matrix(matrix) => Value::Matrix(Arc::new(RwLock::new(matrix.read().clone()))),
            Value::Graph(graph) => Value::Graph(Arc::new(RwLock::new(graph.read().clone()))),
            other => other.clone(),
        }
    }

    /// Convert a JSON document into a runtime value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(num) => match num.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::String(text.clone()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::map(
                fields
                    .iter()
                    .map(|(key, value)| (Value::String(key.clone()), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Render the value as JSON (agents become their names).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(flag) => json!(flag),
            Value::Int(num) => json!(num),
            Value::Float(num) => json!(num),
            Value::String(text) => json!(text),
            Value::Point(x, y) => json!({ "x": x, "y": y }),
            Value::Pair(key, value) => json!([key.to_json(), value.to_json()]),
            Value::List(list) => {
                serde_json::Value::Array(list.read().items().iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map.read().entries() {
                    let key = match key {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    object.insert(key, value.to_json());
                }
                serde_json::Value::Object(object)
            }
            Value::Matrix(matrix) => {
                let matrix = matrix.read();
                let rows: Vec<serde_json::Value> = (0..matrix.rows())
                    .map(|row| {
                        serde_json::Value::Array(
                            matrix.row(row).iter().map(Value::to_json).collect(),
                        )
                    })
                    .collect();
                serde_json::Value::Array(rows)
            }
            Value::Graph(graph) => {
                let graph = graph.read();
                json!({
                    "vertices": graph.vertices().iter().map(Value::to_json).collect::<Vec<_>>(),
                    "edges": graph
                        .edges()
                        .iter()
                        .map(|edge| json!([edge.source.to_json(), edge.target.to_json(), edge.weight]))
                        .collect::<Vec<_>>(),
                })
            }
            Value::Agent(agent) => json!(agent.name()),
            Value::Species(name) => json!(name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Point(ax, ay), Value::Point(bx, by)) => ax == bx && ay == by,
            (Value::Pair(ak, av), Value::Pair(bk, bv)) => ak == bk && av == bv,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || a.read().items() == b.read().items()
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(a, b) || a.read().entries() == b.read().entries()
            }
            (Value::Matrix(a), Value::Matrix(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Value::Graph(a), Value::Graph(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Value::Agent(a), Value::Agent(b)) => a.id() == b.id(),
            (Value::Species(a), Value::Species(b)) => a == b,
            _ => false,
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(flag) => write!(f, "{}", flag),
            Value::Int(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{:?}", num),
            Value::String(text) => f.write_str(text),
            Value::Point(x, y) => write!(f, "{{{:?},{:?}}}", x, y),
            Value::Pair(key, value) => write!(f, "{}::{}", key, value),
            Value::List(list) => {
                f.write_str("[")?;
                write_joined(f, list.read().items())?;
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("[")?;
                for (idx, (key, value)) in map.read().entries().iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}::{}", key, value)?;
                }
                f.write_str("]")
            }
            Value::Matrix(matrix) => {
                let matrix = matrix.read();
                f.write_str("[")?;
                for row in 0..matrix.rows() {
                    if row > 0 {
                        f.write_str(";")?;
                    }
                    write_joined(f, matrix.row(row))?;
                }
                f.write_str("]")
            }
            Value::Graph(graph) => {
                let graph = graph.read();
                write!(
                    f,
                    "graph({} vertices, {} edges)",
                    graph.vertices().len(),
                    graph.edges().len()
                )
            }
            Value::Agent(agent) => f.write_str(agent.name()),
            Value::Species(name) => f.write_str(name),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(num: i64) -> Self {
        Value::Int(num)
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Value::Float(num)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<AgentRef> for Value {
    fn from(agent: AgentRef) -> Self {
        Value::Agent(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening_is_translatable() {
        assert!(ValueType::Int.is_translatable_into(ValueType::Float));
        assert!(ValueType::Float.is_translatable_into(ValueType::Int));
        assert!(ValueType::String.is_translatable_into(ValueType::Any));
        assert!(!ValueType::String.is_translatable_into(ValueType::Int));
    }

    #[test]
    fn test_cast_conversions() {
        assert_eq!(Value::Float(2.7).cast(ValueType::Int), Some(Value::Int(2)));
        assert_eq!(Value::Int(3).cast(ValueType::Float), Some(Value::Float(3.0)));
        assert_eq!(Value::from("12").cast(ValueType::Int), Some(Value::Int(12)));
        assert_eq!(Value::from("abc").cast(ValueType::Int), None);
        let pair = Value::list(vec![Value::Int(1), Value::Int(2)]).cast(ValueType::Point);
        assert_eq!(pair, Some(Value::Point(1.0, 2.0)));
    }

    #[test]
    fn test_elements_coerce_non_containers() {
        assert!(Value::Nil.elements().is_empty());
        assert_eq!(Value::Int(4).elements(), vec![Value::Int(4)]);
        assert_eq!(
            Value::pair(Value::Int(1), Value::from("a")).elements(),
            vec![Value::Int(1), Value::from("a")]
        );
    }

    #[test]
    fn test_containers_are_shared_handles() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        let copy = list.deep_copy();
        if let Value::List(inner) = &list {
            inner.write().items_mut().push(Value::Int(2));
        }
        assert_eq!(alias.elements().len(), 2);
        assert_eq!(copy.elements().len(), 1);
    }

    #[test]
    fn test_json_round_trip_preserves_map_order() {
        let json = serde_json::json!({ "b": 1, "a": [true, 2.5] });
        let value = Value::from_json(&json);
        assert_eq!(value.value_type(), ValueType::Map);
        assert_eq!(value.to_string(), "[b::1,a::[true,2.5]]");
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_type_descriptor_display() {
        assert_eq!(
            TypeDescriptor::container(ValueType::List, ValueType::Int).to_string(),
            "list<int>"
        );
        assert_eq!(
            TypeDescriptor::map(ValueType::String, ValueType::Float).to_string(),
            "map<string, float>"
        );
        assert!(TypeDescriptor::of(ValueType::Matrix).is_fixed_length());
    }
}
