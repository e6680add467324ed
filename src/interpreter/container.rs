//! Modifiable containers
//!
//! Lists, maps, matrices and graphs share the [`Modifiable`] protocol used by
//! the `add`, `remove` and `put` statements. Values hold containers through
//! [`Shared`](super::value::Shared) handles; [`ContainerRef`] gives uniform
//! locked access to whichever kind a value holds.

use super::value::{Shared, Value, ValueType};
use crate::runtime::error::{ContainerError, ContainerResult};

/// Mutation protocol implemented by every container kind.
pub trait Modifiable {
    /// Human-readable kind ("list", "map", ...).
    fn kind(&self) -> &'static str;

    /// Declared key (index) type.
    fn key_type(&self) -> ValueType;

    /// Declared content type.
    fn content_type(&self) -> ValueType;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the container has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the iterated elements.
    fn elements(&self) -> Vec<Value>;

    /// Append a value.
    fn add_value(&mut self, value: Value) -> ContainerResult<()>;

    /// Insert a value at an index.
    fn add_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()>;

    /// Append (or insert at `index`) several values, preserving their order.
    fn add_values(&mut self, index: Option<&Value>, values: Vec<Value>) -> ContainerResult<()> {
        match index {
            None => values.into_iter().try_for_each(|value| self.add_value(value)),
            Some(index) => values
                .into_iter()
                .try_for_each(|value| self.add_value_at_index(index, value)),
        }
    }

    /// Replace the value at an existing index (maps insert missing keys).
    fn set_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()>;

    /// Replace every value.
    fn set_all_values(&mut self, value: Value) -> ContainerResult<()>;

    /// Remove the first occurrence of a value; returns whether one was found.
    fn remove_value(&mut self, value: &Value) -> ContainerResult<bool>;

    /// Remove every occurrence of each of the values.
    fn remove_values(&mut self, values: &[Value]) -> ContainerResult<()> {
        for value in values {
            self.remove_all_occurrences(value)?;
        }
        Ok(())
    }

    /// Remove every occurrence of a value; returns how many were removed.
    fn remove_all_occurrences(&mut self, value: &Value) -> ContainerResult<usize>;

    /// Remove the element at an index.
    fn remove_index(&mut self, index: &Value) -> ContainerResult<()>;

    /// Remove the elements at several indexes.
    fn remove_indexes(&mut self, indexes: &[Value]) -> ContainerResult<()> {
        indexes.iter().try_for_each(|index| self.remove_index(index))
    }

    /// Remove every element.
    fn clear(&mut self) -> ContainerResult<()>;
}

fn invalid_index(index: &Value, container: &'static str) -> ContainerError {
    ContainerError::InvalidIndex {
        index: index.to_string(),
        container,
    }
}

/// Ordered list with a declared content type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListValue {
    content: ValueType,
    items: Vec<Value>,
}

impl ListValue {
    /// Create a list.
    pub fn new(content: ValueType, items: Vec<Value>) -> Self {
        Self { content, items }
    }

    /// Items in order.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Mutable access to the items.
    pub fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }

    /// Item at an index, if in bounds.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    fn position(&self, index: &Value, inclusive: bool) -> ContainerResult<usize> {
        let raw = match index {
            Value::Int(num) => *num,
            Value::Float(num) => *num as i64,
            other => return Err(invalid_index(other, "list")),
        };
        let bound = if inclusive {
            self.items.len()
        } else {
            self.items.len().saturating_sub(1)
        };
        if raw < 0 || raw as usize > bound || (!inclusive && self.items.is_empty()) {
            return Err(ContainerError::IndexOutOfBounds {
                index: raw,
                len: self.items.len(),
            });
        }
        Ok(raw as usize)
    }

    /// Replace the elements in `from..to` by `value` (the elements of
    /// `value` when it is itself a list).
    pub fn replace_range(&mut self, from: i64, to: i64, value: Value) -> ContainerResult<()> {
        let len = self.items.len() as i64;
        if from < 0 || to > len {
            return Err(ContainerError::IndexOutOfBounds {
                index: if from < 0 { from } else { to },
                len: self.items.len(),
            });
        }
        if from > to {
            return Err(ContainerError::InvalidRange { from, to });
        }
        let replacement = match &value {
            Value::List(_) => value.elements(),
            _ => vec![value],
        };
        self.items
            .splice(from as usize..to as usize, replacement);
        Ok(())
    }
}

impl Modifiable for ListValue {
    fn kind(&self) -> &'static str {
        "list"
    }

    fn key_type(&self) -> ValueType {
        ValueType::Int
    }

    fn content_type(&self) -> ValueType {
        self.content
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn elements(&self) -> Vec<Value> {
        self.items.clone()
    }

    fn add_value(&mut self, value: Value) -> ContainerResult<()> {
        self.items.push(value);
        Ok(())
    }

    fn add_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        let position = self.position(index, true)?;
        self.items.insert(position, value);
        Ok(())
    }

    fn add_values(&mut self, index: Option<&Value>, values: Vec<Value>) -> ContainerResult<()> {
        match index {
            None => self.items.extend(values),
            Some(index) => {
                let position = self.position(index, true)?;
                self.items.splice(position..position, values);
            }
        }
        Ok(())
    }

    fn set_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        let position = self.position(index, false)?;
        self.items[position] = value;
        Ok(())
    }

    fn set_all_values(&mut self, value: Value) -> ContainerResult<()> {
        for item in self.items.iter_mut() {
            *item = value.clone();
        }
        Ok(())
    }

    fn remove_value(&mut self, value: &Value) -> ContainerResult<bool> {
        match self.items.iter().position(|item| item == value) {
            Some(position) => {
                self.items.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_all_occurrences(&mut self, value: &Value) -> ContainerResult<usize> {
        let before = self.items.len();
        self.items.retain(|item| item != value);
        Ok(before - self.items.len())
    }

    fn remove_index(&mut self, index: &Value) -> ContainerResult<()> {
        let position = self.position(index, false)?;
        self.items.remove(position);
        Ok(())
    }

    fn remove_indexes(&mut self, indexes: &[Value]) -> ContainerResult<()> {
        let mut positions = indexes
            .iter()
            .map(|index| self.position(index, false))
            .collect::<ContainerResult<Vec<_>>>()?;
        positions.sort_unstable();
        positions.dedup();
        for position in positions.into_iter().rev() {
            self.items.remove(position);
        }
        Ok(())
    }

    fn clear(&mut self) -> ContainerResult<()> {
        self.items.clear();
        Ok(())
    }
}

/// Map preserving key insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapValue {
    key: ValueType,
    content: ValueType,
    entries: Vec<(Value, Value)>,
}

impl MapValue {
    /// Create an empty map.
    pub fn new(key: ValueType, content: ValueType) -> Self {
        Self {
            key,
            content,
            entries: Vec::new(),
        }
    }

    /// Entries in key insertion order.
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Value bound to a key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn put(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

impl Modifiable for MapValue {
    fn kind(&self) -> &'static str {
        "map"
    }

    fn key_type(&self) -> ValueType {
        self.key
    }

    fn content_type(&self) -> ValueType {
        self.content
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn elements(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }

    /// A pair is added as an entry; any other value becomes its own key.
    fn add_value(&mut self, value: Value) -> ContainerResult<()> {
        match value {
            Value::Pair(key, value) => self.put(*key, *value),
            other => self.put(other.clone(), other),
        }
        Ok(())
    }

    fn add_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        self.put(index.clone(), value);
        Ok(())
    }

    fn set_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        self.put(index.clone(), value);
        Ok(())
    }

    fn set_all_values(&mut self, value: Value) -> ContainerResult<()> {
        for entry in self.entries.iter_mut() {
            entry.1 = value.clone();
        }
        Ok(())
    }

    fn remove_value(&mut self, value: &Value) -> ContainerResult<bool> {
        match self.entries.iter().position(|(_, existing)| existing == value) {
            Some(position) => {
                self.entries.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_all_occurrences(&mut self, value: &Value) -> ContainerResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|(_, existing)| existing != value);
        Ok(before - self.entries.len())
    }

    /// Removing a missing key is a no-op.
    fn remove_index(&mut self, index: &Value) -> ContainerResult<()> {
        self.entries.retain(|(key, _)| key != index);
        Ok(())
    }

    fn clear(&mut self) -> ContainerResult<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Fixed-size, row-major matrix indexed by `{col, row}` points.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixValue {
    cols: usize,
    rows: usize,
    content: ValueType,
    cells: Vec<Value>,
}

impl MatrixValue {
    /// Create a matrix filled with `fill`.
    pub fn new(cols: usize, rows: usize, fill: Value) -> Self {
        let content = match fill.value_type() {
            ValueType::Nil => ValueType::Any,
            other => other,
        };
        Self {
            cols,
            rows,
            content,
            cells: vec![fill; cols * rows],
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Cells of one row.
    pub fn row(&self, row: usize) -> &[Value] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Cell at `(col, row)`.
    pub fn get(&self, col: usize, row: usize) -> Option<&Value> {
        if col < self.cols && row < self.rows {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Linear cell offset of a point, `[col, row]` list/pair, or linear index.
    fn offset(&self, index: &Value) -> ContainerResult<usize> {
        let (col, row) = match index {
            Value::Int(linear) => {
                if *linear < 0 || *linear as usize >= self.cells.len() {
                    return Err(ContainerError::IndexOutOfBounds {
                        index: *linear,
                        len: self.cells.len(),
                    });
                }
                return Ok(*linear as usize);
            }
            Value::Point(x, y) => (*x as i64, *y as i64),
            other => match other.elements().as_slice() {
                [x, y] => match (x.as_int(), y.as_int()) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(invalid_index(index, "matrix")),
                },
                _ => return Err(invalid_index(index, "matrix")),
            },
        };
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return Err(ContainerError::InvalidIndex {
                index: format!("{{{},{}}}", col, row),
                container: "matrix",
            });
        }
        Ok(row as usize * self.cols + col as usize)
    }
}

impl Modifiable for MatrixValue {
    fn kind(&self) -> &'static str {
        "matrix"
    }

    fn key_type(&self) -> ValueType {
        ValueType::Point
    }

    fn content_type(&self) -> ValueType {
        self.content
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn elements(&self) -> Vec<Value> {
        self.cells.clone()
    }

    fn add_value(&mut self, _value: Value) -> ContainerResult<()> {
        Err(ContainerError::FixedLength("matrix"))
    }

    fn add_value_at_index(&mut self, _index: &Value, _value: Value) -> ContainerResult<()> {
        Err(ContainerError::FixedLength("matrix"))
    }

    fn set_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        let offset = self.offset(index)?;
        self.cells[offset] = value;
        Ok(())
    }

    fn set_all_values(&mut self, value: Value) -> ContainerResult<()> {
        for cell in self.cells.iter_mut() {
            *cell = value.clone();
        }
        Ok(())
    }

    fn remove_value(&mut self, _value: &Value) -> ContainerResult<bool> {
        Err(ContainerError::FixedLength("matrix"))
    }

    fn remove_all_occurrences(&mut self, _value: &Value) -> ContainerResult<usize> {
        Err(ContainerError::FixedLength("matrix"))
    }

    fn remove_index(&mut self, _index: &Value) -> ContainerResult<()> {
        Err(ContainerError::FixedLength("matrix"))
    }

    fn clear(&mut self) -> ContainerResult<()> {
        Err(ContainerError::FixedLength("matrix"))
    }
}

/// Weighted edge of a [`GraphValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    /// Source vertex
    pub source: Value,
    /// Target vertex
    pub target: Value,
    /// Edge weight
    pub weight: f64,
}

/// Directed weighted graph. Pairs address edges; other values are vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphValue {
    vertices: Vec<Value>,
    edges: Vec<GraphEdge>,
}

impl GraphValue {
    /// Vertices in insertion order.
    pub fn vertices(&self) -> &[Value] {
        &self.vertices
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Add a vertex if absent.
    pub fn add_vertex(&mut self, vertex: Value) {
        if !self.vertices.contains(&vertex) {
            self.vertices.push(vertex);
        }
    }

    /// Add an edge (and its endpoints) or update its weight.
    pub fn add_edge(&mut self, source: Value, target: Value, weight: f64) {
        self.add_vertex(source.clone());
        self.add_vertex(target.clone());
        match self.edge_mut(&source, &target) {
            Some(edge) => edge.weight = weight,
            None => self.edges.push(GraphEdge {
                source,
                target,
                weight,
            }),
        }
    }

    /// Weight of an edge, if present.
    pub fn weight(&self, source: &Value, target: &Value) -> Option<f64> {
        self.edges
            .iter()
            .find(|edge| edge.source == *source && edge.target == *target)
            .map(|edge| edge.weight)
    }

    fn edge_mut(&mut self, source: &Value, target: &Value) -> Option<&mut GraphEdge> {
        self.edges
            .iter_mut()
            .find(|edge| edge.source == *source && edge.target == *target)
    }

    fn endpoints(index: &Value) -> ContainerResult<(Value, Value)> {
        match index {
            Value::Pair(source, target) => Ok(((**source).clone(), (**target).clone())),
            other => Err(invalid_index(other, "graph")),
        }
    }

    fn weight_of(value: &Value) -> ContainerResult<f64> {
        match value {
            Value::Nil => Ok(1.0),
            other => other.as_float().ok_or_else(|| ContainerError::InvalidValue {
                value: other.to_string(),
                container: "graph",
            }),
        }
    }
}

impl Modifiable for GraphValue {
    fn kind(&self) -> &'static str {
        "graph"
    }

    fn key_type(&self) -> ValueType {
        ValueType::Pair
    }

    fn content_type(&self) -> ValueType {
        ValueType::Any
    }

    fn len(&self) -> usize {
        self.edges.len()
    }

    fn elements(&self) -> Vec<Value> {
        self.edges
            .iter()
            .map(|edge| Value::pair(edge.source.clone(), edge.target.clone()))
            .collect()
    }

    fn add_value(&mut self, value: Value) -> ContainerResult<()> {
        match value {
            Value::Pair(source, target) => self.add_edge(*source, *target, 1.0),
            vertex => self.add_vertex(vertex),
        }
        Ok(())
    }

    fn add_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        let (source, target) = Self::endpoints(index)?;
        let weight = Self::weight_of(&value)?;
        self.add_edge(source, target, weight);
        Ok(())
    }

    fn set_value_at_index(&mut self, index: &Value, value: Value) -> ContainerResult<()> {
        self.add_value_at_index(index, value)
    }

    fn set_all_values(&mut self, value: Value) -> ContainerResult<()> {
        let weight = Self::weight_of(&value)?;
        for edge in self.edges.iter_mut() {
            edge.weight = weight;
        }
        Ok(())
    }

    fn remove_value(&mut self, value: &Value) -> ContainerResult<bool> {
        match value {
            Value::Pair(source, target) => {
                let before = self.edges.len();
                self.edges
                    .retain(|edge| !(edge.source == **source && edge.target == **target));
                Ok(before != self.edges.len())
            }
            vertex => {
                let before = self.vertices.len();
                self.vertices.retain(|existing| existing != vertex);
                self.edges
                    .retain(|edge| edge.source != *vertex && edge.target != *vertex);
                Ok(before != self.vertices.len())
            }
        }
    }

    fn remove_all_occurrences(&mut self, value: &Value) -> ContainerResult<usize> {
        Ok(self.remove_value(value)? as usize)
    }

    fn remove_index(&mut self, index: &Value) -> ContainerResult<()> {
        Self::endpoints(index)?;
        self.remove_value(index)?;
        Ok(())
    }

    fn clear(&mut self) -> ContainerResult<()> {
        self.vertices.clear();
        self.edges.clear();
        Ok(())
    }
}

/// Uniform handle on a shared container of any kind.
#[derive(Debug, Clone)]
pub enum ContainerRef {
    /// List handle
    List(Shared<ListValue>),
    /// Map handle
    Map(Shared<MapValue>),
    /// Matrix handle
    Matrix(Shared<MatrixValue>),
    /// Graph handle
    Graph(Shared<GraphValue>),
}

impl ContainerRef {
    /// Run `f` with read access to the container.
    pub fn with<R>(&self, f: impl FnOnce(&dyn Modifiable) -> R) -> R {
        match self {
            ContainerRef::List(inner) => f(&*inner.read()),
            ContainerRef::Map(inner) => f(&*inner.read()),
            ContainerRef::Matrix(inner) => f(&*inner.read()),
            ContainerRef::Graph(inner) => f(&*inner.read()),
        }
    }

    /// Run `f` with write access to the container.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn Modifiable) -> R) -> R {
        match self {
            ContainerRef::List(inner) => f(&mut *inner.write()),
            ContainerRef::Map(inner) => f(&mut *inner.write()),
            ContainerRef::Matrix(inner) => f(&mut *inner.write()),
            ContainerRef::Graph(inner) => f(&mut *inner.write()),
        }
    }

    /// Container kind.
    pub fn kind(&self) -> &'static str {
        self.with(|container| container.kind())
    }

    /// Declared key type.
    pub fn key_type(&self) -> ValueType {
        self.with(|container| container.key_type())
    }

    /// Declared content type.
    pub fn content_type(&self) -> ValueType {
        self.with(|container| container.content_type())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.with(|container| container.len())
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the elements.
    pub fn elements(&self) -> Vec<Value> {
        self.with(|container| container.elements())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_list_set_and_bounds() {
        let mut list = ListValue::new(ValueType::Int, ints(&[1, 2, 3, 4, 5]));
        list.set_value_at_index(&Value::Int(1), Value::Int(-10)).unwrap();
        assert_eq!(list.items(), ints(&[1, -10, 3, 4, 5]).as_slice());

        let err = list.set_value_at_index(&Value::Int(5), Value::Int(0)).unwrap_err();
        assert_eq!(err, ContainerError::IndexOutOfBounds { index: 5, len: 5 });
        let err = list.remove_index(&Value::from("x")).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidIndex { .. }));
    }

    #[test]
    fn test_list_insert_at_end_and_multiple() {
        let mut list = ListValue::new(ValueType::Int, ints(&[1, 2]));
        list.add_value_at_index(&Value::Int(2), Value::Int(3)).unwrap();
        list.add_values(Some(&Value::Int(0)), ints(&[7, 8])).unwrap();
        assert_eq!(list.items(), ints(&[7, 8, 1, 2, 3]).as_slice());
    }

    #[test]
    fn test_list_remove_variants() {
        let mut list = ListValue::new(ValueType::Int, ints(&[1, 2, 1, 3, 1]));
        assert!(list.remove_value(&Value::Int(1)).unwrap());
        assert_eq!(list.items(), ints(&[2, 1, 3, 1]).as_slice());
        assert_eq!(list.remove_all_occurrences(&Value::Int(1)).unwrap(), 2);
        assert_eq!(list.items(), ints(&[2, 3]).as_slice());

        let mut list = ListValue::new(ValueType::Int, ints(&[10, 11, 12, 13]));
        list.remove_indexes(&ints(&[0, 2])).unwrap();
        assert_eq!(list.items(), ints(&[11, 13]).as_slice());
    }

    #[test]
    fn test_list_replace_range() {
        let mut list = ListValue::new(ValueType::Int, ints(&[1, 2, 3, 4]));
        list.replace_range(1, 3, Value::Int(0)).unwrap();
        assert_eq!(list.items(), ints(&[1, 0, 4]).as_slice());
        assert!(matches!(
            list.replace_range(2, 1, Value::Nil),
            Err(ContainerError::InvalidRange { from: 2, to: 1 })
        ));
    }

    #[test]
    fn test_map_put_keeps_insertion_order() {
        let mut map = MapValue::new(ValueType::String, ValueType::Int);
        map.set_value_at_index(&Value::from("b"), Value::Int(1)).unwrap();
        map.set_value_at_index(&Value::from("a"), Value::Int(2)).unwrap();
        map.set_value_at_index(&Value::from("b"), Value::Int(3)).unwrap();
        assert_eq!(map.keys(), vec![Value::from("b"), Value::from("a")]);
        assert_eq!(map.get(&Value::from("b")), Some(&Value::Int(3)));

        map.add_value(Value::pair(Value::from("c"), Value::Int(4))).unwrap();
        assert_eq!(map.len(), 3);
        map.set_all_values(Value::Int(0)).unwrap();
        assert_eq!(map.elements(), ints(&[0, 0, 0]));
    }

    #[test]
    fn test_matrix_is_fixed_length() {
        let mut matrix = MatrixValue::new(3, 2, Value::Int(0));
        matrix.set_value_at_index(&Value::Point(2.0, 1.0), Value::Int(9)).unwrap();
        matrix
            .set_value_at_index(&Value::list(ints(&[0, 1])), Value::Int(4))
            .unwrap();
        assert_eq!(matrix.get(2, 1), Some(&Value::Int(9)));
        assert_eq!(matrix.row(1), ints(&[4, 0, 9]).as_slice());
        assert_eq!(
            matrix.add_value(Value::Int(1)),
            Err(ContainerError::FixedLength("matrix"))
        );
        assert!(matrix
            .set_value_at_index(&Value::Point(3.0, 0.0), Value::Int(1))
            .is_err());
    }

    #[test]
    fn test_graph_edges_and_vertices() {
        let mut graph = GraphValue::default();
        graph.add_value(Value::from("a")).unwrap();
        graph
            .add_value_at_index(&Value::pair(Value::from("a"), Value::from("b")), Value::Float(2.5))
            .unwrap();
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.weight(&Value::from("a"), &Value::from("b")), Some(2.5));

        graph.set_all_values(Value::Int(4)).unwrap();
        assert_eq!(graph.weight(&Value::from("a"), &Value::from("b")), Some(4.0));

        assert!(graph.remove_value(&Value::from("b")).unwrap());
        assert!(graph.edges().is_empty());
        assert!(graph.remove_index(&Value::from("a")).is_err());
    }

    #[test]
    fn test_container_ref_dispatches() {
        let value = Value::list(ints(&[1, 2]));
        let container = value.as_container().unwrap();
        container
            .with_mut(|inner| inner.add_value(Value::Int(3)))
            .unwrap();
        assert_eq!(container.kind(), "list");
        assert_eq!(container.len(), 3);
        assert_eq!(value.elements(), ints(&[1, 2, 3]));
    }
}
