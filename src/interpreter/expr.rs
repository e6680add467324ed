//! Expressions
//!
//! Statements only ever ask an expression three things: evaluate it, what is
//! its static type, and is it constant. [`Expression`] is that contract.
//! [`Expr`] is the reference tree shipped with the runtime (serializable, so
//! models can be loaded from JSON); embedders plug their own evaluators in
//! through [`Expr::native`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::container::ContainerRef;
use super::value::{TypeDescriptor, Value, ValueType};
use crate::runtime::error::{ExecError, ExecResult};
use crate::runtime::scope::Scope;

/// Evaluable expression
pub trait Expression: Send + Sync + fmt::Debug {
    /// Evaluate in `scope`
    fn evaluate(&self, scope: &mut Scope) -> ExecResult<Value>;

    /// Type known before evaluation
    fn static_type(&self) -> TypeDescriptor {
        TypeDescriptor::any()
    }

    /// Whether the expression always evaluates to the same value
    fn is_const(&self) -> bool {
        false
    }

    /// Source-like rendering for diagnostics
    fn literal(&self) -> String;
}

/// Handle on an embedder-provided expression
#[derive(Clone)]
pub struct NativeExpr(pub Arc<dyn Expression>);

impl fmt::Debug for NativeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Logical negation
    Not,
    /// Arithmetic negation
    Neg,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// `+` (numbers, strings, list concatenation, points)
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (always a float)
    Div,
    /// `mod`
    Mod,
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and` (short-circuit)
    And,
    /// `or` (short-circuit)
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// Number of elements (or characters)
    Length,
    /// Whether a container holds an element
    Contains,
    /// Element at an index or key
    At,
    /// Whether an agent is dead (nil counts as dead)
    Dead,
    /// Sum of numeric elements
    Sum,
}

/// Reference expression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// `nil`
    Nil,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Variable (frame variable, then attribute of the current agent)
    Var {
        /// Variable name
        name: String,
        /// Declared type, used for construction-time validation
        #[serde(default)]
        ty: TypeDescriptor,
    },
    /// The executing agent
    SelfAgent,
    /// The caller of the innermost remote sequence
    Myself,
    /// Attribute of an agent (or entry of a string-keyed map)
    Attribute {
        /// Agent expression
        target: Box<Expr>,
        /// Attribute name
        name: String,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// List literal (a fresh list per evaluation)
    List {
        /// Items
        items: Vec<Expr>,
        /// Declared content type
        #[serde(default)]
        content: ValueType,
    },
    /// Map literal (a fresh map per evaluation)
    Map {
        /// Entries, in order
        entries: Vec<(Expr, Expr)>,
    },
    /// Pair literal `key::value`
    Pair {
        /// Key
        key: Box<Expr>,
        /// Value
        value: Box<Expr>,
    },
    /// Point literal `{x, y}`
    Point {
        /// Abscissa
        x: Box<Expr>,
        /// Ordinate
        y: Box<Expr>,
    },
    /// Matrix of `cols` x `rows` filled with `fill`
    Matrix {
        /// Columns
        cols: Box<Expr>,
        /// Rows
        rows: Box<Expr>,
        /// Initial cell value
        fill: Box<Expr>,
    },
    /// Empty graph
    Graph,
    /// Species reference
    Species(String),
    /// Live agents of a species reachable from the executing agent
    Population(String),
    /// Explicit cast
    Cast {
        /// Target type
        to: ValueType,
        /// Casted expression
        expr: Box<Expr>,
    },
    /// Built-in function call
    Call {
        /// Function
        function: Builtin,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Embedder-provided expression
    #[serde(skip)]
    Native(NativeExpr),
}

impl Expr {
    /// Variable reference with no declared type
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var {
            name: name.into(),
            ty: TypeDescriptor::any(),
        }
    }

    /// Variable reference with a declared type
    pub fn typed_var(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Expr::Var {
            name: name.into(),
            ty,
        }
    }

    /// String literal
    pub fn str(text: impl Into<String>) -> Self {
        Expr::Str(text.into())
    }

    /// Binary operation
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// List literal
    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List {
            items,
            content: ValueType::Any,
        }
    }

    /// Pair literal
    pub fn pair(key: Expr, value: Expr) -> Self {
        Expr::Pair {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Attribute access
    pub fn attribute(target: Expr, name: impl Into<String>) -> Self {
        Expr::Attribute {
            target: Box::new(target),
            name: name.into(),
        }
    }

    /// Built-in call
    pub fn call(function: Builtin, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    /// Wrap an embedder-provided expression
    pub fn native(expression: impl Expression + 'static) -> Self {
        Expr::Native(NativeExpr(Arc::new(expression)))
    }

    /// Value of a constant expression, computed without a scope
    pub fn const_value(&self) -> Option<Value> {
        match self {
            Expr::Nil => Some(Value::Nil),
            Expr::Bool(flag) => Some(Value::Bool(*flag)),
            Expr::Int(num) => Some(Value::Int(*num)),
            Expr::Float(num) => Some(Value::Float(*num)),
            Expr::Str(text) => Some(Value::String(text.clone())),
            Expr::Species(name) => Some(Value::Species(name.clone())),
            Expr::Unary { op, operand } => apply_unary(*op, operand.const_value()?).ok(),
            Expr::Binary { op, left, right } => {
                apply_binary(*op, left.const_value()?, right.const_value()?).ok()
            }
            Expr::Pair { key, value } => Some(Value::pair(key.const_value()?, value.const_value()?)),
            Expr::Point { x, y } => Some(Value::Point(
                x.const_value()?.as_float()?,
                y.const_value()?.as_float()?,
            )),
            Expr::Cast { to, expr } => expr.const_value()?.cast(*to),
            _ => None,
        }
    }

    /// Replace constant sub-trees by their value
    pub fn folded(self) -> Expr {
        match self.const_value() {
            Some(Value::Nil) => Expr::Nil,
            Some(Value::Bool(flag)) => Expr::Bool(flag),
            Some(Value::Int(num)) => Expr::Int(num),
            Some(Value::Float(num)) => Expr::Float(num),
            Some(Value::String(text)) => Expr::Str(text),
            _ => self,
        }
    }
}

fn invalid(op: &str, detail: String) -> ExecError {
    ExecError::InvalidOperation {
        op: op.to_string(),
        detail,
    }
}

fn apply_unary(op: UnaryOp, operand: Value) -> ExecResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Value::Int(num)) => Ok(Value::Int(-num)),
        (UnaryOp::Neg, Value::Float(num)) => Ok(Value::Float(-num)),
        (UnaryOp::Neg, Value::Point(x, y)) => Ok(Value::Point(-x, -y)),
        (UnaryOp::Neg, other) => Err(invalid("-", format!("cannot negate {}", other.value_type()))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> ExecResult<bool> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let ordering = ordering.ok_or_else(|| {
        invalid(
            op.symbol(),
            format!("cannot compare {} and {}", left.value_type(), right.value_type()),
        )
    })?;
    Ok(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

/// Apply a binary operator to evaluated operands.
pub(crate) fn apply_binary(op: BinaryOp, left: Value, right: Value) -> ExecResult<Value> {
    use BinaryOp::*;
    match op {
        Eq => return Ok(Value::Bool(left == right)),
        Ne => return Ok(Value::Bool(left != right)),
        Lt | Le | Gt | Ge => return compare(op, &left, &right).map(Value::Bool),
        And => return Ok(Value::Bool(left.truthy() && right.truthy())),
        Or => return Ok(Value::Bool(left.truthy() || right.truthy())),
        _ => {}
    }
    match (op, &left, &right) {
        (Add, Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
        (Add, Value::List(_), other) => {
            let mut items = left.elements();
            match other {
                Value::List(_) => items.extend(other.elements()),
                scalar => items.push(scalar.clone()),
            }
            Ok(Value::list(items))
        }
        (Add, Value::Point(ax, ay), Value::Point(bx, by)) => Ok(Value::Point(ax + bx, ay + by)),
        (Sub, Value::Point(ax, ay), Value::Point(bx, by)) => Ok(Value::Point(ax - bx, ay - by)),
        (Div | Mod, _, divisor) if divisor.as_float() == Some(0.0) => {
            Err(invalid(op.symbol(), "division by zero".to_string()))
        }
        (_, Value::Int(a), Value::Int(b)) => Ok(match op {
            Add => Value::Int(a.wrapping_add(*b)),
            Sub => Value::Int(a.wrapping_sub(*b)),
            Mul => Value::Int(a.wrapping_mul(*b)),
            Div => Value::Float(*a as f64 / *b as f64),
            _ => Value::Int(a.wrapping_rem(*b)),
        }),
        (_, a, b) => match (a.as_float(), b.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            })),
            _ => Err(invalid(
                op.symbol(),
                format!("{} and {}", left.value_type(), right.value_type()),
            )),
        },
    }
}

fn element_at(container: &ContainerRef, index: &Value) -> Option<Value> {
    match container {
        ContainerRef::List(list) => {
            let position = usize::try_from(index.as_int()?).ok()?;
            list.read().get(position).cloned()
        }
        ContainerRef::Map(map) => map.read().get(index).cloned(),
        ContainerRef::Matrix(matrix) => {
            let (col, row) = match index {
                Value::Point(x, y) => (*x as usize, *y as usize),
                other => match other.elements().as_slice() {
                    [x, y] => (
                        usize::try_from(x.as_int()?).ok()?,
                        usize::try_from(y.as_int()?).ok()?,
                    ),
                    _ => return None,
                },
            };
            matrix.read().get(col, row).cloned()
        }
        ContainerRef::Graph(graph) => match index {
            Value::Pair(source, target) => graph.read().weight(source, target).map(Value::Float),
            _ => None,
        },
    }
}

fn call_builtin(function: Builtin, args: Vec<Value>) -> ExecResult<Value> {
    let arity_error = || invalid(&format!("{:?}", function).to_lowercase(), "wrong number of arguments".into());
    match (function, args.as_slice()) {
        (Builtin::Length, [value]) => Ok(Value::Int(match value {
            Value::String(text) => text.chars().count() as i64,
            other => match other.as_container() {
                Some(container) => container.len() as i64,
                None => other.elements().len() as i64,
            },
        })),
        (Builtin::Contains, [container, item]) => {
            Ok(Value::Bool(container.elements().contains(item)))
        }
        (Builtin::At, [container, index]) => match container.as_container() {
            Some(handle) => Ok(element_at(&handle, index).unwrap_or(Value::Nil)),
            None => Err(invalid("at", format!("{} is not a container", container.value_type()))),
        },
        (Builtin::Dead, [agent]) => match agent {
            Value::Nil => Ok(Value::Bool(true)),
            Value::Agent(agent) => Ok(Value::Bool(agent.is_dead())),
            other => Err(invalid("dead", format!("{} is not an agent", other.value_type()))),
        },
        (Builtin::Sum, [container]) => container
            .elements()
            .into_iter()
            .try_fold(Value::Int(0), |acc, item| apply_binary(BinaryOp::Add, acc, item)),
        _ => Err(arity_error()),
    }
}

impl Expression for Expr {
    fn evaluate(&self, scope: &mut Scope) -> ExecResult<Value> {
        match self {
            Expr::Native(native) => native.0.evaluate(scope),
            Expr::Var { name, .. } => {
                if let Some(value) = scope.get_var(name) {
                    return Ok(value);
                }
                scope
                    .agent()
                    .and_then(|agent| agent.attribute(name))
                    .ok_or_else(|| ExecError::UnknownVariable(name.clone()))
            }
            Expr::SelfAgent => Ok(scope.agent().cloned().map(Value::Agent).unwrap_or_default()),
            Expr::Myself => Ok(scope.myself().map(Value::Agent).unwrap_or_default()),
            Expr::Attribute { target, name } => match target.evaluate(scope)? {
                Value::Agent(agent) => agent
                    .attribute(name)
                    .ok_or_else(|| ExecError::UnknownVariable(format!("{}.{}", agent.name(), name))),
                Value::Map(map) => Ok(map
                    .read()
                    .get(&Value::String(name.clone()))
                    .cloned()
                    .unwrap_or_default()),
                Value::Nil => Err(ExecError::NilAgent {
                    statement: format!("access to {}", name),
                }),
                other => Err(ExecError::NotAnAgent {
                    statement: format!("access to {}", name),
                    found: other.to_string(),
                }),
            },
            Expr::Unary { op, operand } => apply_unary(*op, operand.evaluate(scope)?),
            Expr::Binary { op: BinaryOp::And, left, right } => {
                if !left.evaluate(scope)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.evaluate(scope)?.truthy()))
            }
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                if left.evaluate(scope)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.evaluate(scope)?.truthy()))
            }
            Expr::Binary { op, left, right } => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                apply_binary(*op, left, right)
            }
            Expr::List { items, content } => {
                let values = items
                    .iter()
                    .map(|item| item.evaluate(scope))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(Value::typed_list(*content, values))
            }
            Expr::Map { entries } => {
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    values.push((key.evaluate(scope)?, value.evaluate(scope)?));
                }
                Ok(Value::map(values))
            }
            Expr::Pair { key, value } => Ok(Value::pair(key.evaluate(scope)?, value.evaluate(scope)?)),
            Expr::Point { x, y } => {
                let x = x.evaluate(scope)?;
                let y = y.evaluate(scope)?;
                match (x.as_float(), y.as_float()) {
                    (Some(x), Some(y)) => Ok(Value::Point(x, y)),
                    _ => Err(invalid("point", format!("{{{}, {}}}", x, y))),
                }
            }
            Expr::Matrix { cols, rows, fill } => {
                let cols = cols.evaluate(scope)?.as_int().unwrap_or(0).max(0) as usize;
                let rows = rows.evaluate(scope)?.as_int().unwrap_or(0).max(0) as usize;
                Ok(Value::matrix(cols, rows, fill.evaluate(scope)?))
            }
            Expr::Graph => Ok(Value::graph()),
            Expr::Population(species) => {
                let world = scope.world();
                let members = match scope.agent().and_then(|agent| world.population_for(agent, species)) {
                    Some(population) => world.members(&population.host, species),
                    None => world.agents_of(species),
                };
                Ok(Value::typed_list(
                    ValueType::Agent,
                    members.into_iter().map(Value::Agent).collect(),
                ))
            }
            Expr::Cast { to, expr } => {
                let value = expr.evaluate(scope)?;
                value.cast(*to).ok_or_else(|| {
                    invalid("cast", format!("cannot cast {} to {}", value.value_type(), to))
                })
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<ExecResult<Vec<_>>>()?;
                call_builtin(*function, values)
            }
            constant => constant
                .const_value()
                .ok_or_else(|| invalid("literal", constant.literal())),
        }
    }

    fn static_type(&self) -> TypeDescriptor {
        match self {
            Expr::Nil => TypeDescriptor::of(ValueType::Nil),
            Expr::Bool(_) => TypeDescriptor::of(ValueType::Bool),
            Expr::Int(_) => TypeDescriptor::of(ValueType::Int),
            Expr::Float(_) => TypeDescriptor::of(ValueType::Float),
            Expr::Str(_) => TypeDescriptor::of(ValueType::String),
            Expr::Var { ty, .. } => *ty,
            Expr::SelfAgent | Expr::Myself => TypeDescriptor::of(ValueType::Agent),
            Expr::Unary { op: UnaryOp::Not, .. } => TypeDescriptor::of(ValueType::Bool),
            Expr::Unary { operand, .. } => operand.static_type(),
            Expr::Binary { op, left, right } => {
                if op.is_comparison() {
                    return TypeDescriptor::of(ValueType::Bool);
                }
                let (left, right) = (left.static_type().base, right.static_type().base);
                let base = match (op, left, right) {
                    (BinaryOp::Div, _, _) => ValueType::Float,
                    (BinaryOp::Add, ValueType::String, _) => ValueType::String,
                    (BinaryOp::Add, ValueType::List, _) => ValueType::List,
                    (_, ValueType::Int, ValueType::Int) => ValueType::Int,
                    (_, a, b) if a.is_numeric() && b.is_numeric() => ValueType::Float,
                    (_, ValueType::Point, ValueType::Point) => ValueType::Point,
                    _ => ValueType::Any,
                };
                TypeDescriptor::of(base)
            }
            Expr::List { content, .. } => TypeDescriptor::container(ValueType::List, *content),
            Expr::Map { .. } => TypeDescriptor::of(ValueType::Map),
            Expr::Pair { .. } => TypeDescriptor::of(ValueType::Pair),
            Expr::Point { .. } => TypeDescriptor::of(ValueType::Point),
            Expr::Matrix { fill, .. } => {
                TypeDescriptor::container(ValueType::Matrix, fill.static_type().base)
            }
            Expr::Graph => TypeDescriptor::of(ValueType::Graph),
            Expr::Species(_) => TypeDescriptor::of(ValueType::Species),
            Expr::Population(_) => TypeDescriptor::container(ValueType::List, ValueType::Agent),
            Expr::Cast { to, .. } => TypeDescriptor::of(*to),
            Expr::Call { function, .. } => match function {
                Builtin::Length => TypeDescriptor::of(ValueType::Int),
                Builtin::Contains | Builtin::Dead => TypeDescriptor::of(ValueType::Bool),
                Builtin::At | Builtin::Sum => TypeDescriptor::any(),
            },
            Expr::Native(native) => native.0.static_type(),
            Expr::Attribute { .. } => TypeDescriptor::any(),
        }
    }

    fn is_const(&self) -> bool {
        match self {
            Expr::Native(native) => native.0.is_const(),
            other => other.const_value().is_some(),
        }
    }

    fn literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Nil => f.write_str("nil"),
            Expr::Bool(flag) => write!(f, "{}", flag),
            Expr::Int(num) => write!(f, "{}", num),
            Expr::Float(num) => write!(f, "{:?}", num),
            Expr::Str(text) => write!(f, "'{}'", text),
            Expr::Var { name, .. } => f.write_str(name),
            Expr::SelfAgent => f.write_str("self"),
            Expr::Myself => f.write_str("myself"),
            Expr::Attribute { target, name } => write!(f, "{}.{}", target, name),
            Expr::Unary { op: UnaryOp::Not, operand } => write!(f, "!{}", operand),
            Expr::Unary { op: UnaryOp::Neg, operand } => write!(f, "-{}", operand),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::List { items, .. } => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expr::Map { entries } => {
                f.write_str("[")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}::{}", key, value)?;
                }
                f.write_str("]")
            }
            Expr::Pair { key, value } => write!(f, "{}::{}", key, value),
            Expr::Point { x, y } => write!(f, "{{{},{}}}", x, y),
            Expr::Matrix { cols, rows, fill } => write!(f, "matrix({}, {}, {})", cols, rows, fill),
            Expr::Graph => f.write_str("graph([])"),
            Expr::Species(name) | Expr::Population(name) => f.write_str(name),
            Expr::Cast { to, expr } => write!(f, "{}({})", to, expr),
            Expr::Call { function, args } => {
                write!(f, "{}(", format!("{:?}", function).to_lowercase())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Native(native) => f.write_str(&native.0.literal()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        let expr = Expr::binary(BinaryOp::Mul, Expr::Int(6), Expr::binary(BinaryOp::Add, Expr::Int(3), Expr::Int(4)));
        assert!(expr.is_const());
        assert!(matches!(expr.clone().folded(), Expr::Int(42)));
        assert!(!Expr::var("x").is_const());
        assert!(!Expr::list(vec![Expr::Int(1)]).is_const());
    }

    #[test]
    fn test_arithmetic_rules() {
        assert_eq!(apply_binary(BinaryOp::Add, Value::Int(2), Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(apply_binary(BinaryOp::Div, Value::Int(7), Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(apply_binary(BinaryOp::Mul, Value::Int(2), Value::Float(1.5)).unwrap(), Value::Float(3.0));
        assert_eq!(apply_binary(BinaryOp::Add, Value::from("a"), Value::Int(1)).unwrap(), Value::from("a1"));
        assert!(apply_binary(BinaryOp::Mod, Value::Int(1), Value::Int(0)).is_err());
        assert!(apply_binary(BinaryOp::Sub, Value::from("a"), Value::Int(1)).is_err());
        assert_eq!(apply_binary(BinaryOp::Le, Value::Int(2), Value::Float(2.0)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_static_types() {
        let sum = Expr::binary(BinaryOp::Add, Expr::Int(1), Expr::Float(2.0));
        assert_eq!(sum.static_type().base, ValueType::Float);
        let cmp = Expr::binary(BinaryOp::Lt, Expr::Int(1), Expr::Int(2));
        assert_eq!(cmp.static_type().base, ValueType::Bool);
        let list = Expr::List { items: vec![], content: ValueType::Int };
        assert_eq!(list.static_type(), TypeDescriptor::container(ValueType::List, ValueType::Int));
    }

    #[test]
    fn test_builtins() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(call_builtin(Builtin::Length, vec![list.clone()]).unwrap(), Value::Int(3));
        assert_eq!(call_builtin(Builtin::Sum, vec![list.clone()]).unwrap(), Value::Int(6));
        assert_eq!(call_builtin(Builtin::At, vec![list.clone(), Value::Int(1)]).unwrap(), Value::Int(2));
        assert_eq!(
            call_builtin(Builtin::Contains, vec![list, Value::Int(4)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(call_builtin(Builtin::Dead, vec![Value::Nil]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_expr_json_shape() {
        let expr: Expr = serde_json::from_str(r#"{"binary": {"op": "add", "left": {"int": 1}, "right": {"var": {"name": "x"}}}}"#).unwrap();
        assert_eq!(expr.to_string(), "(1 + x)");
    }
}
