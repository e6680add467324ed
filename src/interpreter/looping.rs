//! Loops
//!
//! Five strategies share one iteration protocol: each iteration pushes a
//! frame, binds the loop variable (if any), runs the body, pops the frame and
//! consumes a pending `continue`. The loop stops on `break`, `return`, death
//! or disposal, and clears `break` once it is done.
//!
//! Bounded loops (`from`/`to`/`step`) follow these rules:
//!
//! - `from == to` runs exactly once
//! - with no step, the loop counts up by one, or down by one when `from > to`
//! - an explicit step pointing away from `to` runs zero times
//! - a zero step is an error
//! - an integer counter that would overflow ends the loop

use std::fmt;

use super::expr::{Expr, Expression};
use super::statement::Sequence;
use super::value::{Value, ValueType};
use crate::runtime::error::{ExecError, ExecResult};
use crate::runtime::scope::Scope;

/// Numeric type a bounded loop counts with
pub trait LoopNumber: Copy + PartialOrd + fmt::Debug + Send + Sync {
    /// Additive identity
    const ZERO: Self;
    /// Default step
    const ONE: Self;

    /// Read a loop bound from a value
    fn from_value(value: &Value) -> Option<Self>;

    /// Wrap the counter in a value
    fn into_value(self) -> Value;

    /// Arithmetic negation
    fn negate(self) -> Self;

    /// Next counter value, `None` once it leaves the representable range
    fn checked_next(self, step: Self) -> Option<Self>;
}

impl LoopNumber for i64 {
    const ZERO: Self = 0;
    const ONE: Self = 1;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(num) => Some(*num),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn negate(self) -> Self {
        -self
    }

    fn checked_next(self, step: Self) -> Option<Self> {
        self.checked_add(step)
    }
}

impl LoopNumber for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn negate(self) -> Self {
        -self
    }

    fn checked_next(self, step: Self) -> Option<Self> {
        Some(self + step)
    }
}

/// Loop bound, folded when constant
#[derive(Debug, Clone)]
pub enum Bound<N> {
    /// Known at construction
    Constant(N),
    /// Evaluated each time the loop starts
    Dynamic(Expr),
}

impl<N: LoopNumber> Bound<N> {
    /// Fold `expr` if it is a constant of the right type
    pub fn new(expr: Expr) -> Self {
        match expr.const_value().as_ref().and_then(N::from_value) {
            Some(num) => Bound::Constant(num),
            None => Bound::Dynamic(expr),
        }
    }

    fn resolve(&self, scope: &mut Scope) -> ExecResult<N> {
        match self {
            Bound::Constant(num) => Ok(*num),
            Bound::Dynamic(expr) => {
                let value = expr.evaluate(scope)?;
                N::from_value(&value).ok_or_else(|| ExecError::InvalidOperation {
                    op: "loop".to_string(),
                    detail: format!("{} ({}) is not a valid bound", expr, value.value_type()),
                })
            }
        }
    }
}

/// `from`/`to`/`step` loop over one numeric type
#[derive(Debug, Clone)]
pub struct BoundedLoop<N> {
    from: Bound<N>,
    to: Bound<N>,
    step: Option<Bound<N>>,
}

/// Iteration strategy
#[derive(Debug, Clone)]
pub enum LoopKind {
    /// Fixed number of iterations
    Times(Bound<i64>),
    /// While a condition holds (checked before each iteration)
    While(Expr),
    /// Over the elements of a container
    Over(Expr),
    /// Integer bounds
    IntRange(BoundedLoop<i64>),
    /// Float bounds
    FloatRange(BoundedLoop<f64>),
    /// Bounds of unknown static type: integer iteration when every bound
    /// evaluates to an integer, float otherwise
    AnyRange {
        /// Start
        from: Expr,
        /// End (inclusive)
        to: Expr,
        /// Step
        step: Option<Expr>,
    },
}

/// Loop statement
#[derive(Debug, Clone)]
pub struct LoopStatement {
    var: Option<String>,
    kind: LoopKind,
    body: Sequence,
}

impl LoopStatement {
    /// `loop times: n`
    pub fn times(count: Expr, body: Sequence) -> Self {
        Self {
            var: None,
            kind: LoopKind::Times(Bound::new(count)),
            body,
        }
    }

    /// `loop while: condition`
    pub fn repeat_while(condition: Expr, body: Sequence) -> Self {
        Self {
            var: None,
            kind: LoopKind::While(condition),
            body,
        }
    }

    /// `loop var over: source`
    pub fn over(var: impl Into<String>, source: Expr, body: Sequence) -> Self {
        Self {
            var: Some(var.into()),
            kind: LoopKind::Over(source),
            body,
        }
    }

    /// `loop var from: a to: b step: s`, choosing integer or float
    /// iteration from the static types of the bounds
    pub fn range(
        var: impl Into<String>,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Sequence,
    ) -> Self {
        let mut types = vec![from.static_type().base, to.static_type().base];
        if let Some(step) = &step {
            types.push(step.static_type().base);
        }
        let kind = if types.iter().all(|ty| *ty == ValueType::Int) {
            LoopKind::IntRange(BoundedLoop {
                from: Bound::new(from),
                to: Bound::new(to),
                step: step.map(Bound::new),
            })
        } else if types.iter().all(|ty| ty.is_numeric()) {
            LoopKind::FloatRange(BoundedLoop {
                from: Bound::new(from),
                to: Bound::new(to),
                step: step.map(Bound::new),
            })
        } else {
            LoopKind::AnyRange { from, to, step }
        };
        Self {
            var: Some(var.into()),
            kind,
            body,
        }
    }

    /// Selected strategy
    pub fn kind(&self) -> &LoopKind {
        &self.kind
    }

    /// Run the loop; returns the value of the last iteration's body
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let result = self.run(scope);
        scope.get_and_clear_break_status();
        result
    }

    fn run(&self, scope: &mut Scope) -> ExecResult<Value> {
        let mut last = Value::Nil;
        match &self.kind {
            LoopKind::Times(count) => {
                let count = count.resolve(scope)?;
                for _ in 0..count.max(0) {
                    if !self.iterate(scope, Value::Nil, &mut last)? {
                        break;
                    }
                }
            }
            LoopKind::While(condition) => {
                while condition.evaluate(scope)?.truthy() {
                    if !self.iterate(scope, Value::Nil, &mut last)? {
                        break;
                    }
                }
            }
            LoopKind::Over(source) => {
                for element in source.evaluate(scope)?.elements() {
                    if !self.iterate(scope, element, &mut last)? {
                        break;
                    }
                }
            }
            LoopKind::IntRange(bounds) => {
                let (from, to, step) = bounds.resolve(scope)?;
                self.count(scope, from, to, step, &mut last)?;
            }
            LoopKind::FloatRange(bounds) => {
                let (from, to, step) = bounds.resolve(scope)?;
                self.count(scope, from, to, step, &mut last)?;
            }
            LoopKind::AnyRange { from, to, step } => {
                let from = from.evaluate(scope)?;
                let to = to.evaluate(scope)?;
                let step = match step {
                    Some(step) => Some(step.evaluate(scope)?),
                    None => None,
                };
                let all_ints = [Some(&from), Some(&to), step.as_ref()]
                    .into_iter()
                    .flatten()
                    .all(|value| matches!(value, Value::Int(_)));
                if all_ints {
                    let step = step.as_ref().and_then(i64::from_value);
                    self.count(scope, number(&from)?, number(&to)?, step, &mut last)?;
                } else {
                    let step = match &step {
                        Some(value) => Some(number::<f64>(value)?),
                        None => None,
                    };
                    self.count(scope, number(&from)?, number(&to)?, step, &mut last)?;
                }
            }
        }
        Ok(last)
    }

    fn count<N: LoopNumber>(
        &self,
        scope: &mut Scope,
        from: N,
        to: N,
        step: Option<N>,
        last: &mut Value,
    ) -> ExecResult<()> {
        if step == Some(N::ZERO) {
            return Err(ExecError::ZeroStep);
        }
        if from == to {
            self.iterate(scope, from.into_value(), last)?;
            return Ok(());
        }
        let descending = from > to;
        let step = match step {
            None if descending => N::ONE.negate(),
            None => N::ONE,
            Some(step) if descending == (step > N::ZERO) => return Ok(()),
            Some(step) => step,
        };
        let in_range = |counter: N| if descending { counter >= to } else { counter <= to };
        let mut counter = from;
        while in_range(counter) {
            if !self.iterate(scope, counter.into_value(), last)? {
                break;
            }
            counter = match counter.checked_next(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }

    /// One iteration; returns whether the loop should go on
    fn iterate(&self, scope: &mut Scope, value: Value, last: &mut Value) -> ExecResult<bool> {
        let mut frame = scope.enter("loop");
        if let Some(var) = &self.var {
            frame.declare(var.clone(), value);
        }
        *last = self.body.execute(&mut frame)?;
        let status = frame.get_and_clear_continue_status();
        Ok(!status.terminates_loop() && !frame.is_cancelled())
    }
}

impl<N: LoopNumber> BoundedLoop<N> {
    fn resolve(&self, scope: &mut Scope) -> ExecResult<(N, N, Option<N>)> {
        let from = self.from.resolve(scope)?;
        let to = self.to.resolve(scope)?;
        let step = match &self.step {
            Some(step) => Some(step.resolve(scope)?),
            None => None,
        };
        Ok((from, to, step))
    }
}

fn number<N: LoopNumber>(value: &Value) -> ExecResult<N> {
    N::from_value(value).ok_or_else(|| ExecError::InvalidOperation {
        op: "loop".to_string(),
        detail: format!("{} is not a number", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::expr::BinaryOp;
    use crate::interpreter::statement::Statement;
    use crate::runtime::flow::FlowStatus;
    use crate::runtime::test_scope;

    fn accumulate(var: &str) -> Sequence {
        Sequence::new(vec![Statement::Container(
            crate::interpreter::mutation::ContainerStatement::add(Expr::var("seen"), Expr::var(var))
                .unwrap(),
        )])
    }

    fn seen(scope: &Scope) -> Vec<Value> {
        scope.get_var("seen").unwrap().elements()
    }

    #[test]
    fn test_times_and_constant_folding() {
        let (_world, mut scope) = test_scope();
        scope.declare("x", Value::Int(1));
        let body = Sequence::new(vec![Statement::Set {
            target: None,
            name: "x".into(),
            value: Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::Int(2)),
        }]);
        let stmt = LoopStatement::times(Expr::binary(BinaryOp::Add, Expr::Int(1), Expr::Int(2)), body);
        assert!(matches!(stmt.kind(), LoopKind::Times(Bound::Constant(3))));
        stmt.execute(&mut scope).unwrap();
        assert_eq!(scope.get_var("x"), Some(Value::Int(8)));
    }

    #[test]
    fn test_descending_without_step() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        LoopStatement::range("i", Expr::Int(3), Expr::Int(1), None, accumulate("i"))
            .execute(&mut scope)
            .unwrap();
        assert_eq!(seen(&scope), vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_step_away_from_bound_runs_zero_times() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        LoopStatement::range("i", Expr::Int(10), Expr::Int(0), Some(Expr::Int(1)), accumulate("i"))
            .execute(&mut scope)
            .unwrap();
        LoopStatement::range("i", Expr::Int(0), Expr::Int(10), Some(Expr::Int(-1)), accumulate("i"))
            .execute(&mut scope)
            .unwrap();
        assert!(seen(&scope).is_empty());
    }

    #[test]
    fn test_equal_bounds_run_once() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        LoopStatement::range("i", Expr::Int(4), Expr::Int(4), Some(Expr::Int(-3)), accumulate("i"))
            .execute(&mut scope)
            .unwrap();
        assert_eq!(seen(&scope), vec![Value::Int(4)]);
    }

    #[test]
    fn test_zero_step_is_an_error() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        let err = LoopStatement::range("i", Expr::Int(0), Expr::Int(3), Some(Expr::Int(0)), accumulate("i"))
            .execute(&mut scope)
            .unwrap_err();
        assert!(matches!(err, ExecError::ZeroStep));
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn test_float_range() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        let stmt = LoopStatement::range("f", Expr::Float(0.0), Expr::Int(1), Some(Expr::Float(0.5)), accumulate("f"));
        assert!(matches!(stmt.kind(), LoopKind::FloatRange(_)));
        stmt.execute(&mut scope).unwrap();
        assert_eq!(seen(&scope), vec![Value::Float(0.0), Value::Float(0.5), Value::Float(1.0)]);
    }

    #[test]
    fn test_counter_overflow_ends_loop() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        LoopStatement::range(
            "i",
            Expr::Int(1),
            Expr::Int(i64::MAX - 1),
            Some(Expr::Int(i64::MAX)),
            accumulate("i"),
        )
        .execute(&mut scope)
        .unwrap();
        LoopStatement::range("i", Expr::Int(-2), Expr::Int(i64::MIN), Some(Expr::Int(i64::MIN)), accumulate("i"))
            .execute(&mut scope)
            .unwrap();
        assert_eq!(seen(&scope), vec![Value::Int(1), Value::Int(-2)]);
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn test_untyped_bounds_pick_at_runtime() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        scope.declare("n", Value::Int(2));
        let stmt = LoopStatement::range("i", Expr::Int(1), Expr::var("n"), None, accumulate("i"));
        assert!(matches!(stmt.kind(), LoopKind::AnyRange { .. }));
        stmt.execute(&mut scope).unwrap();
        assert_eq!(seen(&scope), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_break_and_continue() {
        let (_world, mut scope) = test_scope();
        scope.declare("seen", Value::list(vec![]));
        let body = Sequence::new(vec![
            Statement::If {
                condition: Expr::binary(BinaryOp::Eq, Expr::var("i"), Expr::Int(2)),
                then: Sequence::new(vec![Statement::Continue]),
                otherwise: None,
            },
            Statement::If {
                condition: Expr::binary(BinaryOp::Eq, Expr::var("i"), Expr::Int(4)),
                then: Sequence::new(vec![Statement::Break]),
                otherwise: None,
            },
            accumulate("i").statements()[0].clone(),
        ]);
        LoopStatement::range("i", Expr::Int(1), Expr::Int(10), None, body)
            .execute(&mut scope)
            .unwrap();
        assert_eq!(seen(&scope), vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(scope.flow_status(), FlowStatus::Normal);
    }

    #[test]
    fn test_return_escapes_loop() {
        let (_world, mut scope) = test_scope();
        let body = Sequence::new(vec![Statement::Return(Some(Expr::var("i")))]);
        let value = LoopStatement::over("i", Expr::list(vec![Expr::Int(7), Expr::Int(8)]), body)
            .execute(&mut scope)
            .unwrap();
        assert_eq!(value, Value::Int(7));
        assert_eq!(scope.flow_status(), FlowStatus::Return);
    }
}
