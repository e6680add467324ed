//! `try` / `catch`
//!
//! The body runs in try mode: an error raised anywhere below it (including
//! inside dispatched remote sequences) unwinds to this statement instead of
//! the agent boundary. The error is stored as the scope's current error and
//! the optional catch block runs with `error` bound to its message.

use super::statement::Sequence;
use super::value::Value;
use crate::runtime::error::ExecResult;
use crate::runtime::scope::Scope;

/// Error containment block
#[derive(Debug, Clone)]
pub struct TryStatement {
    body: Sequence,
    catch: Option<Sequence>,
}

impl TryStatement {
    /// Build a `try` with an optional `catch`
    pub fn new(body: Sequence, catch: Option<Sequence>) -> Self {
        Self { body, catch }
    }

    /// Run the body, containing any error it raises.
    ///
    /// Without a catch block the result is the value of the last statement
    /// the body completed, never the error.
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        scope.record_value(Value::Nil);
        let outcome = {
            let mut guard = scope.try_mode();
            let mut frame = guard.enter("try");
            self.body.execute(&mut frame)
        };
        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        tracing::debug!(scope = scope.name(), %error, "error contained by try");
        let message = error.to_string();
        scope.set_current_error(error);
        match &self.catch {
            Some(catch) => {
                let mut frame = scope.enter("catch");
                frame.declare("error", Value::String(message));
                catch.execute(&mut frame)
            }
            None => Ok(scope.last_value().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::expr::{BinaryOp, Expr};
    use crate::interpreter::statement::Statement;
    use crate::runtime::error::ExecError;
    use crate::runtime::test_scope;

    fn raise(message: &str) -> Statement {
        Statement::Raise(Expr::str(message))
    }

    #[test]
    fn test_error_is_swallowed_without_catch() {
        let (_world, mut scope) = test_scope();
        let stmt = TryStatement::new(Sequence::new(vec![raise("x")]), None);
        assert_eq!(stmt.execute(&mut scope).unwrap(), Value::Nil);
        assert!(matches!(scope.current_error(), Some(ExecError::Raised(_))));
        assert!(!scope.is_in_try_mode());
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn test_result_is_last_completed_value() {
        let (_world, mut scope) = test_scope();
        let body = Sequence::new(vec![
            Statement::Let {
                name: "x".into(),
                value: Some(Expr::Int(4)),
            },
            raise("x"),
            Statement::Let {
                name: "y".into(),
                value: Some(Expr::Int(5)),
            },
        ]);
        let stmt = TryStatement::new(body, None);
        assert_eq!(stmt.execute(&mut scope).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_catch_sees_error_message() {
        let (_world, mut scope) = test_scope();
        let catch = Sequence::new(vec![Statement::Write(Expr::binary(
            BinaryOp::Add,
            Expr::str("caught: "),
            Expr::var("error"),
        ))]);
        let stmt = TryStatement::new(Sequence::new(vec![raise("boom")]), Some(catch));
        assert_eq!(stmt.execute(&mut scope).unwrap(), Value::from("caught: boom"));
    }

    #[test]
    fn test_error_in_catch_propagates() {
        let (_world, mut scope) = test_scope();
        let stmt = TryStatement::new(
            Sequence::new(vec![raise("first")]),
            Some(Sequence::new(vec![raise("second")])),
        );
        let err = stmt.execute(&mut scope).unwrap_err();
        assert_eq!(err.to_string(), "second");
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn test_nested_try_contains_inner_error_only() {
        let (_world, mut scope) = test_scope();
        let inner = Statement::Try(TryStatement::new(Sequence::new(vec![raise("inner")]), None));
        let outer = TryStatement::new(
            Sequence::new(vec![
                inner,
                Statement::Let {
                    name: "after".into(),
                    value: Some(Expr::Bool(true)),
                },
            ]),
            None,
        );
        assert_eq!(outer.execute(&mut scope).unwrap(), Value::Bool(true));
    }
}
