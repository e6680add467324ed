//! Non-local control-flow signals
//!
//! `break`, `continue`, `return`, agent death and disposal are not errors:
//! they are recorded as a [`FlowStatus`] on the scope and consumed by the
//! construct that owns them (loops own break/continue, actions own return,
//! agent push/pop owns death).

use serde::{Deserialize, Serialize};

use crate::interpreter::value::Value;

/// Pending control-flow signal of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Normal execution
    #[default]
    Normal,
    /// Leave the innermost loop (or sequential ask)
    Break,
    /// Skip to the next iteration of the innermost loop
    Continue,
    /// Leave the innermost action
    Return,
    /// The current agent died
    Die,
    /// The simulation is being torn down
    Dispose,
}

impl FlowStatus {
    /// Whether a pending status stops the execution of a sequence
    pub fn is_interrupting(self) -> bool {
        !matches!(self, FlowStatus::Normal)
    }

    /// Whether a loop must stop iterating after observing this status
    ///
    /// `continue` is consumed by the iteration itself and never reaches here.
    pub fn terminates_loop(self) -> bool {
        matches!(
            self,
            FlowStatus::Break | FlowStatus::Return | FlowStatus::Die | FlowStatus::Dispose
        )
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlowStatus::Normal => "normal",
            FlowStatus::Break => "break",
            FlowStatus::Continue => "continue",
            FlowStatus::Return => "return",
            FlowStatus::Die => "die",
            FlowStatus::Dispose => "dispose",
        };
        f.write_str(name)
    }
}

/// Result of running a remote sequence on one agent
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Value produced by the sequence (nil when failed)
    pub value: Value,
    /// False when the target was dead, the scope interrupted, or an error
    /// was contained
    pub passed: bool,
}

impl ExecutionResult {
    /// Successful result carrying a value
    pub fn passed(value: Value) -> Self {
        Self { value, passed: true }
    }

    /// The `FAILED` sentinel
    pub fn failed() -> Self {
        Self {
            value: Value::Nil,
            passed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continue_does_not_terminate_loops() {
        assert!(FlowStatus::Continue.is_interrupting());
        assert!(!FlowStatus::Continue.terminates_loop());
        assert!(!FlowStatus::Normal.is_interrupting());
        for status in [
            FlowStatus::Break,
            FlowStatus::Return,
            FlowStatus::Die,
            FlowStatus::Dispose,
        ] {
            assert!(status.terminates_loop(), "{status} should stop a loop");
        }
    }

    #[test]
    fn test_failed_sentinel() {
        let failed = ExecutionResult::failed();
        assert!(!failed.passed);
        assert_eq!(failed.value, Value::Nil);
        assert!(ExecutionResult::passed(Value::Int(1)).passed);
    }
}
