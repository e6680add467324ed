//! Executable statements
//!
//! A statement tree is built once (see [`builder`](super::builder)) and then
//! executed many times against different scopes. Statements are immutable
//! and `Send + Sync` so one tree can be shared by parallel workers.

use super::dispatch::{
    AskStatement, CaptureStatement, CreateStatement, DoStatement, MigrateStatement,
    ReleaseStatement,
};
use super::expr::{Expr, Expression};
use super::looping::LoopStatement;
use super::mutation::ContainerStatement;
use super::try_catch::TryStatement;
use super::value::Value;
use crate::runtime::agent::AgentRef;
use crate::runtime::error::{ExecError, ExecResult};
use crate::runtime::scope::Scope;

/// One executable statement
#[derive(Debug, Clone)]
pub enum Statement {
    /// Declare a variable in the current frame
    Let {
        /// Variable name
        name: String,
        /// Initial value (nil when absent)
        value: Option<Expr>,
    },
    /// Assign a variable, or an attribute of the current or a given agent
    Set {
        /// Agent (or map) whose attribute is assigned; the current agent when absent
        target: Option<Expr>,
        /// Variable or attribute name
        name: String,
        /// Assigned value
        value: Expr,
    },
    /// Conditional
    If {
        /// Condition
        condition: Expr,
        /// Branch run when the condition holds
        then: Sequence,
        /// Branch run otherwise
        otherwise: Option<Sequence>,
    },
    /// Nested block with its own frame
    Block(Sequence),
    /// Loop
    Loop(LoopStatement),
    /// Remote execution on agents
    Ask(AskStatement),
    /// Agent creation
    Create(CreateStatement),
    /// Adopt agents as micro-agents
    Capture(CaptureStatement),
    /// Release micro-agents to another host
    Release(ReleaseStatement),
    /// Move micro-agents between micro-populations
    Migrate(MigrateStatement),
    /// Action invocation
    Do(DoStatement),
    /// `add`, `remove` or `put`
    Container(ContainerStatement),
    /// Error containment
    Try(TryStatement),
    /// Leave the innermost loop
    Break,
    /// Next iteration of the innermost loop
    Continue,
    /// Leave the innermost action with a value
    Return(Option<Expr>),
    /// Kill the executing agent
    Die,
    /// Log a message
    Write(Expr),
    /// Report a warning
    Warn(Expr),
    /// Raise an error
    Raise(Expr),
}

impl Statement {
    /// Statement keyword, for traces and diagnostics
    pub fn keyword(&self) -> &'static str {
        match self {
            Statement::Let { .. } => "let",
            Statement::Set { .. } => "set",
            Statement::If { .. } => "if",
            Statement::Block(_) => "block",
            Statement::Loop(_) => "loop",
            Statement::Ask(_) => "ask",
            Statement::Create(_) => "create",
            Statement::Capture(_) => "capture",
            Statement::Release(_) => "release",
            Statement::Migrate(_) => "migrate",
            Statement::Do(_) => "do",
            Statement::Container(stmt) => stmt.keyword(),
            Statement::Try(_) => "try",
            Statement::Break => "break",
            Statement::Continue => "continue",
            Statement::Return(_) => "return",
            Statement::Die => "die",
            Statement::Write(_) => "write",
            Statement::Warn(_) => "warn",
            Statement::Raise(_) => "error",
        }
    }

    /// Execute the statement, returning the value it produced
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        match self {
            Statement::Let { name, value } => {
                let value = match value {
                    Some(expr) => expr.evaluate(scope)?,
                    None => Value::Nil,
                };
                scope.declare(name.clone(), value.clone());
                Ok(value)
            }
            Statement::Set {
                target,
                name,
                value,
            } => {
                let value = value.evaluate(scope)?;
                assign(scope, target.as_ref(), name, value.clone())?;
                Ok(value)
            }
            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if condition.evaluate(scope)?.truthy() {
                    Some(then)
                } else {
                    otherwise.as_ref()
                };
                match branch {
                    Some(body) => {
                        let mut frame = scope.enter("if");
                        body.execute(&mut frame)
                    }
                    None => Ok(Value::Nil),
                }
            }
            Statement::Block(body) => {
                let mut frame = scope.enter("block");
                body.execute(&mut frame)
            }
            Statement::Loop(stmt) => stmt.execute(scope),
            Statement::Ask(stmt) => stmt.execute(scope),
            Statement::Create(stmt) => stmt.execute(scope),
            Statement::Capture(stmt) => stmt.execute(scope),
            Statement::Release(stmt) => stmt.execute(scope),
            Statement::Migrate(stmt) => stmt.execute(scope),
            Statement::Do(stmt) => stmt.execute(scope),
            Statement::Container(stmt) => stmt.execute(scope),
            Statement::Try(stmt) => stmt.execute(scope),
            Statement::Break => {
                scope.set_break_status();
                Ok(Value::Nil)
            }
            Statement::Continue => {
                scope.set_continue_status();
                Ok(Value::Nil)
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => expr.evaluate(scope)?,
                    None => Value::Nil,
                };
                scope.set_return_status();
                Ok(value)
            }
            Statement::Die => {
                let agent = scope.require_agent("die")?;
                agent.kill();
                tracing::debug!(agent = agent.name(), "agent died");
                scope.set_death_status();
                Ok(Value::Nil)
            }
            Statement::Write(message) => {
                let message = message.evaluate(scope)?;
                let agent = scope.agent().map(|agent| agent.name().to_string());
                tracing::info!(agent = agent.as_deref().unwrap_or("-"), "{}", message);
                Ok(message)
            }
            Statement::Warn(message) => {
                let message = message.evaluate(scope)?;
                scope.warn(message.to_string());
                Ok(message)
            }
            Statement::Raise(message) => {
                let message = message.evaluate(scope)?;
                Err(ExecError::Raised(message.to_string()))
            }
        }
    }
}

fn assign(scope: &mut Scope, target: Option<&Expr>, name: &str, value: Value) -> ExecResult<()> {
    match target {
        None => {
            if scope.set_var(name, value.clone()) {
                return Ok(());
            }
            let agent = scope.require_agent("set")?;
            if agent.has_attribute(name) {
                agent.set_attribute(name, value);
                Ok(())
            } else {
                Err(ExecError::UnknownVariable(name.to_string()))
            }
        }
        Some(target) => match target.evaluate(scope)? {
            Value::Agent(agent) => {
                agent.set_attribute(name, value);
                Ok(())
            }
            Value::Map(map) => {
                map.write().put(Value::String(name.to_string()), value);
                Ok(())
            }
            Value::Nil => Err(ExecError::NilAgent {
                statement: format!("set {}", name),
            }),
            other => Err(ExecError::NotAnAgent {
                statement: format!("set {}", name),
                found: other.to_string(),
            }),
        },
    }
}

/// Ordered list of statements run in the current frame
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    statements: Vec<Statement>,
}

impl Sequence {
    /// Build a sequence
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Statements, in order
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Run the statements until one fails or the scope is interrupted.
    /// Returns the value of the last statement that ran.
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let mut last = Value::Nil;
        for statement in &self.statements {
            if scope.interrupted() {
                break;
            }
            if scope.config().trace {
                tracing::debug!(scope = scope.name(), statement = statement.keyword(), "execute");
            }
            last = statement.execute(scope)?;
            scope.record_value(last.clone());
        }
        Ok(last)
    }
}

impl From<Vec<Statement>> for Sequence {
    fn from(statements: Vec<Statement>) -> Self {
        Self::new(statements)
    }
}

/// Body executed on behalf of another agent (ask, create, capture, ...)
///
/// Runs in its own frame, which records the caller so `myself` resolves to it.
#[derive(Debug, Clone, Default)]
pub struct RemoteSequence {
    owner: String,
    body: Sequence,
}

impl RemoteSequence {
    /// Build a remote sequence named after its owning statement
    pub fn new(owner: impl Into<String>, body: Sequence) -> Self {
        Self {
            owner: owner.into(),
            body,
        }
    }

    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Run the body in a new frame whose `myself` is `caller`
    pub fn execute(&self, scope: &mut Scope, caller: Option<AgentRef>) -> ExecResult<Value> {
        let mut frame = scope.enter_remote(self.owner.as_str(), caller);
        self.body.execute(&mut frame)
    }
}
