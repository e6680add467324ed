//! Actions: named, parameterized behaviors declared by species

use std::fmt;
use std::sync::Arc;

use super::args::{BoundArguments, FormalArg};
use super::statement::Sequence;
use super::value::Value;
use crate::runtime::agent::AgentRef;
use crate::runtime::error::{ExecError, ExecResult};
use crate::runtime::scope::Scope;

/// Rust implementation of an action
pub type NativeHandler =
    Arc<dyn Fn(&mut Scope, &BoundArguments) -> anyhow::Result<Value> + Send + Sync>;

/// Body of an action
#[derive(Clone)]
pub enum ActionBody {
    /// Interpreted statements
    Statements(Sequence),
    /// Embedder-provided handler
    Native(NativeHandler),
}

/// A species action
#[derive(Clone)]
pub struct Action {
    name: String,
    formals: Vec<FormalArg>,
    body: ActionBody,
}

impl Action {
    /// Action whose body is a statement sequence
    pub fn new(name: impl Into<String>, formals: Vec<FormalArg>, body: Sequence) -> Self {
        Self {
            name: name.into(),
            formals,
            body: ActionBody::Statements(body),
        }
    }

    /// Action implemented in Rust
    pub fn native<F>(name: impl Into<String>, formals: Vec<FormalArg>, handler: F) -> Self
    where
        F: Fn(&mut Scope, &BoundArguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            formals,
            body: ActionBody::Native(Arc::new(handler)),
        }
    }

    /// Action name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Formal arguments
    pub fn formals(&self) -> &[FormalArg] {
        &self.formals
    }

    /// Whether the action declares `name`
    pub fn has_formal(&self, name: &str) -> bool {
        self.formals.iter().any(|formal| formal.name == name)
    }

    /// Run the action in a fresh frame holding the arguments.
    ///
    /// A `return` inside the body ends the action and is consumed here.
    pub fn invoke(
        &self,
        scope: &mut Scope,
        args: BoundArguments,
        caller: Option<AgentRef>,
    ) -> ExecResult<Value> {
        let mut frame = scope.enter_remote(format!("action {}", self.name), caller);
        for (name, value) in args.iter() {
            frame.declare(name, value.clone());
        }
        let result = match &self.body {
            ActionBody::Statements(body) => body.execute(&mut frame),
            ActionBody::Native(handler) => handler(&mut frame, &args).map_err(ExecError::Foreign),
        };
        frame.get_and_clear_return_status();
        result
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            ActionBody::Statements(body) => format!("{} statements", body.len()),
            ActionBody::Native(_) => "native".to_string(),
        };
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("formals", &self.formals.iter().map(|formal| &formal.name).collect::<Vec<_>>())
            .field("body", &body)
            .finish()
    }
}
