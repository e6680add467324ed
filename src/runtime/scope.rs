//! Execution scope
//!
//! A [`Scope`] is the mutable context threaded through every statement:
//!
//! - a stack of variable frames (pushed by loops, actions, remote sequences)
//! - a stack of executing agents
//! - the pending [`FlowStatus`]
//! - a reentrant try-mode counter and the last captured error
//!
//! Pushes are paired with pops through guards ([`FrameGuard`],
//! [`AgentGuard`], [`TryModeGuard`]) whose `Drop` performs the release, so an
//! early `?` return can never leave a frame or agent behind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::agent::AgentRef;
use super::error::{ExecError, ExecResult};
use super::flow::{ExecutionResult, FlowStatus};
use super::report::{Report, Severity};
use super::world::Simulation;
use super::{Engine, RuntimeConfig};
use crate::interpreter::statement::RemoteSequence;
use crate::interpreter::value::Value;

#[derive(Debug, Clone)]
struct Frame {
    owner: String,
    vars: HashMap<String, Value>,
    myself: Option<AgentRef>,
}

impl Frame {
    fn new(owner: String, myself: Option<AgentRef>) -> Self {
        Self {
            owner,
            vars: HashMap::new(),
            myself,
        }
    }
}

/// Frame push/pop counters of a scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeStats {
    /// Frames pushed
    pub pushes: u64,
    /// Frames popped
    pub pops: u64,
    /// Deepest frame stack observed
    pub max_depth: usize,
}

/// Mutable execution context of one executing thread
pub struct Scope {
    name: String,
    engine: Arc<Engine>,
    frames: Vec<Frame>,
    agents: Vec<AgentRef>,
    flow: FlowStatus,
    try_depth: u32,
    current_error: Option<ExecError>,
    last_value: Value,
    stats: ScopeStats,
}

impl Scope {
    /// Create a scope executing on behalf of `agent`
    pub fn new(engine: Arc<Engine>, agent: AgentRef, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            frames: vec![Frame::new(name.clone(), None)],
            name,
            engine,
            agents: vec![agent],
            flow: FlowStatus::Normal,
            try_depth: 0,
            current_error: None,
            last_value: Value::Nil,
            stats: ScopeStats::default(),
        }
    }

    /// Private copy for a parallel worker
    ///
    /// Frames and agents are copied; the engine (world, sink, pool, cancel
    /// flag) is shared. The copy starts with a normal flow status.
    pub fn fork(&self, name: impl Into<String>) -> Scope {
        Scope {
            name: name.into(),
            engine: self.engine.clone(),
            frames: self.frames.clone(),
            agents: self.agents.clone(),
            flow: FlowStatus::Normal,
            try_depth: self.try_depth,
            current_error: None,
            last_value: Value::Nil,
            stats: ScopeStats::default(),
        }
    }

    /// Scope name (for diagnostics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared engine services
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The simulation model
    pub fn world(&self) -> &dyn Simulation {
        self.engine.world()
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        self.engine.config()
    }

    // ---- frames ---------------------------------------------------------

    /// Push a frame owned by `owner`; it is popped when the guard drops
    pub fn enter(&mut self, owner: impl Into<String>) -> FrameGuard<'_> {
        self.push_frame(Frame::new(owner.into(), None));
        FrameGuard { scope: self }
    }

    /// Push a frame for a remote sequence, recording the caller as `myself`
    pub fn enter_remote(
        &mut self,
        owner: impl Into<String>,
        myself: Option<AgentRef>,
    ) -> FrameGuard<'_> {
        self.push_frame(Frame::new(owner.into(), myself));
        FrameGuard { scope: self }
    }

    fn push_frame(&mut self, frame: Frame) {
        if self.engine.config().trace {
            tracing::trace!(scope = %self.name, owner = %frame.owner, depth = self.frames.len(), "push frame");
        }
        self.frames.push(frame);
        self.stats.pushes += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.frames.len());
    }

    fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
            self.stats.pops += 1;
        }
    }

    /// Current number of frames (the root frame included)
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push/pop counters
    pub fn stats(&self) -> ScopeStats {
        self.stats
    }

    /// Declare (or shadow) a variable in the innermost frame
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.insert(name.into(), value);
        }
    }

    /// Look a variable up, innermost frame first
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(name).cloned())
    }

    /// Whether a variable is visible
    pub fn has_var(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.vars.contains_key(name))
    }

    /// Assign a visible variable; returns false when none is declared
    pub fn set_var(&mut self, name: &str, value: Value) -> bool {
        match self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.vars.contains_key(name))
        {
            Some(frame) => {
                frame.vars.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Caller agent of the innermost remote sequence
    pub fn myself(&self) -> Option<AgentRef> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.myself.clone())
    }

    // ---- agents ---------------------------------------------------------

    /// Currently executing agent
    pub fn agent(&self) -> Option<&AgentRef> {
        self.agents.last()
    }

    /// Currently executing agent, or an error naming `statement`
    pub fn require_agent(&self, statement: &str) -> ExecResult<AgentRef> {
        self.agent()
            .cloned()
            .ok_or_else(|| ExecError::NoAgent(statement.to_string()))
    }

    /// Make `agent` the executing agent until the guard drops
    ///
    /// Pushing the agent that is already executing is a no-op, and so is the
    /// matching pop: a death raised by that agent then propagates to the
    /// boundary that originally pushed it.
    pub fn with_agent(&mut self, agent: AgentRef) -> AgentGuard<'_> {
        let pushed = match self.agents.last() {
            Some(current) => current.id() != agent.id(),
            None => true,
        };
        if pushed {
            self.agents.push(agent);
        }
        AgentGuard {
            scope: self,
            pushed,
        }
    }

    // ---- flow -----------------------------------------------------------

    /// Pending flow status
    pub fn flow_status(&self) -> FlowStatus {
        self.flow
    }

    /// Overwrite the pending flow status
    pub fn set_flow_status(&mut self, status: FlowStatus) {
        self.flow = status;
    }

    /// Signal `break`
    pub fn set_break_status(&mut self) {
        self.flow = FlowStatus::Break;
    }

    /// Signal `continue`
    pub fn set_continue_status(&mut self) {
        self.flow = FlowStatus::Continue;
    }

    /// Signal `return`
    pub fn set_return_status(&mut self) {
        self.flow = FlowStatus::Return;
    }

    /// Signal the death of the current agent
    pub fn set_death_status(&mut self) {
        self.flow = FlowStatus::Die;
    }

    /// Signal disposal of the simulation
    pub fn set_dispose_status(&mut self) {
        self.flow = FlowStatus::Dispose;
    }

    /// Return the pending status, clearing it only if it equals `expected`
    pub fn get_and_clear_flow_status(&mut self, expected: FlowStatus) -> FlowStatus {
        let current = self.flow;
        if current == expected {
            self.flow = FlowStatus::Normal;
        }
        current
    }

    /// Return the pending status, clearing a pending `break`
    pub fn get_and_clear_break_status(&mut self) -> FlowStatus {
        self.get_and_clear_flow_status(FlowStatus::Break)
    }

    /// Return the pending status, clearing a pending `continue`
    pub fn get_and_clear_continue_status(&mut self) -> FlowStatus {
        self.get_and_clear_flow_status(FlowStatus::Continue)
    }

    /// Return the pending status, clearing a pending `return`
    pub fn get_and_clear_return_status(&mut self) -> FlowStatus {
        self.get_and_clear_flow_status(FlowStatus::Return)
    }

    /// Return the pending status, clearing a pending death
    pub fn get_and_clear_death_status(&mut self) -> FlowStatus {
        self.get_and_clear_flow_status(FlowStatus::Die)
    }

    /// Whether execution must stop: a signal is pending or the run was cancelled
    pub fn interrupted(&self) -> bool {
        self.flow.is_interrupting() || self.engine.is_cancelled()
    }

    /// Whether the run was cancelled from outside
    pub fn is_cancelled(&self) -> bool {
        self.engine.is_cancelled()
    }

    // ---- try mode -------------------------------------------------------

    /// Enter try mode until the guard drops
    pub fn try_mode(&mut self) -> TryModeGuard<'_> {
        self.try_depth += 1;
        TryModeGuard { scope: self }
    }

    /// Whether an enclosing `try` will contain errors
    pub fn is_in_try_mode(&self) -> bool {
        self.try_depth > 0
    }

    /// Record the error captured by a `try`
    pub fn set_current_error(&mut self, error: ExecError) {
        self.current_error = Some(error);
    }

    /// Last error captured by a `try`
    pub fn current_error(&self) -> Option<&ExecError> {
        self.current_error.as_ref()
    }

    /// Remove and return the last captured error
    pub fn take_current_error(&mut self) -> Option<ExecError> {
        self.current_error.take()
    }

    /// Value produced by the most recently executed statement
    pub fn last_value(&self) -> &Value {
        &self.last_value
    }

    /// Record the value produced by a statement
    pub fn record_value(&mut self, value: Value) {
        self.last_value = value;
    }

    // ---- reporting ------------------------------------------------------

    /// Report a problem to the engine's error sink
    pub fn report(&self, severity: Severity, message: impl Into<String>) {
        self.engine.sink().report(Report {
            severity,
            message: message.into(),
            agent: self.agent().map(|agent| agent.name().to_string()),
        });
    }

    /// Report a warning (an error when the configuration escalates warnings)
    pub fn warn(&self, message: impl Into<String>) {
        let severity = if self.config().fail_on_warnings {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.report(severity, message);
    }

    // ---- dispatch -------------------------------------------------------

    /// Run `sequence` with `target` as the executing agent
    ///
    /// Returns the failed sentinel when this scope is interrupted or the
    /// target is dead. An error raised by the sequence propagates when a
    /// `try` is active; otherwise it is reported and the failed sentinel is
    /// returned.
    pub fn execute_remote(
        &mut self,
        sequence: &RemoteSequence,
        target: &AgentRef,
    ) -> ExecResult<ExecutionResult> {
        if self.interrupted() || target.is_dead() {
            return Ok(ExecutionResult::failed());
        }
        let caller = self.agent().cloned();
        let mut guard = self.with_agent(target.clone());
        match sequence.execute(&mut guard, caller) {
            Ok(value) => Ok(ExecutionResult::passed(value)),
            Err(error) if guard.is_in_try_mode() => Err(error),
            Err(error) => {
                tracing::debug!(agent = target.name(), %error, "remote sequence failed");
                guard.report(Severity::Error, error.to_string());
                Ok(ExecutionResult::failed())
            }
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("depth", &self.frames.len())
            .field("agent", &self.agent().map(|agent| agent.name().to_string()))
            .field("flow", &self.flow)
            .field("try_depth", &self.try_depth)
            .finish()
    }
}

/// Pops a frame when dropped
pub struct FrameGuard<'a> {
    scope: &'a mut Scope,
}

impl Deref for FrameGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.scope.pop_frame();
    }
}

/// Pops the pushed agent (and clears its death) when dropped
pub struct AgentGuard<'a> {
    scope: &'a mut Scope,
    pushed: bool,
}

impl AgentGuard<'_> {
    /// Whether the guard actually pushed a new agent
    pub fn pushed(&self) -> bool {
        self.pushed
    }
}

impl Deref for AgentGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for AgentGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for AgentGuard<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.scope.agents.pop();
            self.scope.get_and_clear_death_status();
        }
    }
}

/// Leaves try mode when dropped
pub struct TryModeGuard<'a> {
    scope: &'a mut Scope,
}

impl Deref for TryModeGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for TryModeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for TryModeGuard<'_> {
    fn drop(&mut self) {
        self.scope.try_depth = self.scope.try_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::agent::Species;
    use crate::runtime::world::World;
    use crate::runtime::{Runtime, RuntimeConfig};

    fn scope() -> (Arc<World>, Scope) {
        let world = Arc::new(World::new(Species::new("world").with_micro_species("prey")));
        world.register_species(Species::new("prey"));
        let runtime = Runtime::new(RuntimeConfig::default(), world.clone()).unwrap();
        let scope = runtime.scope_for(world.root(), "test");
        (world, scope)
    }

    #[test]
    fn test_frames_are_balanced_on_early_return() {
        let (_world, mut scope) = scope();
        fn fails(scope: &mut Scope) -> ExecResult<()> {
            let mut frame = scope.enter("outer");
            frame.declare("x", Value::Int(1));
            let inner = frame.enter("inner");
            assert_eq!(inner.depth(), 3);
            Err(ExecError::Raised("boom".into()))
        }
        assert!(fails(&mut scope).is_err());
        assert_eq!(scope.depth(), 1);
        assert!(!scope.has_var("x"));
        let stats = scope.stats();
        assert_eq!(stats.pushes, stats.pops);
        assert_eq!(stats.max_depth, 3);
    }

    #[test]
    fn test_variable_shadowing_and_assignment() {
        let (_world, mut scope) = scope();
        scope.declare("x", Value::Int(1));
        {
            let mut frame = scope.enter("loop");
            frame.declare("y", Value::Int(2));
            assert!(frame.set_var("x", Value::Int(5)));
            assert!(!frame.set_var("z", Value::Int(0)));
            assert_eq!(frame.get_var("y"), Some(Value::Int(2)));
        }
        assert_eq!(scope.get_var("x"), Some(Value::Int(5)));
        assert_eq!(scope.get_var("y"), None);
    }

    #[test]
    fn test_get_and_clear_only_clears_expected() {
        let (_world, mut scope) = scope();
        scope.set_return_status();
        assert_eq!(scope.get_and_clear_break_status(), FlowStatus::Return);
        assert_eq!(scope.flow_status(), FlowStatus::Return);
        assert_eq!(scope.get_and_clear_return_status(), FlowStatus::Return);
        assert_eq!(scope.flow_status(), FlowStatus::Normal);
        assert!(!scope.interrupted());
    }

    #[test]
    fn test_agent_pop_clears_death() {
        let (world, mut scope) = scope();
        let prey = world.spawn("prey", 1).unwrap().remove(0);
        {
            let mut guard = scope.with_agent(prey.clone());
            assert!(guard.pushed());
            assert_eq!(guard.agent().map(|agent| agent.id()), Some(prey.id()));
            guard.set_death_status();
        }
        assert_eq!(scope.flow_status(), FlowStatus::Normal);

        let root = world.root();
        {
            let mut guard = scope.with_agent(root);
            assert!(!guard.pushed());
            guard.set_death_status();
        }
        assert_eq!(scope.flow_status(), FlowStatus::Die);
    }

    #[test]
    fn test_try_mode_is_reentrant() {
        let (_world, mut scope) = scope();
        {
            let mut outer = scope.try_mode();
            {
                let inner = outer.try_mode();
                assert!(inner.is_in_try_mode());
            }
            assert!(outer.is_in_try_mode());
        }
        assert!(!scope.is_in_try_mode());
    }

    #[test]
    fn test_fork_copies_frames_but_not_flow() {
        let (_world, mut scope) = scope();
        scope.declare("shared", Value::Int(7));
        scope.set_break_status();
        let mut forked = scope.fork("worker");
        assert_eq!(forked.get_var("shared"), Some(Value::Int(7)));
        assert_eq!(forked.flow_status(), FlowStatus::Normal);
        forked.set_var("shared", Value::Int(8));
        assert_eq!(scope.get_var("shared"), Some(Value::Int(7)));
    }
}
