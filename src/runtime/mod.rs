//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that owns the shared
//! services (configuration, world, worker pool, error sink, create delegates)
//! and runs statement trees on behalf of agents.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Submodules
pub mod agent;
pub mod error;
pub mod flow;
pub mod pool;
pub mod registry;
pub mod report;
pub mod scope;
pub mod world;

use agent::AgentRef;
use error::{ExecError, ExecResult};
use flow::FlowStatus;
use pool::WorkerPool;
use registry::{CreateDelegate, DelegateRegistry};
use report::{ErrorSink, TracingSink};
use scope::Scope;
use world::Simulation;

use crate::interpreter::statement::Sequence;
use crate::interpreter::value::Value;

/// Configuration for the statement runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target count above which a `parallel: true` dispatch uses the pool
    pub parallel_threshold: usize,

    /// Number of threads of the worker pool
    pub worker_threads: usize,

    /// Log every executed statement and frame push
    pub trace: bool,

    /// Report coercion warnings as errors
    pub fail_on_warnings: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 20,
            worker_threads: 4,
            trace: false,
            fail_on_warnings: false,
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON configuration file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded runtime config");
        Ok(config)
    }
}

/// Services shared by every scope of a runtime
pub struct Engine {
    config: RuntimeConfig,
    world: Arc<dyn Simulation>,
    sink: Arc<dyn ErrorSink>,
    pool: WorkerPool,
    delegates: DelegateRegistry,
    cancelled: AtomicBool,
}

impl Engine {
    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The simulation model
    pub fn world(&self) -> &dyn Simulation {
        self.world.as_ref()
    }

    /// Receiver of recoverable errors and warnings
    pub fn sink(&self) -> &dyn ErrorSink {
        self.sink.as_ref()
    }

    /// Worker pool for parallel dispatch
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Create delegates
    pub fn delegates(&self) -> &DelegateRegistry {
        &self.delegates
    }

    /// Whether the current run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Ask every scope to stop at the next loop or dispatch boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("delegates", &self.delegates)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// How running a statement tree for one agent ended
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Ran to the end
    Completed(Value),
    /// Ended early on a flow signal (`die`, a stray `return`, ...)
    Stopped(FlowStatus, Value),
    /// Raised an error nothing contained
    Failed(ExecError),
}

impl ExecutionOutcome {
    /// Whether the tree ran to the end
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(_))
    }

    /// Value produced, unless the run failed
    pub fn value(&self) -> Option<&Value> {
        match self {
            ExecutionOutcome::Completed(value) | ExecutionOutcome::Stopped(_, value) => Some(value),
            ExecutionOutcome::Failed(_) => None,
        }
    }
}

/// The main runtime orchestrator
#[derive(Debug, Clone)]
pub struct Runtime {
    engine: Arc<Engine>,
}

impl Runtime {
    /// Create a runtime reporting to `tracing`
    pub fn new(config: RuntimeConfig, world: Arc<dyn Simulation>) -> ExecResult<Self> {
        Self::with_sink(config, world, Arc::new(TracingSink))
    }

    /// Create a runtime reporting to `sink`
    pub fn with_sink(
        config: RuntimeConfig,
        world: Arc<dyn Simulation>,
        sink: Arc<dyn ErrorSink>,
    ) -> ExecResult<Self> {
        let pool = WorkerPool::new(config.worker_threads)?;
        tracing::debug!(
            threads = pool.threads(),
            parallel_threshold = config.parallel_threshold,
            "runtime started"
        );
        Ok(Self {
            engine: Arc::new(Engine {
                config,
                world,
                sink,
                pool,
                delegates: DelegateRegistry::new(),
                cancelled: AtomicBool::new(false),
            }),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        self.engine.config()
    }

    /// Shared engine services
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Register a create delegate
    pub fn register_delegate(&self, delegate: Arc<dyn CreateDelegate>) {
        self.engine.delegates().register(delegate);
    }

    /// Fresh scope executing on behalf of `agent`
    pub fn scope_for(&self, agent: AgentRef, name: impl Into<String>) -> Scope {
        Scope::new(self.engine.clone(), agent, name)
    }

    /// Run `sequence` for `agent` in a fresh scope
    pub fn run_for(&self, sequence: &Sequence, agent: &AgentRef) -> ExecutionOutcome {
        if agent.is_dead() {
            return ExecutionOutcome::Stopped(FlowStatus::Die, Value::Nil);
        }
        let mut scope = self.scope_for(agent.clone(), agent.name());
        match sequence.execute(&mut scope) {
            Ok(value) => match scope.flow_status() {
                FlowStatus::Normal => ExecutionOutcome::Completed(value),
                status => ExecutionOutcome::Stopped(status, value),
            },
            Err(error) => {
                tracing::warn!(agent = agent.name(), %error, "execution failed");
                ExecutionOutcome::Failed(error)
            }
        }
    }

    /// Run `sequence` once for every live agent of `species`
    ///
    /// Agents are snapshotted before the first one runs, so agents created
    /// during the step wait for the next one. Dead agents are swept out of
    /// the world first.
    pub fn step_species(
        &self,
        species: &str,
        sequence: &Sequence,
    ) -> Vec<(AgentRef, ExecutionOutcome)> {
        let world = self.engine.world();
        world.sweep_dead();
        let agents = world.agents_of(species);
        let mut outcomes = Vec::with_capacity(agents.len());
        for agent in agents {
            if self.engine.is_cancelled() {
                break;
            }
            let outcome = self.run_for(sequence, &agent);
            outcomes.push((agent, outcome));
        }
        outcomes
    }

    /// Stop running statements at the next loop or dispatch boundary
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Allow execution again after [`Runtime::cancel`]
    pub fn reset_cancel(&self) {
        self.engine.reset_cancel();
    }
}

/// World with a `world` root hosting `prey` (energy 10) and `predator`
#[cfg(test)]
pub(crate) fn test_scope() -> (Arc<world::World>, Scope) {
    use agent::Species;

    let world = Arc::new(world::World::new(
        Species::new("world")
            .with_micro_species("prey")
            .with_micro_species("predator"),
    ));
    world.register_species(Species::new("prey").with_attribute("energy", Value::Int(10)));
    world.register_species(Species::new("predator"));
    let runtime = Runtime::new(RuntimeConfig::default(), world.clone())
        .unwrap_or_else(|err| panic!("runtime: {}", err));
    let scope = runtime.scope_for(world.root(), "test");
    (world, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::expr::Expr;
    use crate::interpreter::statement::Statement;
    use std::io::Write;

    #[test]
    fn test_config_load_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"parallel_threshold": 5, "trace": true}}"#).unwrap();
        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.parallel_threshold, 5);
        assert!(config.trace);
        assert_eq!(config.worker_threads, 4);
        assert!(!config.fail_on_warnings);
    }

    #[test]
    fn test_run_for_outcomes() {
        let (world, scope) = test_scope();
        let runtime = Runtime {
            engine: scope.engine().clone(),
        };
        let prey = world.spawn("prey", 2).unwrap();

        let ok = Sequence::new(vec![Statement::Write(Expr::str("hello"))]);
        assert!(runtime.run_for(&ok, &prey[0]).is_completed());

        let die = Sequence::new(vec![Statement::Die]);
        assert!(matches!(
            runtime.run_for(&die, &prey[0]),
            ExecutionOutcome::Stopped(FlowStatus::Die, _)
        ));
        assert!(prey[0].is_dead());

        let fail = Sequence::new(vec![Statement::Raise(Expr::str("boom"))]);
        assert!(matches!(
            runtime.run_for(&fail, &prey[1]),
            ExecutionOutcome::Failed(ExecError::Raised(_))
        ));
    }

    #[test]
    fn test_step_species_skips_dead_and_respects_cancel() {
        let (world, scope) = test_scope();
        let runtime = Runtime {
            engine: scope.engine().clone(),
        };
        let prey = world.spawn("prey", 3).unwrap();
        prey[1].kill();
        let body = Sequence::new(vec![Statement::Set {
            target: None,
            name: "energy".into(),
            value: Expr::Int(0),
        }]);
        let outcomes = runtime.step_species("prey", &body);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(prey[2].attribute("energy"), Some(Value::Int(0)));

        runtime.cancel();
        assert!(runtime.step_species("prey", &body).is_empty());
        runtime.reset_cancel();
        assert_eq!(runtime.step_species("prey", &body).len(), 2);
    }

    #[test]
    fn test_step_species_frees_killed_agents() {
        let (world, scope) = test_scope();
        let runtime = Runtime {
            engine: scope.engine().clone(),
        };
        let die = Sequence::new(vec![Statement::Die]);
        let mut handles = Vec::new();
        for _ in 0..5 {
            for agent in world.spawn("prey", 10).unwrap() {
                runtime.run_for(&die, &agent);
                handles.push(Arc::downgrade(&agent));
            }
        }
        assert!(runtime.step_species("prey", &die).is_empty());
        assert!(handles.iter().all(|handle| handle.upgrade().is_none()));
    }
}
