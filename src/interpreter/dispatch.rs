//! Dispatch statements
//!
//! `ask`, `create`, `capture`, `release`, `migrate` and `do` all follow the
//! same pattern: resolve the target agents, run a remote sequence (or an
//! action) for each of them, then aggregate. Multi-target bodies go through
//! [`fan_out`], which runs sequentially or on the worker pool depending on
//! the `parallel:` hint.
//!
//! Capture, release and migrate never abort on an agent that cannot be
//! moved: incompatible agents are collected and reported together once every
//! other agent has been moved, before the body runs.

use super::args::Arguments;
use super::expr::{Expr, Expression};
use super::statement::{RemoteSequence, Sequence};
use super::value::{Value, ValueType};
use crate::runtime::agent::AgentRef;
use crate::runtime::error::{ExecError, ExecResult};
use crate::runtime::flow::{ExecutionResult, FlowStatus};
use crate::runtime::pool::{parallel_threshold, runs_in_parallel};
use crate::runtime::report::Severity;
use crate::runtime::scope::Scope;
use crate::runtime::world::{InitRecord, Population, Simulation};

/// Run `body` once per target
///
/// Sequential dispatch follows target order, stops when the scope is
/// interrupted, and consumes a `break` raised by the body. With
/// `stop_on_failure` it also stops at the first target whose run failed.
/// Parallel dispatch gives every worker its own forked scope; results keep
/// target order and the first error (if any) is returned once all workers
/// are done.
pub fn fan_out(
    scope: &mut Scope,
    body: &RemoteSequence,
    targets: &[AgentRef],
    hint: &Value,
    stop_on_failure: bool,
) -> ExecResult<Vec<ExecutionResult>> {
    if body.is_empty() || targets.is_empty() {
        return Ok(Vec::new());
    }
    let threshold = parallel_threshold(hint, scope.config());
    if runs_in_parallel(threshold, targets.len()) {
        tracing::debug!(targets = targets.len(), threshold, "parallel dispatch");
        let base: &Scope = scope;
        let outcomes = base.engine().pool().run(targets, threshold, |agent| {
            let mut worker = base.fork(format!("{}/{}", base.name(), agent.name()));
            worker.execute_remote(body, agent)
        });
        return outcomes.into_iter().collect();
    }

    tracing::debug!(targets = targets.len(), "sequential dispatch");
    let mut results = Vec::with_capacity(targets.len());
    for agent in targets {
        if scope.interrupted() {
            break;
        }
        let result = scope.execute_remote(body, agent)?;
        let passed = result.passed;
        results.push(result);
        if scope.get_and_clear_break_status() == FlowStatus::Break {
            break;
        }
        if stop_on_failure && !passed {
            break;
        }
    }
    Ok(results)
}

fn agent_list(agents: &[AgentRef]) -> Value {
    Value::typed_list(
        ValueType::Agent,
        agents.iter().cloned().map(Value::Agent).collect(),
    )
}

fn store_returns(scope: &mut Scope, returns: Option<&String>, value: &Value) {
    if let Some(name) = returns {
        scope.declare(name.clone(), value.clone());
    }
}

fn evaluate_hint(scope: &mut Scope, hint: Option<&Expr>) -> ExecResult<Value> {
    match hint {
        Some(expr) => expr.evaluate(scope),
        None => Ok(Value::Nil),
    }
}

/// Report every agent that could not be moved in a single error
fn report_rejected(scope: &Scope, verb: &str, rejected: &[AgentRef], reason: &str) {
    if rejected.is_empty() {
        return;
    }
    let names: Vec<&str> = rejected.iter().map(|agent| agent.name()).collect();
    let executor = scope
        .agent()
        .map(|agent| agent.name().to_string())
        .unwrap_or_default();
    tracing::warn!(count = rejected.len(), "{} rejected agents", verb);
    scope.report(
        Severity::Error,
        format!("{} can't {} {} {}", executor, verb, names.join(", "), reason),
    );
}

/// First population of `species` hosted by `start` or one of its hosts
fn population_above(
    world: &dyn Simulation,
    start: Option<AgentRef>,
    species: &str,
) -> Option<Population> {
    let mut current = start;
    while let Some(host) = current {
        if let Some(population) = world.population(&host, species) {
            return Some(population);
        }
        current = host.host();
    }
    None
}

fn single_agent(statement: &str, value: Value) -> ExecResult<AgentRef> {
    match value {
        Value::Agent(agent) => Ok(agent),
        Value::Nil => Err(ExecError::NilAgent {
            statement: statement.to_string(),
        }),
        other => Err(ExecError::NotAnAgent {
            statement: statement.to_string(),
            found: other.to_string(),
        }),
    }
}

// ---- ask ----------------------------------------------------------------

/// `ask target { ... }`
#[derive(Debug, Clone)]
pub struct AskStatement {
    target: Expr,
    body: RemoteSequence,
    parallel: Option<Expr>,
}

impl AskStatement {
    /// Ask `target` (an agent, a container of agents or a species) to run `body`
    pub fn new(target: Expr, body: Sequence) -> Self {
        Self {
            target,
            body: RemoteSequence::new("ask", body),
            parallel: None,
        }
    }

    /// Set the `parallel:` hint
    pub fn parallel(mut self, hint: Expr) -> Self {
        self.parallel = Some(hint);
        self
    }

    /// Run the body for the target(s).
    ///
    /// A single agent yields the value of its run; a collection yields nil.
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let target = self.target.evaluate(scope)?;
        let targets = match &target {
            Value::Agent(agent) => {
                let result = scope.execute_remote(&self.body, agent)?;
                return Ok(result.value);
            }
            Value::Species(species) => {
                let world = scope.world();
                match scope.agent().and_then(|agent| world.population_for(agent, species)) {
                    Some(population) => world.members(&population.host, species),
                    None => world.agents_of(species),
                }
            }
            other if other.as_container().is_some() => other.agents(),
            Value::Nil => {
                return Err(ExecError::NilAgent {
                    statement: "ask".to_string(),
                });
            }
            other => {
                return Err(ExecError::NotAnAgent {
                    statement: "ask".to_string(),
                    found: other.to_string(),
                });
            }
        };
        let hint = evaluate_hint(scope, self.parallel.as_ref())?;
        fan_out(scope, &self.body, &targets, &hint, false)?;
        Ok(Value::Nil)
    }
}

// ---- create -------------------------------------------------------------

/// `create species number: n from: source with: [...] { ... }`
#[derive(Debug, Clone)]
pub struct CreateStatement {
    species: Option<Expr>,
    number: Option<Expr>,
    source: Option<Expr>,
    init: Arguments,
    body: RemoteSequence,
    returns: Option<String>,
    parallel: Option<Expr>,
}

impl CreateStatement {
    /// Create agents of `species` (the executor's own species when `None`)
    pub fn new(species: Option<Expr>) -> Self {
        Self {
            species,
            number: None,
            source: None,
            init: Arguments::new(),
            body: RemoteSequence::default(),
            returns: None,
            parallel: None,
        }
    }

    /// Set the `number:` facet
    pub fn number(mut self, number: Expr) -> Self {
        self.number = Some(number);
        self
    }

    /// Set the `from:` facet
    pub fn from_source(mut self, source: Expr) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the `with:` initial values
    pub fn with_init(mut self, init: Arguments) -> Self {
        self.init = init;
        self
    }

    /// Body run once per created agent
    pub fn body(mut self, body: Sequence) -> Self {
        self.body = RemoteSequence::new("create", body);
        self
    }

    /// Variable receiving the created agents
    pub fn returns(mut self, name: impl Into<String>) -> Self {
        self.returns = Some(name.into());
        self
    }

    /// Set the `parallel:` hint used for the body
    pub fn parallel(mut self, hint: Expr) -> Self {
        self.parallel = Some(hint);
        self
    }

    fn species_name(&self, scope: &mut Scope, executor: &AgentRef) -> ExecResult<String> {
        let Some(expr) = &self.species else {
            return Ok(executor.species_name());
        };
        match expr.evaluate(scope)? {
            Value::Species(name) | Value::String(name) => Ok(name),
            Value::Agent(agent) => Ok(agent.species_name()),
            other => Err(ExecError::UnknownSpecies(other.to_string())),
        }
    }

    /// Create the agents and run the body for each. Returns the created
    /// agents in creation order.
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let max = match &self.number {
            Some(expr) => Some(expr.evaluate(scope)?.as_int().unwrap_or(0)),
            None => None,
        };
        if self.source.is_none() && max.is_none_or(|count| count <= 0) {
            let empty = agent_list(&[]);
            store_returns(scope, self.returns.as_ref(), &empty);
            return Ok(empty);
        }

        let executor = scope.require_agent("create")?;
        let species = self.species_name(scope, &executor)?;
        let population = {
            let world = scope.world();
            if world.species(&species).is_none() {
                return Err(ExecError::UnknownSpecies(species));
            }
            world
                .population_for(&executor, &species)
                .ok_or_else(|| ExecError::NoPopulation {
                    species: species.clone(),
                    agent: executor.name().to_string(),
                })?
        };
        if population.species.is_abstract {
            return Err(ExecError::AbstractSpecies(species));
        }

        let limit = max.map(|count| count.max(0) as usize);
        let mut records: Vec<InitRecord> = Vec::new();
        match &self.source {
            Some(expr) => {
                let source = expr.evaluate(scope)?;
                let delegate = scope
                    .engine()
                    .delegates()
                    .find(&source)
                    .ok_or_else(|| ExecError::UnsupportedSource(source.to_string()))?;
                delegate
                    .create_from(&mut records, limit, &source)
                    .map_err(ExecError::Foreign)?;
                tracing::debug!(delegate = delegate.name(), records = records.len(), "records from source");
            }
            None => records.resize(limit.unwrap_or(0), InitRecord::new()),
        }

        if !self.init.is_empty() {
            for record in records.iter_mut() {
                let mut frame = scope.enter("create");
                for (name, value) in record.iter() {
                    frame.declare(name.clone(), value.clone());
                }
                let values = self.init.evaluate(&mut frame)?;
                record.extend(values.into_record());
            }
        }

        let agents = scope.world().create_agents(&population, records)?;
        let hint = evaluate_hint(scope, self.parallel.as_ref())?;
        fan_out(scope, &self.body, &agents, &hint, false)?;

        let created = agent_list(&agents);
        store_returns(scope, self.returns.as_ref(), &created);
        Ok(created)
    }
}

// ---- capture ------------------------------------------------------------

/// `capture agents as: micro_species { ... }`
#[derive(Debug, Clone)]
pub struct CaptureStatement {
    target: Expr,
    as_species: Option<String>,
    body: RemoteSequence,
    returns: Option<String>,
}

impl CaptureStatement {
    /// Capture the agents `target` evaluates to
    pub fn new(target: Expr) -> Self {
        Self {
            target,
            as_species: None,
            body: RemoteSequence::default(),
            returns: None,
        }
    }

    /// Micro-species receiving every captured agent
    pub fn as_species(mut self, species: impl Into<String>) -> Self {
        self.as_species = Some(species.into());
        self
    }

    /// Body run once per captured agent
    pub fn body(mut self, body: Sequence) -> Self {
        self.body = RemoteSequence::new("capture", body);
        self
    }

    /// Variable receiving the captured agents
    pub fn returns(mut self, name: impl Into<String>) -> Self {
        self.returns = Some(name.into());
        self
    }

    fn can_capture(macro_agent: &AgentRef, candidate: &AgentRef) -> bool {
        !candidate.is_dead()
            && !macro_agent.is_in_host_chain(candidate)
            && candidate.host().map(|host| host.id()) != Some(macro_agent.id())
    }

    /// Move the compatible agents into the executor's micro-populations
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let macro_agent = scope.require_agent("capture")?;
        let candidates = self.target.evaluate(scope)?.agents();
        let mut captured = Vec::new();
        let mut rejected = Vec::new();
        {
            let world = scope.world();
            let fixed = match &self.as_species {
                Some(species) => Some(world.population(&macro_agent, species).ok_or_else(|| {
                    ExecError::NoPopulation {
                        species: species.clone(),
                        agent: macro_agent.name().to_string(),
                    }
                })?),
                None => None,
            };
            for candidate in candidates {
                let population = match &fixed {
                    Some(population) => Some(population.clone()),
                    None => world.population(&macro_agent, &candidate.species_name()),
                };
                match population {
                    Some(population) if Self::can_capture(&macro_agent, &candidate) => {
                        match world.move_agent(&candidate, &population) {
                            Ok(()) => captured.push(candidate),
                            Err(error) => {
                                tracing::debug!(agent = candidate.name(), %error, "capture failed");
                                rejected.push(candidate);
                            }
                        }
                    }
                    _ => rejected.push(candidate),
                }
            }
        }

        let reason = match &self.as_species {
            Some(species) => format!("as {} agents", species),
            None => "as micro-agents: no appropriate micro-population can welcome them".to_string(),
        };
        report_rejected(scope, "capture", &rejected, &reason);
        fan_out(scope, &self.body, &captured, &Value::Nil, true)?;
        let result = agent_list(&captured);
        store_returns(scope, self.returns.as_ref(), &result);
        Ok(result)
    }
}

// ---- release ------------------------------------------------------------

/// `release agents as: species in: host { ... }`
#[derive(Debug, Clone)]
pub struct ReleaseStatement {
    target: Expr,
    as_species: Option<String>,
    into: Option<Expr>,
    body: RemoteSequence,
    returns: Option<String>,
}

impl ReleaseStatement {
    /// Release the micro-agents `target` evaluates to
    pub fn new(target: Expr) -> Self {
        Self {
            target,
            as_species: None,
            into: None,
            body: RemoteSequence::default(),
            returns: None,
        }
    }

    /// Destination species
    pub fn as_species(mut self, species: impl Into<String>) -> Self {
        self.as_species = Some(species.into());
        self
    }

    /// Destination host
    pub fn into_host(mut self, host: Expr) -> Self {
        self.into = Some(host);
        self
    }

    /// Body run once per released agent
    pub fn body(mut self, body: Sequence) -> Self {
        self.body = RemoteSequence::new("release", body);
        self
    }

    /// Variable receiving the released agents
    pub fn returns(mut self, name: impl Into<String>) -> Self {
        self.returns = Some(name.into());
        self
    }

    /// Move the executor's micro-agents to their destination population
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let executor = scope.require_agent("release")?;
        let candidates: Vec<AgentRef> = self
            .target
            .evaluate(scope)?
            .agents()
            .into_iter()
            .filter(|agent| agent.host().map(|host| host.id()) == Some(executor.id()))
            .collect();
        let destination_host = match &self.into {
            Some(expr) => Some(single_agent("release", expr.evaluate(scope)?)?),
            None => None,
        };

        let mut released = Vec::new();
        let mut rejected = Vec::new();
        {
            let world = scope.world();
            for candidate in candidates {
                let species = self
                    .as_species
                    .clone()
                    .unwrap_or_else(|| candidate.species_name());
                let population = match &destination_host {
                    Some(host) if host.id() == executor.id() => None,
                    Some(host) => world.population(host, &species),
                    None => population_above(world, executor.host(), &species),
                };
                let moved = match population {
                    Some(population) => world.move_agent(&candidate, &population).is_ok(),
                    None => false,
                };
                if moved {
                    released.push(candidate);
                } else {
                    rejected.push(candidate);
                }
            }
        }

        report_rejected(
            scope,
            "release",
            &rejected,
            "because no destination population can welcome them",
        );
        fan_out(scope, &self.body, &released, &Value::Nil, true)?;
        let result = agent_list(&released);
        store_returns(scope, self.returns.as_ref(), &result);
        Ok(result)
    }
}

// ---- migrate ------------------------------------------------------------

/// `migrate source target: other_micro_species { ... }`
#[derive(Debug, Clone)]
pub struct MigrateStatement {
    source: String,
    target: String,
    body: RemoteSequence,
    returns: Option<String>,
}

impl MigrateStatement {
    /// Move every micro-agent of `source` to the `target` micro-population
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            body: RemoteSequence::default(),
            returns: None,
        }
    }

    /// Body run once per immigrant
    pub fn body(mut self, body: Sequence) -> Self {
        self.body = RemoteSequence::new("migrate", body);
        self
    }

    /// Variable receiving the immigrants
    pub fn returns(mut self, name: impl Into<String>) -> Self {
        self.returns = Some(name.into());
        self
    }

    /// Re-parent the executor's `source` micro-agents into `target`
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let executor = scope.require_agent("migrate")?;
        let mut immigrants = Vec::new();
        let mut rejected = Vec::new();
        {
            let world = scope.world();
            let no_population = |species: &str| ExecError::NoPopulation {
                species: species.to_string(),
                agent: executor.name().to_string(),
            };
            if world.population(&executor, &self.source).is_none() {
                return Err(no_population(&self.source));
            }
            let destination = world
                .population(&executor, &self.target)
                .ok_or_else(|| no_population(&self.target))?;
            for agent in world.members(&executor, &self.source) {
                match world.move_agent(&agent, &destination) {
                    Ok(()) => immigrants.push(agent),
                    Err(error) => {
                        tracing::debug!(agent = agent.name(), %error, "migration failed");
                        rejected.push(agent);
                    }
                }
            }
        }

        report_rejected(scope, "migrate", &rejected, &format!("to {}", self.target));
        fan_out(scope, &self.body, &immigrants, &Value::Nil, true)?;
        let result = agent_list(&immigrants);
        store_returns(scope, self.returns.as_ref(), &result);
        Ok(result)
    }
}

// ---- do -----------------------------------------------------------------

/// `do action(args)` / `invoke action(args)`
#[derive(Debug, Clone)]
pub struct DoStatement {
    action: String,
    args: Arguments,
    target: Option<Expr>,
    species: Option<String>,
    returns: Option<String>,
}

impl DoStatement {
    /// Invoke `action` on the current agent
    pub fn new(action: impl Into<String>, args: Arguments) -> Self {
        Self {
            action: action.into(),
            args,
            target: None,
            species: None,
            returns: None,
        }
    }

    /// Invoke the action on another agent
    pub fn on(mut self, target: Expr) -> Self {
        self.target = Some(target);
        self
    }

    /// Resolve the action on `species` instead of the agent's own species
    /// (super invocation)
    pub fn resolved_in(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Variable receiving the action result
    pub fn returns(mut self, name: impl Into<String>) -> Self {
        self.returns = Some(name.into());
        self
    }

    /// Action name
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Actual arguments
    pub fn args(&self) -> &Arguments {
        &self.args
    }

    /// Resolve and run the action; returns its result
    pub fn execute(&self, scope: &mut Scope) -> ExecResult<Value> {
        let (agent, caller) = match &self.target {
            Some(expr) => {
                let agent = single_agent("do", expr.evaluate(scope)?)?;
                (agent, scope.agent().cloned())
            }
            None => (scope.require_agent("do")?, scope.myself()),
        };
        if agent.is_dead() {
            tracing::debug!(agent = agent.name(), action = %self.action, "skipping action of a dead agent");
            return Ok(Value::Nil);
        }
        let species = self
            .species
            .clone()
            .unwrap_or_else(|| agent.species_name());
        let action = scope
            .world()
            .find_action(&species, &self.action)
            .ok_or_else(|| ExecError::UnknownAction {
                action: self.action.clone(),
                species: species.clone(),
            })?;
        let args = self.args.bind(action.formals(), scope)?;
        let value = {
            let mut guard = scope.with_agent(agent);
            action.invoke(&mut guard, args, caller)?
        };
        store_returns(scope, self.returns.as_ref(), &value);
        Ok(value)
    }
}
