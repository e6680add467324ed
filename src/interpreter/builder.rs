//! Builders that turn descriptions into executable statements
//!
//! Building is where structural problems are caught: incomplete loops,
//! `put` without an index, container statements on fixed-length
//! containers, unknown actions or arguments. Type mismatches in container
//! statements are not errors; they are collected as [`Diagnostic`]s.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::action::Action;
use super::dispatch::{
    AskStatement, CaptureStatement, CreateStatement, DoStatement, MigrateStatement,
    ReleaseStatement,
};
use super::expr::Expr;
use super::ir::{ActionDesc, CreateDesc, DoDesc, LoopDesc, ModelDesc, SpeciesDesc, StatementDesc};
use super::looping::LoopStatement;
use super::mutation::{ContainerFacets, ContainerStatement, MutationKind};
use super::statement::{Sequence, Statement};
use super::try_catch::TryStatement;
use super::value::Value;
use crate::runtime::agent::{AgentRef, Species};
use crate::runtime::error::{BuildError, BuildResult};
use crate::runtime::world::{Simulation, World};
use crate::runtime::{ExecutionOutcome, Runtime};

/// Non-blocking problem found while building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Statement keyword
    pub statement: String,
    /// Description of the problem
    pub message: String,
}

/// Statement builder
///
/// A builder optionally knows the model and the species whose code it is
/// building; both are needed to check `do` statements and to resolve
/// `invoke`.
#[derive(Debug, Default)]
pub struct Builder<'m> {
    model: Option<&'m ModelDesc>,
    species: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'m> Builder<'m> {
    /// Builder with no model knowledge
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder checking actions against `model`
    pub fn for_model(model: &'m ModelDesc) -> Self {
        Self {
            model: Some(model),
            species: None,
            diagnostics: Vec::new(),
        }
    }

    /// Build the code of `species` from now on
    pub fn in_species(&mut self, species: impl Into<String>) {
        self.species = Some(species.into());
    }

    /// Diagnostics collected so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the collected diagnostics
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn diagnose(&mut self, statement: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            statement: statement.to_string(),
            message: message.into(),
        });
    }

    /// Build a sequence
    pub fn sequence(&mut self, descs: &[StatementDesc]) -> BuildResult<Sequence> {
        descs
            .iter()
            .map(|desc| self.statement(desc))
            .collect::<BuildResult<Vec<_>>>()
            .map(Sequence::new)
    }

    /// Build one statement
    pub fn statement(&mut self, desc: &StatementDesc) -> BuildResult<Statement> {
        Ok(match desc {
            StatementDesc::Let { name, value } => Statement::Let {
                name: name.clone(),
                value: value.clone().map(Expr::folded),
            },
            StatementDesc::Set {
                target,
                name,
                value,
            } => Statement::Set {
                target: target.clone(),
                name: name.clone(),
                value: value.clone().folded(),
            },
            StatementDesc::If {
                condition,
                then,
                otherwise,
            } => Statement::If {
                condition: condition.clone(),
                then: self.sequence(then)?,
                otherwise: match otherwise {
                    Some(otherwise) => Some(self.sequence(otherwise)?),
                    None => None,
                },
            },
            StatementDesc::Block { body } => Statement::Block(self.sequence(body)?),
            StatementDesc::Loop(desc) => Statement::Loop(self.build_loop(desc)?),
            StatementDesc::Ask {
                target,
                parallel,
                body,
            } => {
                let mut ask = AskStatement::new(target.clone(), self.sequence(body)?);
                if let Some(hint) = parallel {
                    ask = ask.parallel(hint.clone());
                }
                Statement::Ask(ask)
            }
            StatementDesc::Create(desc) => Statement::Create(self.build_create(desc)?),
            StatementDesc::Capture {
                target,
                as_species,
                returns,
                body,
            } => {
                let mut capture = CaptureStatement::new(target.clone()).body(self.sequence(body)?);
                if let Some(species) = as_species {
                    capture = capture.as_species(species.clone());
                }
                if let Some(name) = returns {
                    capture = capture.returns(name.clone());
                }
                Statement::Capture(capture)
            }
            StatementDesc::Release {
                target,
                as_species,
                into,
                returns,
                body,
            } => {
                let mut release = ReleaseStatement::new(target.clone()).body(self.sequence(body)?);
                if let Some(species) = as_species {
                    release = release.as_species(species.clone());
                }
                if let Some(host) = into {
                    release = release.into_host(host.clone());
                }
                if let Some(name) = returns {
                    release = release.returns(name.clone());
                }
                Statement::Release(release)
            }
            StatementDesc::Migrate {
                source,
                target,
                returns,
                body,
            } => {
                let mut migrate =
                    MigrateStatement::new(source.clone(), target.clone()).body(self.sequence(body)?);
                if let Some(name) = returns {
                    migrate = migrate.returns(name.clone());
                }
                Statement::Migrate(migrate)
            }
            StatementDesc::Do(desc) => Statement::Do(self.build_do(desc, false)?),
            StatementDesc::Invoke(desc) => Statement::Do(self.build_do(desc, true)?),
            StatementDesc::Add(facets) => self.container(MutationKind::Add, facets)?,
            StatementDesc::Remove(facets) => self.container(MutationKind::Remove, facets)?,
            StatementDesc::Put(facets) => self.container(MutationKind::Put, facets)?,
            StatementDesc::Try { body, catch } => {
                let body = self.sequence(body)?;
                let catch = match catch {
                    Some(catch) => Some(self.sequence(catch)?),
                    None => None,
                };
                Statement::Try(TryStatement::new(body, catch))
            }
            StatementDesc::Break => Statement::Break,
            StatementDesc::Continue => Statement::Continue,
            StatementDesc::Return { value } => Statement::Return(value.clone()),
            StatementDesc::Die => Statement::Die,
            StatementDesc::Write { message } => Statement::Write(message.clone()),
            StatementDesc::Warn { message } => Statement::Warn(message.clone()),
            StatementDesc::Error { message } => Statement::Raise(message.clone()),
        })
    }

    fn build_loop(&mut self, desc: &LoopDesc) -> BuildResult<LoopStatement> {
        let kinds = [
            desc.times.is_some(),
            desc.over.is_some(),
            desc.condition.is_some(),
            desc.from.is_some() || desc.to.is_some(),
        ];
        if kinds.iter().filter(|given| **given).count() > 1 {
            self.diagnose("loop", "several iteration kinds given; only the first of times, over, while, from/to is used");
        }
        let body = self.sequence(&desc.body)?;
        let var = |kind: &str| {
            desc.var.clone().ok_or_else(|| BuildError::Incomplete {
                statement: "loop",
                detail: format!("a loop variable is required with '{}'", kind),
            })
        };

        if let Some(times) = &desc.times {
            return Ok(LoopStatement::times(times.clone().folded(), body));
        }
        if let Some(source) = &desc.over {
            return Ok(LoopStatement::over(var("over")?, source.clone(), body));
        }
        if let Some(condition) = &desc.condition {
            return Ok(LoopStatement::repeat_while(condition.clone(), body));
        }
        match (&desc.from, &desc.to) {
            (Some(from), Some(to)) => Ok(LoopStatement::range(
                var("from")?,
                from.clone().folded(),
                to.clone().folded(),
                desc.step.clone().map(Expr::folded),
                body,
            )),
            (Some(_), None) => Err(BuildError::Incomplete {
                statement: "loop",
                detail: "'from' requires 'to'".to_string(),
            }),
            (None, Some(_)) => Err(BuildError::Incomplete {
                statement: "loop",
                detail: "'to' requires 'from'".to_string(),
            }),
            (None, None) => Err(BuildError::Incomplete {
                statement: "loop",
                detail: "one of 'times', 'over', 'while' or 'from'/'to' is required".to_string(),
            }),
        }
    }

    fn build_create(&mut self, desc: &CreateDesc) -> BuildResult<CreateStatement> {
        let mut create = CreateStatement::new(desc.species.clone())
            .with_init(desc.with.clone())
            .body(self.sequence(&desc.body)?);
        if let Some(number) = &desc.number {
            create = create.number(number.clone().folded());
        }
        if let Some(source) = &desc.from {
            create = create.from_source(source.clone());
        }
        if let Some(hint) = &desc.parallel {
            create = create.parallel(hint.clone());
        }
        if let Some(name) = &desc.returns {
            create = create.returns(name.clone());
        }
        Ok(create)
    }

    fn build_do(&mut self, desc: &DoDesc, invoke: bool) -> BuildResult<DoStatement> {
        let keyword = if invoke { "invoke" } else { "do" };
        let mut stmt = DoStatement::new(desc.action.clone(), desc.args.clone());
        let lookup = if invoke {
            let context = self.species.clone().ok_or_else(|| BuildError::Incomplete {
                statement: keyword,
                detail: "only available inside a species".to_string(),
            })?;
            let parent = self
                .model
                .and_then(|model| model.species(&context))
                .and_then(|species| species.parent.clone())
                .ok_or_else(|| BuildError::Incomplete {
                    statement: keyword,
                    detail: format!("{} has no parent species", context),
                })?;
            stmt = stmt.resolved_in(parent.clone());
            Some(parent)
        } else if desc.target.is_none() {
            self.species.clone()
        } else {
            None
        };
        if let Some(target) = &desc.target {
            stmt = stmt.on(target.clone());
        }
        if let Some(name) = &desc.returns {
            stmt = stmt.returns(name.clone());
        }

        if let (Some(model), Some(species)) = (self.model, lookup) {
            let action = find_action(model, &species, &desc.action).ok_or_else(|| {
                BuildError::UnknownAction {
                    action: desc.action.clone(),
                    species: species.clone(),
                }
            })?;
            if let Some(argument) = desc
                .args
                .names()
                .find(|name| !action.args.iter().any(|formal| formal.name == *name))
            {
                return Err(BuildError::UnknownArgument {
                    action: desc.action.clone(),
                    argument: argument.to_string(),
                });
            }
        }
        Ok(stmt)
    }

    fn container(&mut self, kind: MutationKind, facets: &ContainerFacets) -> BuildResult<Statement> {
        let stmt = ContainerStatement::new(kind, facets.clone())?;
        for warning in stmt.warnings() {
            self.diagnose(stmt.keyword(), warning.clone());
        }
        Ok(Statement::Container(stmt))
    }
}

/// Action declared by `species` or one of its parents
fn find_action<'m>(model: &'m ModelDesc, species: &str, action: &str) -> Option<&'m ActionDesc> {
    let mut current = model.species(species);
    while let Some(desc) = current {
        if let Some(found) = desc.actions.iter().find(|candidate| candidate.name == action) {
            return Some(found);
        }
        current = desc.parent.as_deref().and_then(|parent| model.species(parent));
    }
    None
}

/// A model ready to run: its world, init block and per-species reflexes
#[derive(Debug)]
pub struct Model {
    name: String,
    world: Arc<World>,
    init: Sequence,
    reflexes: Vec<(String, Sequence)>,
    diagnostics: Vec<Diagnostic>,
}

impl Model {
    /// Build every species and statement tree of `desc`
    pub fn build(desc: &ModelDesc) -> BuildResult<Self> {
        for species in std::iter::once(&desc.world).chain(&desc.species) {
            let references = species.parent.iter().chain(species.micro_species.iter());
            for name in references {
                if desc.species(name).is_none() {
                    return Err(BuildError::UnknownSpecies(name.clone()));
                }
            }
        }

        let mut diagnostics = Vec::new();
        let mut reflexes = Vec::new();
        let (root, reflex) = build_species(desc, &desc.world, &mut diagnostics)?;
        reflexes.push((root.name.clone(), reflex));
        let world = Arc::new(World::new(root));
        for species in &desc.species {
            let (species, reflex) = build_species(desc, species, &mut diagnostics)?;
            reflexes.push((species.name.clone(), reflex));
            world.register_species(species);
        }

        let mut builder = Builder::for_model(desc);
        builder.in_species(desc.world.name.clone());
        let init = builder.sequence(&desc.init)?;
        diagnostics.extend(builder.into_diagnostics());

        tracing::debug!(
            model = %desc.name,
            species = reflexes.len(),
            diagnostics = diagnostics.len(),
            "model built"
        );
        Ok(Self {
            name: desc.name.clone(),
            world,
            init,
            reflexes,
            diagnostics,
        })
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The model's world
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Construction diagnostics
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run the init block for the root agent
    pub fn initialize(&self, runtime: &Runtime) -> ExecutionOutcome {
        runtime.run_for(&self.init, &self.world.root())
    }

    /// Run one step: the root's reflex, then every species' reflex for each
    /// of its live agents, in declaration order
    pub fn step(&self, runtime: &Runtime) -> Vec<(AgentRef, ExecutionOutcome)> {
        self.world.sweep_dead();
        let root = self.world.root();
        let mut outcomes = Vec::new();
        for (species, reflex) in &self.reflexes {
            if reflex.is_empty() {
                continue;
            }
            if *species == root.species_name() {
                outcomes.push((root.clone(), runtime.run_for(reflex, &root)));
            } else {
                outcomes.extend(runtime.step_species(species, reflex));
            }
        }
        outcomes
    }

    /// Every live agent with its attributes, as JSON
    pub fn snapshot(&self) -> serde_json::Value {
        let root = self.world.root();
        let mut agents = vec![root];
        for name in self.world.species_names() {
            agents.extend(self.world.agents_of(&name));
        }
        let agents: Vec<serde_json::Value> = agents
            .iter()
            .map(|agent| {
                let attributes: serde_json::Map<String, serde_json::Value> = agent
                    .attributes()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                serde_json::json!({
                    "name": agent.name(),
                    "species": agent.species_name(),
                    "attributes": attributes,
                })
            })
            .collect();
        serde_json::json!({ "model": self.name, "agents": agents })
    }
}

fn build_species(
    model: &ModelDesc,
    desc: &SpeciesDesc,
    diagnostics: &mut Vec<Diagnostic>,
) -> BuildResult<(Species, Sequence)> {
    let mut species = Species::new(desc.name.clone());
    species.parent = desc.parent.clone();
    species.micro_species = desc.micro_species.clone();
    species.is_abstract = desc.is_abstract;
    species.attributes = desc
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), Value::from_json(value)))
        .collect();

    let mut builder = Builder::for_model(model);
    builder.in_species(desc.name.clone());
    for action in &desc.actions {
        let body = builder.sequence(&action.body)?;
        species = species.with_action(Action::new(action.name.clone(), action.args.clone(), body));
    }
    let reflex = builder.sequence(&desc.reflex)?;
    diagnostics.extend(builder.into_diagnostics());
    Ok((species, reflex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeConfig;
    use crate::runtime::test_scope;

    fn descs(json: &str) -> Vec<StatementDesc> {
        serde_json::from_str(json).unwrap()
    }

    const MODEL: &str = r#"{
        "name": "herd",
        "world": {
            "name": "world",
            "micro_species": ["prey"],
            "attributes": {"total": 0}
        },
        "species": [
            {
                "name": "animal",
                "abstract": true,
                "attributes": {"energy": 10},
                "actions": [
                    {"name": "eat", "args": [{"name": "amount", "default": {"int": 1}}], "body": [
                        {"kind": "set", "name": "energy", "value": {"binary": {"op": "add", "left": {"var": {"name": "energy"}}, "right": {"var": {"name": "amount"}}}}},
                        {"kind": "return", "value": {"var": {"name": "energy"}}}
                    ]}
                ]
            },
            {
                "name": "prey",
                "parent": "animal",
                "actions": [
                    {"name": "eat", "args": [{"name": "amount", "default": {"int": 1}}], "body": [
                        {"kind": "invoke", "action": "eat", "args": [["amount", {"binary": {"op": "mul", "left": {"var": {"name": "amount"}}, "right": {"int": 2}}}]]}
                    ]}
                ],
                "reflex": [
                    {"kind": "do", "action": "eat", "returns": "level"},
                    {"kind": "if", "condition": {"binary": {"op": "ge", "left": {"var": {"name": "level"}}, "right": {"int": 14}}}, "then": [{"kind": "die"}]}
                ]
            }
        ],
        "init": [
            {"kind": "create", "species": {"species": "prey"}, "number": {"int": 3}}
        ]
    }"#;

    #[test]
    fn test_times_loop_doubles() {
        let body = descs(
            r#"[
                {"kind": "let", "name": "s", "value": {"int": 1}},
                {"kind": "loop", "times": {"int": 3}, "body": [
                    {"kind": "set", "name": "s", "value": {"binary": {"op": "add", "left": {"var": {"name": "s"}}, "right": {"var": {"name": "s"}}}}}
                ]}
            ]"#,
        );
        let sequence = Builder::new().sequence(&body).unwrap();
        let (_world, mut scope) = test_scope();
        sequence.execute(&mut scope).unwrap();
        assert_eq!(scope.get_var("s"), Some(Value::Int(8)));
    }

    #[test]
    fn test_incomplete_loops_are_rejected() {
        let mut builder = Builder::new();
        for json in [
            r#"[{"kind": "loop"}]"#,
            r#"[{"kind": "loop", "var": "i", "from": {"int": 0}}]"#,
            r#"[{"kind": "loop", "over": {"var": {"name": "l"}}}]"#,
        ] {
            assert!(matches!(
                builder.sequence(&descs(json)),
                Err(BuildError::Incomplete { statement: "loop", .. })
            ));
        }
    }

    #[test]
    fn test_container_warnings_become_diagnostics() {
        let body = descs(
            r#"[{"kind": "add",
                 "container": {"var": {"name": "l", "ty": {"base": "list", "key": "int", "content": "int"}}},
                 "item": {"str": "x"}}]"#,
        );
        let mut builder = Builder::new();
        builder.sequence(&body).unwrap();
        assert_eq!(builder.diagnostics().len(), 1);
        assert_eq!(builder.diagnostics()[0].statement, "add");

        let put = descs(r#"[{"kind": "put", "container": {"var": {"name": "l"}}, "item": {"int": 1}}]"#);
        assert!(matches!(
            builder.sequence(&put),
            Err(BuildError::Incomplete { statement: "put", .. })
        ));
    }

    #[test]
    fn test_unknown_action_and_argument() {
        let model = ModelDesc::from_json(MODEL).unwrap();
        let mut builder = Builder::for_model(&model);
        builder.in_species("prey");
        let unknown = descs(r#"[{"kind": "do", "action": "fly"}]"#);
        assert!(matches!(
            builder.sequence(&unknown),
            Err(BuildError::UnknownAction { .. })
        ));
        let bad_arg = descs(r#"[{"kind": "do", "action": "eat", "args": [["speed", {"int": 1}]]}]"#);
        assert!(matches!(
            builder.sequence(&bad_arg),
            Err(BuildError::UnknownArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_species_reference() {
        let mut model = ModelDesc::from_json(MODEL).unwrap();
        model.world.micro_species.push("wolf".into());
        assert!(matches!(
            Model::build(&model),
            Err(BuildError::UnknownSpecies(name)) if name == "wolf"
        ));
    }

    #[test]
    fn test_model_runs_with_super_invocation() {
        let desc = ModelDesc::from_json(MODEL).unwrap();
        let model = Model::build(&desc).unwrap();
        assert!(model.diagnostics().is_empty());
        let runtime = Runtime::new(RuntimeConfig::default(), model.world().clone()).unwrap();
        assert!(model.initialize(&runtime).is_completed());

        let prey = model.world().agents_of("prey");
        assert_eq!(prey.len(), 3);

        model.step(&runtime);
        assert!(prey.iter().all(|agent| agent.attribute("energy") == Some(Value::Int(12))));
        model.step(&runtime);
        assert!(prey.iter().all(|agent| agent.is_dead()));
        assert!(model.world().agents_of("prey").is_empty());

        let snapshot = model.snapshot();
        assert_eq!(snapshot["agents"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["agents"][0]["attributes"]["total"], 0);
    }
}
