//! Simulation model boundary
//!
//! Statements never touch population storage directly: they go through the
//! [`Simulation`] trait (population lookup, agent creation, re-parenting).
//! [`World`] is the in-memory implementation used by the runtime and tests.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::agent::{Agent, AgentId, AgentRef, Species};
use super::error::{ExecError, ExecResult};
use crate::interpreter::action::Action;
use crate::interpreter::value::Value;

/// Initial attribute values of one agent to create
pub type InitRecord = BTreeMap<String, Value>;

/// A population: the agents of one species hosted by one agent
#[derive(Debug, Clone)]
pub struct Population {
    /// Host agent
    pub host: AgentRef,
    /// Species of the members
    pub species: Arc<Species>,
}

/// Services the runtime needs from the simulation model
pub trait Simulation: Send + Sync {
    /// The root (world) agent
    fn root(&self) -> AgentRef;

    /// Resolve a species by name
    fn species(&self, name: &str) -> Option<Arc<Species>>;

    /// Live members of the population of `species` hosted by `host`
    fn members(&self, host: &AgentRef, species: &str) -> Vec<AgentRef>;

    /// Live agents of `species` across every host
    fn agents_of(&self, species: &str) -> Vec<AgentRef>;

    /// Create one agent per init record in `population`
    fn create_agents(
        &self,
        population: &Population,
        inits: Vec<InitRecord>,
    ) -> ExecResult<Vec<AgentRef>>;

    /// Move an agent into another population
    fn move_agent(&self, agent: &AgentRef, destination: &Population) -> ExecResult<()>;

    /// Forget dead agents; returns how many were dropped
    fn sweep_dead(&self) -> usize {
        0
    }

    /// Whether `species` is `ancestor` or inherits from it
    fn is_kind_of(&self, species: &str, ancestor: &str) -> bool {
        let mut current = Some(species.to_string());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.species(&name).and_then(|spec| spec.parent.clone());
        }
        false
    }

    /// Resolve a micro-species declared by `host_species` or its parents
    fn micro_species_of(&self, host_species: &str, micro: &str) -> Option<Arc<Species>> {
        let mut current = self.species(host_species);
        while let Some(spec) = current {
            if spec.micro_species.iter().any(|name| name == micro) {
                return self.species(micro);
            }
            current = spec.parent.as_deref().and_then(|parent| self.species(parent));
        }
        None
    }

    /// Population of `species` hosted by `host`, if `host` declares it
    fn population(&self, host: &AgentRef, species: &str) -> Option<Population> {
        self.micro_species_of(&host.species_name(), species)
            .map(|species| Population {
                host: host.clone(),
                species,
            })
    }

    /// First population of `species` reachable from `executor` walking up
    /// its host chain
    fn population_for(&self, executor: &AgentRef, species: &str) -> Option<Population> {
        let mut current = Some(executor.clone());
        while let Some(agent) = current {
            if let Some(population) = self.population(&agent, species) {
                return Some(population);
            }
            current = agent.host();
        }
        None
    }

    /// Resolve an action on `species` or, failing that, on its parents
    fn find_action(&self, species: &str, action: &str) -> Option<Arc<Action>> {
        let mut current = self.species(species);
        while let Some(spec) = current {
            if let Some(found) = spec.actions.get(action) {
                return Some(found.clone());
            }
            current = spec.parent.as_deref().and_then(|parent| self.species(parent));
        }
        None
    }
}

struct PopulationSlot {
    host: AgentId,
    species: String,
    agents: Vec<AgentRef>,
}

/// In-memory simulation world
pub struct World {
    root: AgentRef,
    species: RwLock<HashMap<String, Arc<Species>>>,
    populations: RwLock<Vec<PopulationSlot>>,
    counters: RwLock<HashMap<String, u64>>,
}

impl World {
    /// Create a world whose root agent is of `root_species`
    pub fn new(root_species: Species) -> Self {
        let attributes = root_species.attributes.iter().cloned().collect();
        let root = Agent::new(root_species.name.clone(), root_species.name.clone(), None, attributes);
        let mut species = HashMap::new();
        species.insert(root_species.name.clone(), Arc::new(root_species));
        Self {
            root,
            species: RwLock::new(species),
            populations: RwLock::new(Vec::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a species
    pub fn register_species(&self, species: Species) {
        self.species
            .write()
            .insert(species.name.clone(), Arc::new(species));
    }

    /// Names of the registered species
    pub fn species_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.species.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Create `count` default agents of `species` under the root agent
    pub fn spawn(&self, species: &str, count: usize) -> ExecResult<Vec<AgentRef>> {
        let population = self
            .population(&self.root, species)
            .ok_or_else(|| ExecError::NoPopulation {
                species: species.to_string(),
                agent: self.root.name().to_string(),
            })?;
        self.create_agents(&population, vec![InitRecord::new(); count])
    }

    /// Inherited attribute defaults, parents first
    fn defaults_of(&self, species: &Species) -> InitRecord {
        let mut chain = vec![species.attributes.clone()];
        let mut parent = species.parent.clone();
        while let Some(name) = parent {
            match self.species(&name) {
                Some(spec) => {
                    chain.push(spec.attributes.clone());
                    parent = spec.parent.clone();
                }
                None => break,
            }
        }
        chain
            .into_iter()
            .rev()
            .flatten()
            .map(|(name, value)| (name, value.deep_copy()))
            .collect()
    }

    fn next_name(&self, species: &str) -> String {
        let mut counters = self.counters.write();
        let counter = counters.entry(species.to_string()).or_insert(0);
        let name = format!("{}{}", species, counter);
        *counter += 1;
        name
    }

    fn insert_member(&self, host: AgentId, species: &str, agent: AgentRef) {
        let mut populations = self.populations.write();
        match populations
            .iter_mut()
            .find(|slot| slot.host == host && slot.species == species)
        {
            Some(slot) => {
                if slot.agents.len() == slot.agents.capacity() {
                    slot.agents.retain(|member| !member.is_dead());
                }
                slot.agents.push(agent)
            }
            None => populations.push(PopulationSlot {
                host,
                species: species.to_string(),
                agents: vec![agent],
            }),
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("root", &self.root.name())
            .field("species", &self.species_names())
            .field("populations", &self.populations.read().len())
            .finish()
    }
}

impl Simulation for World {
    fn root(&self) -> AgentRef {
        self.root.clone()
    }

    fn species(&self, name: &str) -> Option<Arc<Species>> {
        self.species.read().get(name).cloned()
    }

    fn members(&self, host: &AgentRef, species: &str) -> Vec<AgentRef> {
        let host = host.id();
        self.populations
            .read()
            .iter()
            .filter(|slot| slot.host == host && slot.species == species)
            .flat_map(|slot| slot.agents.iter())
            .filter(|agent| !agent.is_dead())
            .cloned()
            .collect()
    }

    fn agents_of(&self, species: &str) -> Vec<AgentRef> {
        self.populations
            .read()
            .iter()
            .filter(|slot| slot.species == species)
            .flat_map(|slot| slot.agents.iter())
            .filter(|agent| !agent.is_dead())
            .cloned()
            .collect()
    }

    fn create_agents(
        &self,
        population: &Population,
        inits: Vec<InitRecord>,
    ) -> ExecResult<Vec<AgentRef>> {
        let species = &population.species;
        if species.is_abstract {
            return Err(ExecError::AbstractSpecies(species.name.clone()));
        }
        let defaults = self.defaults_of(species);
        let mut created = Vec::with_capacity(inits.len());
        for init in inits {
            let mut attributes = defaults.clone();
            attributes.extend(init);
            let agent = Agent::new(
                self.next_name(&species.name),
                species.name.clone(),
                Some(&population.host),
                attributes,
            );
            self.insert_member(population.host.id(), &species.name, agent.clone());
            created.push(agent);
        }
        tracing::debug!(
            species = %species.name,
            host = population.host.name(),
            count = created.len(),
            "created agents"
        );
        Ok(created)
    }

    fn move_agent(&self, agent: &AgentRef, destination: &Population) -> ExecResult<()> {
        let previous_host = agent.host().map(|host| host.id());
        let previous_species = agent.species_name();
        {
            let mut populations = self.populations.write();
            for slot in populations.iter_mut() {
                if Some(slot.host) == previous_host && slot.species == previous_species {
                    slot.agents.retain(|member| member.id() != agent.id());
                }
            }
        }
        agent.set_host(Some(&destination.host));
        agent.set_species(destination.species.name.clone());
        for (name, value) in self.defaults_of(&destination.species) {
            if !agent.has_attribute(&name) {
                agent.set_attribute(name, value);
            }
        }
        self.insert_member(destination.host.id(), &destination.species.name, agent.clone());
        Ok(())
    }

    fn sweep_dead(&self) -> usize {
        let mut populations = self.populations.write();
        let mut dropped = 0;
        for slot in populations.iter_mut() {
            let before = slot.agents.len();
            slot.agents.retain(|member| !member.is_dead());
            dropped += before - slot.agents.len();
        }
        populations.retain(|slot| !slot.agents.is_empty());
        if dropped > 0 {
            tracing::debug!(dropped, "swept dead agents");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        let world = World::new(Species::new("world").with_micro_species("animal").with_micro_species("prey"));
        world.register_species(Species::new("animal").with_attribute("energy", Value::Int(10)));
        world.register_species(
            Species::new("prey")
                .with_parent("animal")
                .with_attribute("speed", Value::Float(1.5)),
        );
        world
    }

    #[test]
    fn test_create_agents_applies_defaults_and_inits() {
        let world = world();
        let population = world.population(&world.root(), "prey").unwrap();
        let mut init = InitRecord::new();
        init.insert("energy".into(), Value::Int(3));
        let agents = world
            .create_agents(&population, vec![init, InitRecord::new()])
            .unwrap();

        assert_eq!(agents[0].name(), "prey0");
        assert_eq!(agents[0].attribute("energy"), Some(Value::Int(3)));
        assert_eq!(agents[1].attribute("energy"), Some(Value::Int(10)));
        assert_eq!(agents[1].attribute("speed"), Some(Value::Float(1.5)));
        assert_eq!(world.members(&world.root(), "prey").len(), 2);
    }

    #[test]
    fn test_species_hierarchy() {
        let world = world();
        assert!(world.is_kind_of("prey", "animal"));
        assert!(!world.is_kind_of("animal", "prey"));
        assert!(world.micro_species_of("world", "prey").is_some());
        assert!(world.micro_species_of("prey", "world").is_none());
    }

    #[test]
    fn test_abstract_species_cannot_be_created() {
        let world = World::new(Species::new("world").with_micro_species("shape"));
        world.register_species(Species::new("shape").abstract_species());
        let population = world.population(&world.root(), "shape").unwrap();
        let err = world
            .create_agents(&population, vec![InitRecord::new()])
            .unwrap_err();
        assert!(matches!(err, ExecError::AbstractSpecies(name) if name == "shape"));
    }

    #[test]
    fn test_dead_agents_leave_members() {
        let world = world();
        let agents = world.spawn("prey", 3).unwrap();
        agents[1].kill();
        assert_eq!(world.members(&world.root(), "prey").len(), 2);
        assert_eq!(world.agents_of("prey").len(), 2);
    }

    #[test]
    fn test_sweep_releases_dead_agents() {
        let world = world();
        let agents = world.spawn("prey", 3).unwrap();
        let dead = Arc::downgrade(&agents[0]);
        agents[0].kill();
        drop(agents);

        assert_eq!(world.sweep_dead(), 1);
        assert!(dead.upgrade().is_none());
        assert_eq!(world.members(&world.root(), "prey").len(), 2);
        assert_eq!(world.sweep_dead(), 0);
    }

    #[test]
    fn test_full_slot_drops_dead_before_growing() {
        let world = world();
        let mut handles = Vec::new();
        for _ in 0..100 {
            for agent in world.spawn("prey", 10).unwrap() {
                agent.kill();
                handles.push(Arc::downgrade(&agent));
            }
        }
        let retained = handles.iter().filter(|handle| handle.upgrade().is_some()).count();
        assert!(retained < 100, "{} dead agents still held", retained);
        assert!(world.agents_of("prey").is_empty());
    }
}
