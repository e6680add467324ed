//! Agents and species
//!
//! Agents are shared handles (`Arc<Agent>`) with interior-mutable attributes,
//! so the same agent can be targeted concurrently by parallel dispatch.
//! Hosts are held weakly: a population owns its agents, never the reverse.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::interpreter::action::Action;
use crate::interpreter::value::Value;

/// Agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random AgentId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared agent handle
pub type AgentRef = Arc<Agent>;

/// A simulated agent
pub struct Agent {
    id: AgentId,
    name: String,
    species: RwLock<String>,
    host: RwLock<Option<Weak<Agent>>>,
    attributes: RwLock<BTreeMap<String, Value>>,
    dead: AtomicBool,
}

impl Agent {
    /// Create a new agent of `species`, hosted by `host`.
    pub fn new(
        name: impl Into<String>,
        species: impl Into<String>,
        host: Option<&AgentRef>,
        attributes: BTreeMap<String, Value>,
    ) -> AgentRef {
        Arc::new(Self {
            id: AgentId::new(),
            name: name.into(),
            species: RwLock::new(species.into()),
            host: RwLock::new(host.map(Arc::downgrade)),
            attributes: RwLock::new(attributes),
            dead: AtomicBool::new(false),
        })
    }

    /// Unique identifier
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the agent's current species
    pub fn species_name(&self) -> String {
        self.species.read().clone()
    }

    /// Change the agent's species (capture/release/migrate)
    pub fn set_species(&self, species: impl Into<String>) {
        *self.species.write() = species.into();
    }

    /// The agent hosting this agent's population, if still alive in memory
    pub fn host(&self) -> Option<AgentRef> {
        self.host.read().as_ref().and_then(Weak::upgrade)
    }

    /// Re-parent the agent
    pub fn set_host(&self, host: Option<&AgentRef>) {
        *self.host.write() = host.map(Arc::downgrade);
    }

    /// Whether `other` is this agent or one of its (transitive) hosts
    pub fn is_in_host_chain(&self, other: &Agent) -> bool {
        if self.id == other.id {
            return true;
        }
        let mut current = self.host();
        while let Some(host) = current {
            if host.id == other.id {
                return true;
            }
            current = host.host();
        }
        false
    }

    /// Whether the agent died
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Mark the agent as dead
    pub fn kill(&self) {
        self.dead.store(true, Ordering::Release);
    }

    /// Read an attribute
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.read().get(name).cloned()
    }

    /// Whether the agent declares an attribute
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    /// Write an attribute (declaring it when missing)
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.write().insert(name.into(), value);
    }

    /// Snapshot of all attributes
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.attributes.read().clone()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("species", &*self.species.read())
            .field("dead", &self.is_dead())
            .finish()
    }
}

/// A species: the template agents are created from
#[derive(Debug, Clone, Default)]
pub struct Species {
    /// Species name
    pub name: String,
    /// Parent species, if any
    pub parent: Option<String>,
    /// Species whose populations are hosted by agents of this species
    pub micro_species: Vec<String>,
    /// Abstract species cannot be instantiated
    pub is_abstract: bool,
    /// Attribute defaults, in declaration order
    pub attributes: Vec<(String, Value)>,
    /// Actions declared by this species (not inherited ones)
    pub actions: HashMap<String, Arc<Action>>,
}

impl Species {
    /// Create an empty concrete species
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the parent species
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a micro-species
    pub fn with_micro_species(mut self, micro: impl Into<String>) -> Self {
        self.micro_species.push(micro.into());
        self
    }

    /// Declare an attribute with its default value
    pub fn with_attribute(mut self, name: impl Into<String>, default: Value) -> Self {
        self.attributes.push((name.into(), default));
        self
    }

    /// Declare an action
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.insert(action.name().to_string(), Arc::new(action));
        self
    }

    /// Mark the species abstract
    pub fn abstract_species(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}
