//! Serializable statement and model descriptions
//!
//! This is the shape the external compiler hands to the runtime: plain data,
//! no validation. [`builder`](super::builder) turns it into executable
//! statements.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::args::{Arguments, FormalArg};
use super::expr::Expr;
use super::mutation::ContainerFacets;
use crate::runtime::error::BuildResult;

/// One statement description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementDesc {
    /// Variable declaration
    Let {
        /// Variable name
        name: String,
        /// Initial value
        #[serde(default)]
        value: Option<Expr>,
    },
    /// Assignment
    Set {
        /// Agent or map whose attribute is assigned
        #[serde(default)]
        target: Option<Expr>,
        /// Variable or attribute name
        name: String,
        /// Value
        value: Expr,
    },
    /// Conditional
    If {
        /// Condition
        condition: Expr,
        /// Branch taken when the condition holds
        then: Vec<StatementDesc>,
        /// Branch taken otherwise
        #[serde(default)]
        otherwise: Option<Vec<StatementDesc>>,
    },
    /// Nested block
    Block {
        /// Statements
        body: Vec<StatementDesc>,
    },
    /// Loop
    Loop(LoopDesc),
    /// Remote execution
    Ask {
        /// Agent, container of agents or species
        target: Expr,
        /// Parallel hint
        #[serde(default)]
        parallel: Option<Expr>,
        /// Body
        #[serde(default)]
        body: Vec<StatementDesc>,
    },
    /// Agent creation
    Create(CreateDesc),
    /// Capture as micro-agents
    Capture {
        /// Agents to capture
        target: Expr,
        /// Micro-species receiving them
        #[serde(default, rename = "as")]
        as_species: Option<String>,
        /// Result variable
        #[serde(default)]
        returns: Option<String>,
        /// Body run per captured agent
        #[serde(default)]
        body: Vec<StatementDesc>,
    },
    /// Release of micro-agents
    Release {
        /// Agents to release
        target: Expr,
        /// Destination species
        #[serde(default, rename = "as")]
        as_species: Option<String>,
        /// Destination host
        #[serde(default, rename = "in")]
        into: Option<Expr>,
        /// Result variable
        #[serde(default)]
        returns: Option<String>,
        /// Body run per released agent
        #[serde(default)]
        body: Vec<StatementDesc>,
    },
    /// Migration between micro-populations
    Migrate {
        /// Source micro-species
        source: String,
        /// Target micro-species
        target: String,
        /// Result variable
        #[serde(default)]
        returns: Option<String>,
        /// Body run per immigrant
        #[serde(default)]
        body: Vec<StatementDesc>,
    },
    /// Action invocation
    Do(DoDesc),
    /// Invocation of the parent species' version of an action
    Invoke(DoDesc),
    /// `add`
    Add(ContainerFacets),
    /// `remove`
    Remove(ContainerFacets),
    /// `put`
    Put(ContainerFacets),
    /// Error containment
    Try {
        /// Protected statements
        body: Vec<StatementDesc>,
        /// Statements run when the body fails
        #[serde(default)]
        catch: Option<Vec<StatementDesc>>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return`
    Return {
        /// Returned value
        #[serde(default)]
        value: Option<Expr>,
    },
    /// `die`
    Die,
    /// `write`
    Write {
        /// Message
        message: Expr,
    },
    /// `warn`
    Warn {
        /// Message
        message: Expr,
    },
    /// `error`
    Error {
        /// Message
        message: Expr,
    },
}

/// Loop facets; exactly one iteration kind is used
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopDesc {
    /// Loop variable
    #[serde(default)]
    pub var: Option<String>,
    /// `times:`
    #[serde(default)]
    pub times: Option<Expr>,
    /// `over:`
    #[serde(default)]
    pub over: Option<Expr>,
    /// `while:`
    #[serde(default, rename = "while")]
    pub condition: Option<Expr>,
    /// `from:`
    #[serde(default)]
    pub from: Option<Expr>,
    /// `to:`
    #[serde(default)]
    pub to: Option<Expr>,
    /// `step:`
    #[serde(default)]
    pub step: Option<Expr>,
    /// Body
    #[serde(default)]
    pub body: Vec<StatementDesc>,
}

/// `create` facets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDesc {
    /// Species to instantiate (the executor's species when absent)
    #[serde(default)]
    pub species: Option<Expr>,
    /// Number of agents
    #[serde(default)]
    pub number: Option<Expr>,
    /// External source of records
    #[serde(default)]
    pub from: Option<Expr>,
    /// Initial attribute values
    #[serde(default)]
    pub with: Arguments,
    /// Parallel hint for the body
    #[serde(default)]
    pub parallel: Option<Expr>,
    /// Result variable
    #[serde(default)]
    pub returns: Option<String>,
    /// Body run per created agent
    #[serde(default)]
    pub body: Vec<StatementDesc>,
}

/// `do` / `invoke` facets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoDesc {
    /// Action name
    pub action: String,
    /// Actual arguments
    #[serde(default)]
    pub args: Arguments,
    /// Agent to run the action on (the current agent when absent)
    #[serde(default)]
    pub target: Option<Expr>,
    /// Result variable
    #[serde(default)]
    pub returns: Option<String>,
}

/// Action declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDesc {
    /// Action name
    pub name: String,
    /// Formal arguments
    #[serde(default)]
    pub args: Vec<FormalArg>,
    /// Body
    #[serde(default)]
    pub body: Vec<StatementDesc>,
}

/// Species declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesDesc {
    /// Species name
    pub name: String,
    /// Parent species
    #[serde(default)]
    pub parent: Option<String>,
    /// Micro-species this species hosts
    #[serde(default)]
    pub micro_species: Vec<String>,
    /// Whether the species cannot be instantiated
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Attribute defaults, as JSON values
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Actions
    #[serde(default)]
    pub actions: Vec<ActionDesc>,
    /// Statements run by every agent of the species at each step
    #[serde(default)]
    pub reflex: Vec<StatementDesc>,
}

/// Whole model: a root species, the other species and the init block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDesc {
    /// Model name
    pub name: String,
    /// Species of the root agent
    pub world: SpeciesDesc,
    /// Every other species
    #[serde(default)]
    pub species: Vec<SpeciesDesc>,
    /// Statements run once by the root agent before the first step
    #[serde(default)]
    pub init: Vec<StatementDesc>,
}

impl ModelDesc {
    /// Parse a JSON model description
    pub fn from_json(text: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON model description from a file
    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Declaration of a species (the root species included)
    pub fn species(&self, name: &str) -> Option<&SpeciesDesc> {
        if self.world.name == name {
            return Some(&self.world);
        }
        self.species.iter().find(|species| species.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_desc_from_json() {
        let json = r#"[
            {"kind": "let", "name": "s", "value": {"int": 1}},
            {"kind": "loop", "times": {"int": 3}, "body": [
                {"kind": "set", "name": "s", "value": {"binary": {"op": "add", "left": {"var": {"name": "s"}}, "right": {"var": {"name": "s"}}}}}
            ]},
            {"kind": "put", "container": {"var": {"name": "l"}}, "item": {"int": 0}, "all": true},
            {"kind": "capture", "target": {"var": {"name": "others"}}, "as": "member"},
            {"kind": "break"}
        ]"#;
        let descs: Vec<StatementDesc> = serde_json::from_str(json).unwrap();
        assert_eq!(descs.len(), 5);
        match &descs[1] {
            StatementDesc::Loop(desc) => {
                assert!(desc.times.is_some());
                assert_eq!(desc.body.len(), 1);
            }
            other => panic!("expected a loop, got {:?}", other),
        }
        match &descs[2] {
            StatementDesc::Put(facets) => assert!(facets.all && facets.index.is_none()),
            other => panic!("expected a put, got {:?}", other),
        }
        assert!(matches!(
            &descs[3],
            StatementDesc::Capture { as_species: Some(species), .. } if species == "member"
        ));
    }

    #[test]
    fn test_model_lookup_and_attribute_order() {
        let json = r#"{
            "name": "m",
            "world": {"name": "world", "micro_species": ["prey"]},
            "species": [{"name": "prey", "attributes": {"zeta": 1, "alpha": 2}}]
        }"#;
        let model = ModelDesc::from_json(json).unwrap();
        assert!(model.species("world").is_some());
        let prey = model.species("prey").unwrap();
        let names: Vec<&String> = prey.attributes.keys().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(model.species("wolf").is_none());
    }

    #[test]
    fn test_load_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelDesc::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, crate::runtime::error::BuildError::Io(_)));
    }
}
