//! Create delegate registry
//!
//! A `create ... from: source` statement hands its source to the first
//! registered delegate that accepts it. Delegates registered by the embedder
//! are consulted before the built-in ones. Each runtime owns its own
//! registry, so two runtimes never share delegates.

use parking_lot::RwLock;
use std::sync::Arc;

use super::world::InitRecord;
use crate::interpreter::value::Value;

/// Turns an external source into initialization records
pub trait CreateDelegate: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Whether this delegate understands `source`
    fn accepts(&self, source: &Value) -> bool;

    /// Append one record per agent to create, at most `max` when given
    fn create_from(
        &self,
        records: &mut Vec<InitRecord>,
        max: Option<usize>,
        source: &Value,
    ) -> anyhow::Result<()>;
}

/// Reads records from a list of maps (or a single map)
///
/// Map keys become attribute names; non-string keys are rendered with
/// `Display`.
#[derive(Debug, Default)]
pub struct RecordListDelegate;

impl RecordListDelegate {
    fn record_of(map: &Value) -> Option<InitRecord> {
        match map {
            Value::Map(map) => Some(
                map.read()
                    .entries()
                    .iter()
                    .map(|(key, value)| {
                        let name = match key.as_str() {
                            Some(name) => name.to_string(),
                            None => key.to_string(),
                        };
                        (name, value.clone())
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl CreateDelegate for RecordListDelegate {
    fn name(&self) -> &str {
        "records"
    }

    fn accepts(&self, source: &Value) -> bool {
        match source {
            Value::Map(_) => true,
            Value::List(list) => {
                let list = list.read();
                !list.items().is_empty()
                    && list.items().iter().all(|item| matches!(item, Value::Map(_)))
            }
            _ => false,
        }
    }

    fn create_from(
        &self,
        records: &mut Vec<InitRecord>,
        max: Option<usize>,
        source: &Value,
    ) -> anyhow::Result<()> {
        let maps = match source {
            Value::Map(_) => vec![source.clone()],
            other => other.elements(),
        };
        let limit = max.unwrap_or(maps.len());
        for map in maps.iter().take(limit) {
            let record = Self::record_of(map)
                .ok_or_else(|| anyhow::anyhow!("{} is not a record", map))?;
            records.push(record);
        }
        Ok(())
    }
}

/// Ordered set of create delegates
pub struct DelegateRegistry {
    delegates: RwLock<Vec<Arc<dyn CreateDelegate>>>,
    builtins: Vec<Arc<dyn CreateDelegate>>,
}

impl DelegateRegistry {
    /// Registry holding only the built-in delegates
    pub fn new() -> Self {
        Self {
            delegates: RwLock::new(Vec::new()),
            builtins: vec![Arc::new(RecordListDelegate)],
        }
    }

    /// Add a delegate; it takes precedence over the built-ins and over
    /// delegates registered before it
    pub fn register(&self, delegate: Arc<dyn CreateDelegate>) {
        tracing::debug!(delegate = delegate.name(), "registered create delegate");
        self.delegates.write().insert(0, delegate);
    }

    /// First delegate accepting `source`
    pub fn find(&self, source: &Value) -> Option<Arc<dyn CreateDelegate>> {
        let delegates = self.delegates.read();
        delegates
            .iter()
            .chain(self.builtins.iter())
            .find(|delegate| delegate.accepts(source))
            .cloned()
    }

    /// Delegate names, in lookup order
    pub fn names(&self) -> Vec<String> {
        let delegates = self.delegates.read();
        delegates
            .iter()
            .chain(self.builtins.iter())
            .map(|delegate| delegate.name().to_string())
            .collect()
    }
}

impl Default for DelegateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateRegistry")
            .field("delegates", &self.names())
            .finish()
    }
}
