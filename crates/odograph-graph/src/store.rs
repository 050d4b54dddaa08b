//! The narrow contract between the loader and a graph store.
//!
//! The loader only ever needs three things from a store: idempotent node
//! upserts, idempotent relationship merges (with optional placeholder
//! creation of the target endpoint), and per-batch transactions. Everything
//! wire-specific stays behind this contract; [`crate::memory::MemoryGraph`]
//! implements it in process, a Bolt adapter implements it against a Neo4j
//! server by running the statements rendered in [`crate::cypher`].

use serde_json::Value;
use thiserror::Error;

use crate::memory::MemoryGraph;
use crate::schema::{NodeLabel, RelType, SchemaOp};

#[derive(Debug, Error)]
pub enum GraphError {
    /// The store cannot be reached at all; fatal upstream.
    #[error("graph store unreachable: {0}")]
    Unreachable(String),

    #[error("schema statement failed: {0}")]
    Schema(String),

    /// A batch transaction failed; the loader counts and continues.
    #[error("batch transaction failed: {0}")]
    Transaction(String),

    #[error("graph query failed: {0}")]
    Query(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Graph endpoint configuration, read from the environment with defaults.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uri: std::env::var("NEO4J_URI").unwrap_or(defaults.uri),
            user: std::env::var("NEO4J_USER").unwrap_or(defaults.user),
            password: std::env::var("NEO4J_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// One node to upsert: matched on `key`, then all of `props` set.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub key: Vec<(&'static str, Value)>,
    pub props: Vec<(&'static str, Value)>,
}

/// A batch of same-shaped node rows.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBatch {
    pub label: NodeLabel,
    pub rows: Vec<NodeRow>,
}

/// One end of a relationship, matched by identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub label: NodeLabel,
    pub key: Vec<(&'static str, Value)>,
    /// Create a placeholder node carrying only the key when no node
    /// matches. Only ever set on targets.
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelRow {
    pub from: Endpoint,
    pub to: Endpoint,
    /// Properties set on the edge itself (e.g. the delegation `field`).
    pub props: Vec<(&'static str, Value)>,
}

/// A batch of same-shaped relationship rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RelBatch {
    pub rel_type: RelType,
    pub rows: Vec<RelRow>,
}

/// One transaction: writes buffer until `commit`.
pub trait GraphTransaction {
    fn upsert_nodes(&mut self, batch: &NodeBatch) -> GraphResult<()>;
    fn merge_relationships(&mut self, batch: &RelBatch) -> GraphResult<()>;
    fn commit(self: Box<Self>) -> GraphResult<()>;
}

/// The store contract the loader writes through.
pub trait GraphStore {
    /// Idempotently ensure one constraint or index.
    fn ensure_constraint(&mut self, op: &SchemaOp) -> GraphResult<()>;

    /// Open a transaction. `GraphError::Unreachable` here aborts the run.
    fn begin<'a>(&'a mut self) -> GraphResult<Box<dyn GraphTransaction + 'a>>;

    /// Delete every node and every relationship.
    fn clear_all(&mut self) -> GraphResult<()>;

    fn node_count(&mut self, label: NodeLabel) -> GraphResult<u64>;
}

impl<S: GraphStore + ?Sized> GraphStore for Box<S> {
    fn ensure_constraint(&mut self, op: &SchemaOp) -> GraphResult<()> {
        (**self).ensure_constraint(op)
    }

    fn begin<'a>(&'a mut self) -> GraphResult<Box<dyn GraphTransaction + 'a>> {
        (**self).begin()
    }

    fn clear_all(&mut self) -> GraphResult<()> {
        (**self).clear_all()
    }

    fn node_count(&mut self, label: NodeLabel) -> GraphResult<u64> {
        (**self).node_count(label)
    }
}

/// Open the store named by the configured URI.
///
/// `memory://` is a fresh in-process graph; `file://<path>` persists the
/// same graph as JSON. Bolt URIs need the driver adapter, which is linked
/// by the deployment, not by this crate.
pub fn connect(config: &GraphConfig) -> GraphResult<Box<dyn GraphStore>> {
    if config.uri == "memory://" {
        return Ok(Box::new(MemoryGraph::in_memory()));
    }
    if let Some(path) = config.uri.strip_prefix("file://") {
        return Ok(Box::new(MemoryGraph::open(path)));
    }
    Err(GraphError::Unreachable(format!(
        "no driver linked for {}; use memory:// or file://<path>, or deploy the Bolt adapter",
        config.uri
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_memory() {
        let config = GraphConfig {
            uri: "memory://".to_string(),
            ..GraphConfig::default()
        };
        let mut store = connect(&config).unwrap();
        assert_eq!(store.node_count(NodeLabel::Module).unwrap(), 0);
    }

    #[test]
    fn test_connect_bolt_without_driver_is_unreachable() {
        let config = GraphConfig::default();
        assert!(matches!(
            connect(&config),
            Err(GraphError::Unreachable(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.uri, "bolt://localhost:7687");
        assert_eq!(config.user, "neo4j");
    }
}
