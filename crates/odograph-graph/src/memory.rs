//! An in-process graph store, optionally persisted as JSON.
//!
//! Implements the same upsert/merge semantics a Neo4j server gives the
//! rendered Cypher: nodes are identity-keyed, re-merging is a no-op, and a
//! relationship row whose non-creatable endpoint matches nothing is skipped
//! silently. Used by tests and as the built-in store of the CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::schema::{NodeLabel, RelType, SchemaOp};
use crate::store::{
    Endpoint, GraphError, GraphResult, GraphStore, GraphTransaction, NodeBatch, RelBatch,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct StoredRel {
    from_label: String,
    from_key: String,
    to_label: String,
    to_key: String,
    props: BTreeMap<String, Value>,
}

/// The whole graph, shaped for stable JSON serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct GraphData {
    /// label -> canonical key -> properties
    nodes: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
    /// relationship type -> edge key -> edge
    rels: BTreeMap<String, BTreeMap<String, StoredRel>>,
}

struct Inner {
    data: GraphData,
    backing: Option<PathBuf>,
}

/// In-process [`GraphStore`]. Cloning yields another handle onto the same
/// graph, which is how tests inspect what a loader wrote.
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<Mutex<Inner>>,
}

/// Canonical string for an identity key: key-sorted JSON.
fn key_string(key: &[(&'static str, Value)]) -> String {
    let map: BTreeMap<&str, &Value> = key.iter().map(|(k, v)| (*k, v)).collect();
    serde_json::to_string(&map).unwrap_or_default()
}

fn edge_key(rel: &StoredRel) -> String {
    format!(
        "{}|{}->{}|{}",
        rel.from_label, rel.from_key, rel.to_label, rel.to_key
    )
}

impl MemoryGraph {
    /// A fresh graph that dies with the process.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data: GraphData::default(),
                backing: None,
            })),
        }
    }

    /// A graph persisted at `path`, loaded when the file exists. A corrupt
    /// file is logged and replaced on the next commit.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(data) => data,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt graph file; starting empty");
                    GraphData::default()
                }
            },
            Err(_) => GraphData::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                backing: Some(path),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means another handle panicked mid-apply; the data
        // itself is still a plain map.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Properties of a node, if present.
    pub fn node(
        &self,
        label: NodeLabel,
        key: &[(&'static str, Value)],
    ) -> Option<BTreeMap<String, Value>> {
        self.lock()
            .data
            .nodes
            .get(label.as_str())
            .and_then(|nodes| nodes.get(&key_string(key)))
            .cloned()
    }

    pub fn node_total(&self) -> u64 {
        self.lock()
            .data
            .nodes
            .values()
            .map(|nodes| nodes.len() as u64)
            .sum()
    }

    pub fn rel_total(&self) -> u64 {
        self.lock()
            .data
            .rels
            .values()
            .map(|rels| rels.len() as u64)
            .sum()
    }

    pub fn rel_count(&self, rel_type: RelType) -> u64 {
        self.lock()
            .data
            .rels
            .get(rel_type.as_str())
            .map_or(0, |rels| rels.len() as u64)
    }

    /// Properties of an edge between two identity keys, if present.
    pub fn relationship(
        &self,
        rel_type: RelType,
        from: (NodeLabel, &[(&'static str, Value)]),
        to: (NodeLabel, &[(&'static str, Value)]),
    ) -> Option<BTreeMap<String, Value>> {
        let key = format!(
            "{}|{}->{}|{}",
            from.0.as_str(),
            key_string(from.1),
            to.0.as_str(),
            key_string(to.1)
        );
        self.lock()
            .data
            .rels
            .get(rel_type.as_str())
            .and_then(|rels| rels.get(&key))
            .map(|rel| rel.props.clone())
    }
}

impl Inner {
    fn apply_nodes(&mut self, batch: &NodeBatch) {
        let nodes = self
            .data
            .nodes
            .entry(batch.label.as_str().to_string())
            .or_default();
        for row in &batch.rows {
            let props = nodes.entry(key_string(&row.key)).or_default();
            for (name, value) in row.key.iter().chain(row.props.iter()) {
                props.insert((*name).to_string(), value.clone());
            }
        }
    }

    fn apply_rels(&mut self, batch: &RelBatch) {
        for row in &batch.rows {
            let Some(from) = self.resolve(&row.from) else {
                continue;
            };
            let Some(to) = self.resolve(&row.to) else {
                continue;
            };

            let rel = StoredRel {
                from_label: from.0,
                from_key: from.1,
                to_label: to.0,
                to_key: to.1,
                props: BTreeMap::new(),
            };
            let entry = self
                .data
                .rels
                .entry(batch.rel_type.as_str().to_string())
                .or_default()
                .entry(edge_key(&rel))
                .or_insert(rel);
            for (name, value) in &row.props {
                entry.props.insert((*name).to_string(), value.clone());
            }
        }
    }

    /// Resolve an endpoint to (label, key), creating a placeholder node
    /// carrying only the key when allowed. A non-creatable endpoint that
    /// matches nothing resolves to `None` and the row is skipped, exactly
    /// like an unmatched `MATCH` in the rendered statement.
    fn resolve(&mut self, endpoint: &Endpoint) -> Option<(String, String)> {
        let label = endpoint.label.as_str().to_string();
        let key = key_string(&endpoint.key);
        let exists = self
            .data
            .nodes
            .get(&label)
            .is_some_and(|nodes| nodes.contains_key(&key));

        if !exists {
            if !endpoint.create_if_missing {
                return None;
            }
            let props: BTreeMap<String, Value> = endpoint
                .key
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect();
            self.data
                .nodes
                .entry(label.clone())
                .or_default()
                .insert(key.clone(), props);
        }
        Some((label, key))
    }

    fn persist(&self) -> GraphResult<()> {
        let Some(path) = &self.backing else {
            return Ok(());
        };
        let transaction = |msg: String| GraphError::Transaction(msg);

        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| transaction(e.to_string()))?;
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| transaction(e.to_string()))?;
        serde_json::to_writer(&tmp, &self.data).map_err(|e| transaction(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| transaction(e.error.to_string()))?;
        Ok(())
    }
}

enum BufferedWrite {
    Nodes(NodeBatch),
    Rels(RelBatch),
}

/// Writes buffer here and apply on commit, under one lock.
pub struct MemoryTransaction {
    graph: MemoryGraph,
    writes: Vec<BufferedWrite>,
}

impl GraphTransaction for MemoryTransaction {
    fn upsert_nodes(&mut self, batch: &NodeBatch) -> GraphResult<()> {
        self.writes.push(BufferedWrite::Nodes(batch.clone()));
        Ok(())
    }

    fn merge_relationships(&mut self, batch: &RelBatch) -> GraphResult<()> {
        self.writes.push(BufferedWrite::Rels(batch.clone()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> GraphResult<()> {
        let mut inner = self.graph.lock();
        for write in &self.writes {
            match write {
                BufferedWrite::Nodes(batch) => inner.apply_nodes(batch),
                BufferedWrite::Rels(batch) => inner.apply_rels(batch),
            }
        }
        inner.persist()
    }
}

impl GraphStore for MemoryGraph {
    fn ensure_constraint(&mut self, _op: &SchemaOp) -> GraphResult<()> {
        // Identity keys already enforce uniqueness; indexes are moot.
        Ok(())
    }

    fn begin<'a>(&'a mut self) -> GraphResult<Box<dyn GraphTransaction + 'a>> {
        Ok(Box::new(MemoryTransaction {
            graph: self.clone(),
            writes: Vec::new(),
        }))
    }

    fn clear_all(&mut self) -> GraphResult<()> {
        let mut inner = self.lock();
        inner.data = GraphData::default();
        inner.persist()
    }

    fn node_count(&mut self, label: NodeLabel) -> GraphResult<u64> {
        Ok(self
            .lock()
            .data
            .nodes
            .get(label.as_str())
            .map_or(0, |nodes| nodes.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NodeRow, RelRow};
    use serde_json::json;

    fn node_batch(label: NodeLabel, names: &[&str]) -> NodeBatch {
        NodeBatch {
            label,
            rows: names
                .iter()
                .map(|name| NodeRow {
                    key: vec![("name", json!(name))],
                    props: vec![("description", json!("d"))],
                })
                .collect(),
        }
    }

    fn commit_nodes(graph: &mut MemoryGraph, batch: &NodeBatch) {
        let mut tx = graph.begin().unwrap();
        tx.upsert_nodes(batch).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut graph = MemoryGraph::in_memory();
        let batch = node_batch(NodeLabel::Model, &["res.partner"]);
        commit_nodes(&mut graph, &batch);
        commit_nodes(&mut graph, &batch);

        assert_eq!(graph.node_count(NodeLabel::Model).unwrap(), 1);
        let props = graph
            .node(NodeLabel::Model, &[("name", json!("res.partner"))])
            .unwrap();
        assert_eq!(props.get("description"), Some(&json!("d")));
    }

    #[test]
    fn test_merge_creates_placeholder_target() {
        let mut graph = MemoryGraph::in_memory();
        commit_nodes(&mut graph, &node_batch(NodeLabel::Model, &["child"]));

        let rels = RelBatch {
            rel_type: RelType::Inherits,
            rows: vec![RelRow {
                from: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("child"))],
                    create_if_missing: false,
                },
                to: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("missing.parent"))],
                    create_if_missing: true,
                },
                props: vec![],
            }],
        };
        let mut tx = graph.begin().unwrap();
        tx.merge_relationships(&rels).unwrap();
        tx.commit().unwrap();

        assert_eq!(graph.node_count(NodeLabel::Model).unwrap(), 2);
        let placeholder = graph
            .node(NodeLabel::Model, &[("name", json!("missing.parent"))])
            .unwrap();
        // Placeholder carries only its identity key.
        assert_eq!(placeholder.len(), 1);
        assert_eq!(graph.rel_count(RelType::Inherits), 1);
    }

    #[test]
    fn test_merge_skips_unmatched_source() {
        let mut graph = MemoryGraph::in_memory();
        let rels = RelBatch {
            rel_type: RelType::DependsOn,
            rows: vec![RelRow {
                from: Endpoint {
                    label: NodeLabel::Module,
                    key: vec![("name", json!("ghost"))],
                    create_if_missing: false,
                },
                to: Endpoint {
                    label: NodeLabel::Module,
                    key: vec![("name", json!("base"))],
                    create_if_missing: false,
                },
                props: vec![],
            }],
        };
        let mut tx = graph.begin().unwrap();
        tx.merge_relationships(&rels).unwrap();
        tx.commit().unwrap();

        assert_eq!(graph.node_total(), 0);
        assert_eq!(graph.rel_total(), 0);
    }

    #[test]
    fn test_uncommitted_writes_are_dropped() {
        let mut graph = MemoryGraph::in_memory();
        {
            let mut tx = graph.begin().unwrap();
            tx.upsert_nodes(&node_batch(NodeLabel::Module, &["base"])).unwrap();
            // No commit.
        }
        assert_eq!(graph.node_total(), 0);
    }

    #[test]
    fn test_edge_props_updated_on_remerge() {
        let mut graph = MemoryGraph::in_memory();
        commit_nodes(&mut graph, &node_batch(NodeLabel::Model, &["res.users"]));

        let merge = |field: &str| RelBatch {
            rel_type: RelType::InheritsDelegation,
            rows: vec![RelRow {
                from: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("res.users"))],
                    create_if_missing: false,
                },
                to: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("res.partner"))],
                    create_if_missing: true,
                },
                props: vec![("field", json!(field))],
            }],
        };

        for field in ["partner_id", "partner_id2"] {
            let mut tx = graph.begin().unwrap();
            tx.merge_relationships(&merge(field)).unwrap();
            tx.commit().unwrap();
        }

        assert_eq!(graph.rel_count(RelType::InheritsDelegation), 1);
        let props = graph
            .relationship(
                RelType::InheritsDelegation,
                (NodeLabel::Model, &[("name", json!("res.users"))]),
                (NodeLabel::Model, &[("name", json!("res.partner"))]),
            )
            .unwrap();
        assert_eq!(props.get("field"), Some(&json!("partner_id2")));
    }

    #[test]
    fn test_file_backed_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph/graph.json");

        let mut graph = MemoryGraph::open(&path);
        commit_nodes(&mut graph, &node_batch(NodeLabel::Module, &["base", "sale"]));
        assert!(path.exists());

        let mut reopened = MemoryGraph::open(&path);
        assert_eq!(reopened.node_count(NodeLabel::Module).unwrap(), 2);

        reopened.clear_all().unwrap();
        let mut again = MemoryGraph::open(&path);
        assert_eq!(again.node_count(NodeLabel::Module).unwrap(), 0);
    }
}
