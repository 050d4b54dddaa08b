//! Phased, batched, idempotent loading of a dataset into the graph store.
//!
//! Phase 1 writes all nodes (modules, models, views, fields); Phase 2
//! writes all relationships in a fixed order, creating placeholder targets
//! where a reference points outside the corpus. Every sub-step chunks its
//! rows into batches, one transaction per batch; a failed batch is counted
//! and skipped, never fatal. Only an unreachable store aborts the run.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use odograph_core::dataset::GraphDataset;

use crate::schema::{self, NodeLabel, RelType};
use crate::store::{Endpoint, GraphError, GraphResult, GraphStore, NodeBatch, NodeRow, RelBatch, RelRow};

/// Node counts per label, as reported by `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub modules: u64,
    pub models: u64,
    pub views: u64,
    pub fields: u64,
}

/// Outcome of one sub-step.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: &'static str,
    pub items: usize,
    pub batches: usize,
    pub committed: usize,
    pub failed: usize,
}

/// Accumulated load metrics across all sub-steps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadMetrics {
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub batches_processed: usize,
    /// Rows lost to failed batches.
    pub errors: usize,
    pub steps: Vec<StepSummary>,
}

/// Writes a [`GraphDataset`] through a [`GraphStore`].
pub struct GraphLoader<S> {
    store: S,
    batch_size: usize,
}

impl<S: GraphStore> GraphLoader<S> {
    pub fn new(store: S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Ensure constraints and indexes. Failures are warnings: the store may
    /// already carry them.
    pub fn ensure_schema(&mut self) {
        for op in schema::bootstrap_ops() {
            if let Err(err) = self.store.ensure_constraint(&op) {
                warn!(%err, "schema bootstrap statement failed; continuing");
            }
        }
    }

    /// Delete every node and relationship.
    pub fn clear(&mut self) -> GraphResult<()> {
        self.store.clear_all()
    }

    /// Node counts per label; an unreadable store reports zeros with a
    /// warning.
    pub fn stats(&mut self) -> GraphStats {
        let mut count = |label| match self.store.node_count(label) {
            Ok(count) => count,
            Err(err) => {
                warn!(%err, label = %label, "could not count nodes");
                0
            }
        };
        GraphStats {
            modules: count(NodeLabel::Module),
            models: count(NodeLabel::Model),
            views: count(NodeLabel::View),
            fields: count(NodeLabel::Field),
        }
    }

    /// Write the whole dataset. Returns the per-step metrics; fails only
    /// when the store is unreachable.
    pub fn load(&mut self, data: &GraphDataset) -> GraphResult<LoadMetrics> {
        let mut metrics = LoadMetrics::default();

        // Phase 1: nodes, no relationships yet.
        self.node_step(&mut metrics, "modules", NodeLabel::Module, module_rows(data))?;
        self.node_step(&mut metrics, "models", NodeLabel::Model, model_rows(data))?;
        self.node_step(&mut metrics, "views", NodeLabel::View, view_rows(data))?;
        self.node_step(&mut metrics, "fields", NodeLabel::Field, field_rows(data))?;

        // Phase 2: relationships, placeholders for unknown targets.
        self.rel_step(&mut metrics, "module dependencies", RelType::DependsOn, depends_rows(data))?;
        self.rel_step(&mut metrics, "module->model", RelType::ContainsModel, contains_model_rows(data))?;
        self.rel_step(&mut metrics, "model inheritance", RelType::Inherits, inherits_rows(data))?;
        self.rel_step(&mut metrics, "model delegation", RelType::InheritsDelegation, delegation_rows(data))?;
        self.rel_step(&mut metrics, "model->field", RelType::HasField, has_field_rows(data))?;
        self.rel_step(&mut metrics, "field references", RelType::RelatesTo, relates_to_rows(data))?;
        self.rel_step(&mut metrics, "module->view", RelType::ContainsView, contains_view_rows(data))?;
        self.rel_step(&mut metrics, "view->model", RelType::ViewFor, view_for_rows(data))?;
        self.rel_step(&mut metrics, "view inheritance", RelType::Extends, extends_rows(data))?;

        info!(
            nodes = metrics.nodes_written,
            relationships = metrics.relationships_written,
            batches = metrics.batches_processed,
            errors = metrics.errors,
            "load finished"
        );
        Ok(metrics)
    }

    fn node_step(
        &mut self,
        metrics: &mut LoadMetrics,
        step: &'static str,
        label: NodeLabel,
        rows: Vec<NodeRow>,
    ) -> GraphResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut summary = new_summary(step, rows.len(), self.batch_size);
        info!(step, items = summary.items, batches = summary.batches, "loading nodes");

        for (index, chunk) in rows.chunks(self.batch_size).enumerate() {
            let batch = NodeBatch {
                label,
                rows: chunk.to_vec(),
            };
            let result = self.store.begin().and_then(|mut tx| {
                tx.upsert_nodes(&batch)?;
                tx.commit()
            });
            match result {
                Ok(()) => {
                    summary.committed += 1;
                    metrics.batches_processed += 1;
                    metrics.nodes_written += chunk.len();
                }
                Err(GraphError::Unreachable(msg)) => return Err(GraphError::Unreachable(msg)),
                Err(err) => {
                    warn!(step, batch = index + 1, batches = summary.batches, %err,
                        "batch failed; continuing");
                    summary.failed += 1;
                    metrics.errors += chunk.len();
                }
            }
            log_progress(step, index + 1, summary.batches);
        }

        metrics.steps.push(summary);
        Ok(())
    }

    fn rel_step(
        &mut self,
        metrics: &mut LoadMetrics,
        step: &'static str,
        rel_type: RelType,
        rows: Vec<RelRow>,
    ) -> GraphResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut summary = new_summary(step, rows.len(), self.batch_size);
        info!(step, items = summary.items, batches = summary.batches, "loading relationships");

        for (index, chunk) in rows.chunks(self.batch_size).enumerate() {
            let batch = RelBatch {
                rel_type,
                rows: chunk.to_vec(),
            };
            let result = self.store.begin().and_then(|mut tx| {
                tx.merge_relationships(&batch)?;
                tx.commit()
            });
            match result {
                Ok(()) => {
                    summary.committed += 1;
                    metrics.batches_processed += 1;
                    metrics.relationships_written += chunk.len();
                }
                Err(GraphError::Unreachable(msg)) => return Err(GraphError::Unreachable(msg)),
                Err(err) => {
                    warn!(step, batch = index + 1, batches = summary.batches, %err,
                        "batch failed; continuing");
                    summary.failed += 1;
                    metrics.errors += chunk.len();
                }
            }
            log_progress(step, index + 1, summary.batches);
        }

        metrics.steps.push(summary);
        Ok(())
    }
}

fn new_summary(step: &'static str, items: usize, batch_size: usize) -> StepSummary {
    StepSummary {
        step,
        items,
        batches: items.div_ceil(batch_size),
        committed: 0,
        failed: 0,
    }
}

/// Progress line roughly every tenth batch, and always for the last one.
fn log_progress(step: &str, batch: usize, batches: usize) {
    if batch == batches || batch % (batches / 10).max(1) == 0 {
        let percent = batch * 100 / batches;
        info!(step, batch, batches, percent, "progress");
    }
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |s| json!(s))
}

fn module_rows(data: &GraphDataset) -> Vec<NodeRow> {
    data.modules
        .iter()
        .map(|m| NodeRow {
            key: vec![("name", json!(m.name))],
            props: vec![
                ("version", json!(m.version)),
                ("description", json!(m.description)),
                ("author", json!(m.author)),
                ("category", json!(m.category)),
                ("path", json!(m.path)),
                ("installable", json!(m.installable)),
                ("auto_install", json!(m.auto_install)),
            ],
        })
        .collect()
}

fn model_rows(data: &GraphDataset) -> Vec<NodeRow> {
    data.models
        .iter()
        .map(|m| NodeRow {
            key: vec![("name", json!(m.name))],
            props: vec![
                ("description", json!(m.description)),
                ("module", json!(m.module)),
                ("file_path", json!(m.file_path)),
                ("class_name", json!(m.class_name)),
                ("model_type", json!(m.model_type.as_str())),
                ("is_abstract", json!(m.is_abstract)),
                ("is_extension", json!(m.is_extension)),
                ("is_transient", json!(m.is_transient)),
            ],
        })
        .collect()
}

fn view_rows(data: &GraphDataset) -> Vec<NodeRow> {
    data.views
        .iter()
        .map(|v| NodeRow {
            key: vec![("xml_id", json!(v.xml_id))],
            props: vec![
                ("name", json!(v.name)),
                ("model", json!(v.model)),
                ("view_type", json!(v.view_type)),
                ("module", json!(v.module)),
                ("file_path", json!(v.file_path)),
                ("priority", json!(v.priority)),
            ],
        })
        .collect()
}

fn field_rows(data: &GraphDataset) -> Vec<NodeRow> {
    data.fields
        .iter()
        .map(|f| NodeRow {
            key: vec![("model", json!(f.model)), ("name", json!(f.name))],
            props: vec![
                ("field_type", json!(f.field_type)),
                ("related_model", opt_str(&f.related_model)),
                ("attributes", json!(f.attributes)),
            ],
        })
        .collect()
}

fn match_node(label: NodeLabel, key: Vec<(&'static str, Value)>) -> Endpoint {
    Endpoint {
        label,
        key,
        create_if_missing: false,
    }
}

fn merge_node(label: NodeLabel, key: Vec<(&'static str, Value)>) -> Endpoint {
    Endpoint {
        label,
        key,
        create_if_missing: true,
    }
}

fn depends_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.module_dependencies
        .iter()
        .map(|d| RelRow {
            from: match_node(NodeLabel::Module, vec![("name", json!(d.module))]),
            to: match_node(NodeLabel::Module, vec![("name", json!(d.dependency))]),
            props: vec![],
        })
        .collect()
}

fn contains_model_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.model_modules
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::Module, vec![("name", json!(r.module))]),
            to: match_node(NodeLabel::Model, vec![("name", json!(r.model))]),
            props: vec![],
        })
        .collect()
}

fn inherits_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.model_inheritances
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::Model, vec![("name", json!(r.child))]),
            to: merge_node(NodeLabel::Model, vec![("name", json!(r.parent))]),
            props: vec![],
        })
        .collect()
}

fn delegation_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.model_delegations
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::Model, vec![("name", json!(r.child))]),
            to: merge_node(NodeLabel::Model, vec![("name", json!(r.parent))]),
            props: vec![("field", json!(r.field))],
        })
        .collect()
}

fn has_field_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.field_models
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::Model, vec![("name", json!(r.model))]),
            to: match_node(
                NodeLabel::Field,
                vec![("model", json!(r.model)), ("name", json!(r.field))],
            ),
            props: vec![],
        })
        .collect()
}

fn relates_to_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.field_references
        .iter()
        .map(|r| RelRow {
            from: match_node(
                NodeLabel::Field,
                vec![("model", json!(r.model)), ("name", json!(r.field))],
            ),
            to: merge_node(NodeLabel::Model, vec![("name", json!(r.target))]),
            props: vec![],
        })
        .collect()
}

fn contains_view_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.view_modules
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::Module, vec![("name", json!(r.module))]),
            to: match_node(NodeLabel::View, vec![("xml_id", json!(r.view_xml_id))]),
            props: vec![],
        })
        .collect()
}

fn view_for_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.view_models
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::View, vec![("xml_id", json!(r.view_xml_id))]),
            to: merge_node(NodeLabel::Model, vec![("name", json!(r.model))]),
            props: vec![],
        })
        .collect()
}

fn extends_rows(data: &GraphDataset) -> Vec<RelRow> {
    data.view_inheritances
        .iter()
        .map(|r| RelRow {
            from: match_node(NodeLabel::View, vec![("xml_id", json!(r.child_xml_id))]),
            to: merge_node(NodeLabel::View, vec![("xml_id", json!(r.parent_xml_id))]),
            props: vec![],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use odograph_core::dataset::{
        ContainsModelRel, DependsOnRel, FieldNode, HasFieldRel, InheritsRel, ModelNode, ModelType,
        ModuleNode, RelatesToRel,
    };
    use serde_json::json;

    fn module_node(name: &str) -> ModuleNode {
        ModuleNode {
            name: name.to_string(),
            version: "1.0".to_string(),
            description: String::new(),
            author: String::new(),
            category: "Uncategorized".to_string(),
            path: format!("/src/{name}"),
            installable: true,
            auto_install: false,
        }
    }

    fn model_node(name: &str, module: &str) -> ModelNode {
        ModelNode {
            name: name.to_string(),
            description: String::new(),
            module: module.to_string(),
            file_path: "/src/models.py".to_string(),
            class_name: "M".to_string(),
            model_type: ModelType::Base,
            is_abstract: false,
            is_extension: false,
            is_transient: false,
        }
    }

    fn sample_dataset() -> GraphDataset {
        GraphDataset {
            modules: vec![module_node("base"), module_node("sale")],
            models: vec![model_node("res.partner", "base"), model_node("sale.order", "sale")],
            fields: vec![FieldNode {
                model: "sale.order".to_string(),
                name: "partner_id".to_string(),
                field_type: "Many2one".to_string(),
                related_model: Some("res.partner".to_string()),
                attributes: "{}".to_string(),
            }],
            module_dependencies: vec![DependsOnRel {
                module: "sale".to_string(),
                dependency: "base".to_string(),
            }],
            model_modules: vec![
                ContainsModelRel {
                    module: "base".to_string(),
                    model: "res.partner".to_string(),
                },
                ContainsModelRel {
                    module: "sale".to_string(),
                    model: "sale.order".to_string(),
                },
            ],
            field_models: vec![HasFieldRel {
                model: "sale.order".to_string(),
                field: "partner_id".to_string(),
            }],
            field_references: vec![RelatesToRel {
                model: "sale.order".to_string(),
                field: "partner_id".to_string(),
                target: "res.partner".to_string(),
            }],
            ..GraphDataset::default()
        }
    }

    #[test]
    fn test_load_writes_nodes_and_relationships() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph.clone(), 1000);
        loader.ensure_schema();
        let metrics = loader.load(&sample_dataset()).unwrap();

        assert_eq!(metrics.nodes_written, 5);
        assert_eq!(metrics.relationships_written, 5);
        assert_eq!(metrics.errors, 0);

        let stats = loader.stats();
        assert_eq!(stats.modules, 2);
        assert_eq!(stats.models, 2);
        assert_eq!(stats.fields, 1);

        assert_eq!(graph.rel_count(RelType::DependsOn), 1);
        assert_eq!(graph.rel_count(RelType::RelatesTo), 1);
    }

    #[test]
    fn test_double_load_is_idempotent() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph.clone(), 1000);
        loader.load(&sample_dataset()).unwrap();
        let nodes = graph.node_total();
        let rels = graph.rel_total();

        loader.load(&sample_dataset()).unwrap();
        assert_eq!(graph.node_total(), nodes);
        assert_eq!(graph.rel_total(), rels);
    }

    #[test]
    fn test_inherits_creates_placeholder_parent() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph.clone(), 1000);

        let data = GraphDataset {
            modules: vec![module_node("m1")],
            models: vec![model_node("child.model", "m1")],
            model_inheritances: vec![InheritsRel {
                child: "child.model".to_string(),
                parent: "missing.parent".to_string(),
            }],
            ..GraphDataset::default()
        };
        loader.load(&data).unwrap();

        let placeholder = graph
            .node(NodeLabel::Model, &[("name", json!("missing.parent"))])
            .unwrap();
        assert_eq!(placeholder.len(), 1);
        assert_eq!(graph.rel_count(RelType::Inherits), 1);
    }

    #[test]
    fn test_batching_splits_steps() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph, 2);

        let data = GraphDataset {
            modules: (0..5).map(|i| module_node(&format!("m{i}"))).collect(),
            ..GraphDataset::default()
        };
        let metrics = loader.load(&data).unwrap();

        assert_eq!(metrics.nodes_written, 5);
        assert_eq!(metrics.batches_processed, 3);
        assert_eq!(metrics.steps.len(), 1);
        assert_eq!(metrics.steps[0].batches, 3);
        assert_eq!(metrics.steps[0].committed, 3);
    }

    #[test]
    fn test_empty_dataset_is_noop() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph.clone(), 1000);
        let metrics = loader.load(&GraphDataset::default()).unwrap();
        assert_eq!(metrics.batches_processed, 0);
        assert!(metrics.steps.is_empty());
        assert_eq!(graph.node_total(), 0);
    }

    #[test]
    fn test_clear_empties_graph() {
        let graph = MemoryGraph::in_memory();
        let mut loader = GraphLoader::new(graph.clone(), 1000);
        loader.load(&sample_dataset()).unwrap();
        loader.clear().unwrap();
        assert_eq!(graph.node_total(), 0);
        assert_eq!(graph.rel_total(), 0);
    }
}
