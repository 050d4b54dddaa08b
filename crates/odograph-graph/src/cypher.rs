//! Cypher rendering of the store contract.
//!
//! The wire mapping a Bolt adapter runs against a real Neo4j server: one
//! parameterized `UNWIND` statement per batch, with every data value passed
//! as a parameter, never interpolated into query text. The in-process store
//! does not go through strings at all; these renderings exist so the
//! external statement shapes are pinned down and tested in one place.

use serde_json::Value;

use crate::schema::SchemaOp;
use crate::store::{NodeBatch, RelBatch, RelRow};

/// Statement for one schema bootstrap operation.
pub fn schema_statement(op: &SchemaOp) -> String {
    match op {
        SchemaOp::Unique { label, property } => format!(
            "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS UNIQUE"
        ),
        SchemaOp::Index { label, property } => {
            format!("CREATE INDEX IF NOT EXISTS FOR (n:{label}) ON (n.{property})")
        }
    }
}

/// Statement deleting every node and relationship.
pub fn clear_statement() -> &'static str {
    "MATCH (n) DETACH DELETE n"
}

/// Statement counting nodes of one label.
pub fn count_statement(label: crate::schema::NodeLabel) -> String {
    format!("MATCH (n:{label}) RETURN count(n) AS count")
}

/// Batched node upsert: merge on the identity key, set all attributes.
///
/// The statement shape is taken from the first row; the loader builds every
/// row of a batch with the same shape.
pub fn upsert_nodes_statement(batch: &NodeBatch) -> String {
    let Some(row) = batch.rows.first() else {
        return String::new();
    };

    let key: Vec<String> = row
        .key
        .iter()
        .map(|(name, _)| format!("{name}: row.{name}"))
        .collect();
    let sets: Vec<String> = row
        .props
        .iter()
        .map(|(name, _)| format!("n.{name} = row.{name}"))
        .collect();

    let mut statement = format!(
        "UNWIND $rows AS row\nMERGE (n:{} {{{}}})",
        batch.label,
        key.join(", ")
    );
    if !sets.is_empty() {
        statement.push_str("\nSET ");
        statement.push_str(&sets.join(",\n    "));
    }
    statement
}

/// Batched relationship merge: match the source, match or merge the target,
/// merge the edge, set edge properties.
pub fn merge_relationships_statement(batch: &RelBatch) -> String {
    let Some(row) = batch.rows.first() else {
        return String::new();
    };

    let endpoint = |node: &crate::store::Endpoint, var: &str, side: &str| {
        let key: Vec<String> = node
            .key
            .iter()
            .map(|(name, _)| format!("{name}: row.{side}_{name}"))
            .collect();
        let verb = if node.create_if_missing { "MERGE" } else { "MATCH" };
        format!("{verb} ({var}:{} {{{}}})", node.label, key.join(", "))
    };

    let mut statement = format!(
        "UNWIND $rows AS row\n{}\n{}\nMERGE (a)-[r:{}]->(b)",
        endpoint(&row.from, "a", "from"),
        endpoint(&row.to, "b", "to"),
        batch.rel_type
    );

    let sets: Vec<String> = row
        .props
        .iter()
        .map(|(name, _)| format!("r.{name} = row.{name}"))
        .collect();
    if !sets.is_empty() {
        statement.push_str("\nSET ");
        statement.push_str(&sets.join(", "));
    }
    statement
}

/// Flattened parameter object for one relationship row, matching the
/// `row.from_*` / `row.to_*` names used by the statement.
pub fn rel_row_params(row: &RelRow) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in &row.from.key {
        map.insert(format!("from_{name}"), value.clone());
    }
    for (name, value) in &row.to.key {
        map.insert(format!("to_{name}"), value.clone());
    }
    for (name, value) in &row.props {
        map.insert((*name).to_string(), value.clone());
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NodeLabel, RelType};
    use crate::store::{Endpoint, NodeRow};
    use serde_json::json;

    #[test]
    fn test_schema_statements() {
        assert_eq!(
            schema_statement(&SchemaOp::Unique {
                label: NodeLabel::Module,
                property: "name"
            }),
            "CREATE CONSTRAINT IF NOT EXISTS FOR (n:OdooModule) REQUIRE n.name IS UNIQUE"
        );
        assert_eq!(
            schema_statement(&SchemaOp::Index {
                label: NodeLabel::Field,
                property: "field_type"
            }),
            "CREATE INDEX IF NOT EXISTS FOR (n:OdooField) ON (n.field_type)"
        );
    }

    #[test]
    fn test_upsert_nodes_statement() {
        let batch = NodeBatch {
            label: NodeLabel::Module,
            rows: vec![NodeRow {
                key: vec![("name", json!("base"))],
                props: vec![("version", json!("1.0")), ("installable", json!(true))],
            }],
        };
        assert_eq!(
            upsert_nodes_statement(&batch),
            "UNWIND $rows AS row\n\
             MERGE (n:OdooModule {name: row.name})\n\
             SET n.version = row.version,\n    n.installable = row.installable"
        );
    }

    #[test]
    fn test_merge_relationships_statement_with_placeholder() {
        let batch = RelBatch {
            rel_type: RelType::Inherits,
            rows: vec![RelRow {
                from: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("child"))],
                    create_if_missing: false,
                },
                to: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("parent"))],
                    create_if_missing: true,
                },
                props: vec![],
            }],
        };
        assert_eq!(
            merge_relationships_statement(&batch),
            "UNWIND $rows AS row\n\
             MATCH (a:OdooModel {name: row.from_name})\n\
             MERGE (b:OdooModel {name: row.to_name})\n\
             MERGE (a)-[r:INHERITS]->(b)"
        );
    }

    #[test]
    fn test_delegation_statement_sets_edge_field() {
        let batch = RelBatch {
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
                props: vec![("field", json!("partner_id"))],
            }],
        };
        let statement = merge_relationships_statement(&batch);
        assert!(statement.ends_with("MERGE (a)-[r:INHERITS_DELEGATION]->(b)\nSET r.field = row.field"));
    }

    #[test]
    fn test_composite_key_statement() {
        let batch = RelBatch {
            rel_type: RelType::HasField,
            rows: vec![RelRow {
                from: Endpoint {
                    label: NodeLabel::Model,
                    key: vec![("name", json!("sale.order"))],
                    create_if_missing: false,
                },
                to: Endpoint {
                    label: NodeLabel::Field,
                    key: vec![("model", json!("sale.order")), ("name", json!("partner_id"))],
                    create_if_missing: false,
                },
                props: vec![],
            }],
        };
        let statement = merge_relationships_statement(&batch);
        assert!(statement.contains("MATCH (b:OdooField {model: row.to_model, name: row.to_name})"));
    }

    #[test]
    fn test_rel_row_params_flattened() {
        let row = RelRow {
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
            props: vec![("field", json!("partner_id"))],
        };
        assert_eq!(
            rel_row_params(&row),
            json!({
                "from_name": "res.users",
                "to_name": "res.partner",
                "field": "partner_id"
            })
        );
    }

    #[test]
    fn test_empty_batches_render_empty() {
        let batch = NodeBatch {
            label: NodeLabel::View,
            rows: vec![],
        };
        assert_eq!(upsert_nodes_statement(&batch), "");
    }
}
