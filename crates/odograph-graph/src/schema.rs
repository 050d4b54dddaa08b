//! Graph schema: labels, relationship types and bootstrap operations.
//!
//! Label and relationship names are an external interface - downstream
//! queries depend on them - so they live here in one place.

/// Node labels of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeLabel {
    Module,
    Model,
    View,
    Field,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Module => "OdooModule",
            NodeLabel::Model => "OdooModel",
            NodeLabel::View => "OdooView",
            NodeLabel::Field => "OdooField",
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types, in the order Phase 2 writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelType {
    DependsOn,
    ContainsModel,
    Inherits,
    InheritsDelegation,
    HasField,
    RelatesTo,
    ContainsView,
    ViewFor,
    Extends,
}

impl RelType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelType::DependsOn => "DEPENDS_ON",
            RelType::ContainsModel => "CONTAINS_MODEL",
            RelType::Inherits => "INHERITS",
            RelType::InheritsDelegation => "INHERITS_DELEGATION",
            RelType::HasField => "HAS_FIELD",
            RelType::RelatesTo => "RELATES_TO",
            RelType::ContainsView => "CONTAINS_VIEW",
            RelType::ViewFor => "VIEW_FOR",
            RelType::Extends => "EXTENDS",
        }
    }
}

impl std::fmt::Display for RelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One idempotent schema bootstrap operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOp {
    Unique {
        label: NodeLabel,
        property: &'static str,
    },
    Index {
        label: NodeLabel,
        property: &'static str,
    },
}

/// Constraints and indexes the loader ensures before Phase 1.
pub fn bootstrap_ops() -> Vec<SchemaOp> {
    vec![
        SchemaOp::Unique {
            label: NodeLabel::Module,
            property: "name",
        },
        SchemaOp::Unique {
            label: NodeLabel::Model,
            property: "name",
        },
        SchemaOp::Unique {
            label: NodeLabel::View,
            property: "xml_id",
        },
        SchemaOp::Index {
            label: NodeLabel::Model,
            property: "module",
        },
        SchemaOp::Index {
            label: NodeLabel::View,
            property: "model",
        },
        SchemaOp::Index {
            label: NodeLabel::Field,
            property: "field_type",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_names_are_stable() {
        assert_eq!(NodeLabel::Module.as_str(), "OdooModule");
        assert_eq!(NodeLabel::Model.as_str(), "OdooModel");
        assert_eq!(NodeLabel::View.as_str(), "OdooView");
        assert_eq!(NodeLabel::Field.as_str(), "OdooField");
    }

    #[test]
    fn test_relationship_names_are_stable() {
        assert_eq!(RelType::DependsOn.as_str(), "DEPENDS_ON");
        assert_eq!(RelType::InheritsDelegation.as_str(), "INHERITS_DELEGATION");
        assert_eq!(RelType::ViewFor.as_str(), "VIEW_FOR");
    }

    #[test]
    fn test_bootstrap_has_three_constraints_and_three_indexes() {
        let ops = bootstrap_ops();
        assert_eq!(
            ops.iter()
                .filter(|op| matches!(op, SchemaOp::Unique { .. }))
                .count(),
            3
        );
        assert_eq!(
            ops.iter()
                .filter(|op| matches!(op, SchemaOp::Index { .. }))
                .count(),
            3
        );
    }
}
