//! Normalized node and relationship collections, ready for loading.
//!
//! The transformer emits this dataset; the loader writes it. Node structs
//! carry exactly the properties stored on the graph, so the loader stays a
//! mechanical mapping.

use serde::{Deserialize, Serialize};

/// Derived classification of a model declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Base,
    Extension,
    Redefined,
    Mixin,
    Transient,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Base => "base",
            ModelType::Extension => "extension",
            ModelType::Redefined => "redefined",
            ModelType::Mixin => "mixin",
            ModelType::Transient => "transient",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleNode {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub path: String,
    pub installable: bool,
    pub auto_install: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelNode {
    pub name: String,
    pub description: String,
    pub module: String,
    pub file_path: String,
    pub class_name: String,
    pub model_type: ModelType,
    pub is_abstract: bool,
    pub is_extension: bool,
    pub is_transient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewNode {
    pub xml_id: String,
    pub name: String,
    pub model: String,
    pub view_type: String,
    pub module: String,
    pub file_path: String,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldNode {
    /// Owning model name; with `name`, the field identity.
    pub model: String,
    pub name: String,
    pub field_type: String,
    pub related_model: Option<String>,
    /// Canonical key-sorted JSON encoding of the declared options.
    pub attributes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependsOnRel {
    pub module: String,
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainsModelRel {
    pub module: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainsViewRel {
    pub module: String,
    pub view_xml_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InheritsRel {
    pub child: String,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DelegationRel {
    pub child: String,
    pub parent: String,
    /// The forwarding field on the child.
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HasFieldRel {
    pub model: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatesToRel {
    pub model: String,
    pub field: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewForRel {
    pub view_xml_id: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewExtendsRel {
    pub child_xml_id: String,
    pub parent_xml_id: String,
}

/// The full normalized dataset: nodes first, then relationships in load
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDataset {
    pub modules: Vec<ModuleNode>,
    pub models: Vec<ModelNode>,
    pub views: Vec<ViewNode>,
    pub fields: Vec<FieldNode>,

    pub module_dependencies: Vec<DependsOnRel>,
    pub model_modules: Vec<ContainsModelRel>,
    pub model_inheritances: Vec<InheritsRel>,
    pub model_delegations: Vec<DelegationRel>,
    pub field_models: Vec<HasFieldRel>,
    pub field_references: Vec<RelatesToRel>,
    pub view_modules: Vec<ContainsViewRel>,
    pub view_models: Vec<ViewForRel>,
    pub view_inheritances: Vec<ViewExtendsRel>,
}

impl GraphDataset {
    pub fn node_count(&self) -> usize {
        self.modules.len() + self.models.len() + self.views.len() + self.fields.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.module_dependencies.len()
            + self.model_modules.len()
            + self.model_inheritances.len()
            + self.model_delegations.len()
            + self.field_models.len()
            + self.field_references.len()
            + self.view_modules.len()
            + self.view_models.len()
            + self.view_inheritances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0 && self.relationship_count() == 0
    }
}
