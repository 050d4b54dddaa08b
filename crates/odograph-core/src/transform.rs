//! Transformation of parsed facts into the normalized graph dataset.
//!
//! A pure function: no I/O, no store access. All normalization that the
//! parsers and the loader must not do happens here - model type derivation,
//! dropping of unnamed models and unbound views, de-duplication of
//! inheritance and reference edges, canonical attribute encoding, and a
//! deterministic sort of every collection.

use std::collections::BTreeSet;

use crate::dataset::{
    ContainsModelRel, ContainsViewRel, DelegationRel, DependsOnRel, FieldNode, GraphDataset,
    HasFieldRel, InheritsRel, ModelNode, ModelType, ModuleNode, RelatesToRel, ViewExtendsRel,
    ViewForRel, ViewNode,
};
use crate::literal::Literal;
use crate::model_parser::ModelInfo;
use crate::scanner::ModuleInfo;
use crate::view_parser::ViewInfo;

/// Classify a model declaration.
///
/// Transience wins over everything; an unnamed declaration is a mixin; a
/// named one is an extension when it names itself among its parents,
/// redefined when it inherits under a different name, and base otherwise.
pub fn model_type(model: &ModelInfo) -> ModelType {
    match &model.name {
        _ if model.is_transient => ModelType::Transient,
        None => ModelType::Mixin,
        Some(name) if model.inherits.iter().any(|p| p == name) => ModelType::Extension,
        Some(_) if !model.inherits.is_empty() => ModelType::Redefined,
        Some(_) => ModelType::Base,
    }
}

/// Combine scan and parse output into a [`GraphDataset`].
pub fn organize(
    modules: &[ModuleInfo],
    models: &[ModelInfo],
    views: &[ViewInfo],
) -> GraphDataset {
    let mut data = GraphDataset::default();

    for module in modules {
        data.modules.push(ModuleNode {
            name: module.name.clone(),
            version: module.version.clone(),
            description: module.description.clone(),
            author: module.author.clone(),
            category: module.category.clone(),
            path: module.path.display().to_string(),
            installable: module.installable,
            auto_install: module.auto_install,
        });
        for dependency in &module.depends {
            data.module_dependencies.push(DependsOnRel {
                module: module.name.clone(),
                dependency: dependency.clone(),
            });
        }
    }

    let mut seen_inherits = BTreeSet::new();
    let mut seen_references = BTreeSet::new();

    for model in models {
        // Unnamed mixins cannot anchor a node; their fields go with them.
        let Some(name) = &model.name else {
            continue;
        };

        data.models.push(ModelNode {
            name: name.clone(),
            description: model.description.clone(),
            module: model.module.clone(),
            file_path: model.file_path.display().to_string(),
            class_name: model.class_name.clone(),
            model_type: model_type(model),
            is_abstract: model.is_abstract,
            is_extension: model.is_extension,
            is_transient: model.is_transient,
        });

        data.model_modules.push(ContainsModelRel {
            module: model.module.clone(),
            model: name.clone(),
        });

        for parent in &model.inherits {
            if seen_inherits.insert((name.clone(), parent.clone())) {
                data.model_inheritances.push(InheritsRel {
                    child: name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        for (parent, field) in &model.inherits_delegation {
            data.model_delegations.push(DelegationRel {
                child: name.clone(),
                parent: parent.clone(),
                field: field.clone(),
            });
        }

        for field in &model.fields {
            if field.name.is_empty() {
                continue;
            }

            data.fields.push(FieldNode {
                model: name.clone(),
                name: field.name.clone(),
                field_type: field.field_type.clone(),
                related_model: field.related_model.clone(),
                attributes: attributes_json(&field.attributes),
            });

            data.field_models.push(HasFieldRel {
                model: name.clone(),
                field: field.name.clone(),
            });

            if let Some(target) = &field.related_model {
                let key = (name.clone(), field.name.clone(), target.clone());
                if seen_references.insert(key) {
                    data.field_references.push(RelatesToRel {
                        model: name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
    }

    for view in views {
        // Both halves of the identity are mandatory.
        if view.xml_id.is_empty() || view.model.is_empty() {
            continue;
        }

        data.views.push(ViewNode {
            xml_id: view.xml_id.clone(),
            name: view.name.clone(),
            model: view.model.clone(),
            view_type: view.view_type.clone(),
            module: view.module.clone(),
            file_path: view.file_path.display().to_string(),
            priority: view.priority,
        });

        data.view_modules.push(ContainsViewRel {
            module: view.module.clone(),
            view_xml_id: view.xml_id.clone(),
        });

        data.view_models.push(ViewForRel {
            view_xml_id: view.xml_id.clone(),
            model: view.model.clone(),
        });

        if let Some(parent) = &view.inherit_id {
            data.view_inheritances.push(ViewExtendsRel {
                child_xml_id: view.xml_id.clone(),
                parent_xml_id: parent.clone(),
            });
        }
    }

    sort_dataset(&mut data);
    data
}

/// Canonical key-sorted JSON string for a field's declared options.
fn attributes_json(attributes: &std::collections::BTreeMap<String, Literal>) -> String {
    let object: serde_json::Map<String, serde_json::Value> = attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(object).to_string()
}

/// Order every collection by identity so output is byte-stable regardless
/// of parse completion order.
fn sort_dataset(data: &mut GraphDataset) {
    data.modules.sort();
    data.models.sort();
    data.views.sort();
    data.fields.sort();
    data.module_dependencies.sort();
    data.model_modules.sort();
    data.model_inheritances.sort();
    data.model_delegations.sort();
    data.field_models.sort();
    data.field_references.sort();
    data.view_modules.sort();
    data.view_models.sort();
    data.view_inheritances.sort();
}
