//! Extraction of view records from Odoo XML data files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

/// The record model that marks a view definition.
pub const VIEW_RECORD_MODEL: &str = "ir.ui.view";

/// Subdirectories conventionally holding view declarations.
const VIEW_SUBDIRS: [&str; 3] = ["views", "data", "security"];

/// A view record bound to a model, possibly extending another view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewInfo {
    /// Externally scoped id: `<module>.<local_id>`.
    pub xml_id: String,
    pub name: String,
    /// Model the view presents; required.
    pub model: String,
    /// form, tree, kanban, ...
    pub view_type: String,
    /// External id of the view this one extends.
    pub inherit_id: Option<String>,
    pub module: String,
    pub file_path: PathBuf,
    pub priority: i64,
    /// Inner markup of the `arch` field, serialized back to text.
    pub arch: String,
}

impl ViewInfo {
    pub fn is_extension(&self) -> bool {
        self.inherit_id.is_some()
    }
}

/// Parses XML files of one module, collecting view records.
pub struct ViewParser {
    module_name: String,
}

impl ViewParser {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Parse the `views/`, `data/` and `security/` subtrees plus any XML in
    /// the module root.
    pub fn parse_directory(&self, dir: &Path) -> Vec<ViewInfo> {
        let mut seen = BTreeSet::new();
        let mut views = Vec::new();

        for sub in VIEW_SUBDIRS {
            let subdir = dir.join(sub);
            if !subdir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&subdir)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file()
                    && is_xml(entry.path())
                    && seen.insert(entry.path().to_path_buf())
                {
                    views.extend(self.parse_file(entry.path()));
                }
            }
        }

        // XML directly in the module root (data files are sometimes kept
        // beside the manifest).
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if path.is_file() && is_xml(&path) && seen.insert(path.clone()) {
                    views.extend(self.parse_file(&path));
                }
            }
        }

        views
    }

    /// Parse one file. A malformed document skips the file with a warning.
    pub fn parse_file(&self, path: &Path) -> Vec<ViewInfo> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.parse_source(&text, path),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable XML file; skipping");
                Vec::new()
            }
        }
    }

    /// Parse view records out of an XML string.
    pub fn parse_source(&self, text: &str, path: &Path) -> Vec<ViewInfo> {
        let doc = match Document::parse(text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed XML; skipping file");
                return Vec::new();
            }
        };

        doc.descendants()
            .filter(|node| {
                node.has_tag_name("record") && node.attribute("model") == Some(VIEW_RECORD_MODEL)
            })
            .filter_map(|record| self.parse_record(text, record, path))
            .collect()
    }

    fn parse_record(&self, doc_text: &str, record: Node, path: &Path) -> Option<ViewInfo> {
        let local_id = record.attribute("id")?;

        let model = field_text(record, "model").filter(|m| !m.is_empty())?;

        let priority = field_text(record, "priority")
            .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
            .and_then(|t| t.parse().ok())
            .unwrap_or(16);

        Some(ViewInfo {
            xml_id: format!("{}.{}", self.module_name, local_id),
            name: field_text(record, "name").unwrap_or_else(|| local_id.to_string()),
            model,
            view_type: field_text(record, "type").unwrap_or_else(|| "form".to_string()),
            inherit_id: field_node(record, "inherit_id")
                .and_then(|n| n.attribute("ref"))
                .map(str::to_string),
            module: self.module_name.clone(),
            file_path: std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
            priority,
            arch: arch_markup(doc_text, record),
        })
    }
}

fn is_xml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "xml")
}

/// `<field name="...">` descendant of a record, by name.
fn field_node<'a>(record: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    record
        .descendants()
        .find(|node| node.has_tag_name("field") && node.attribute("name") == Some(name))
}

fn field_text(record: Node, name: &str) -> Option<String> {
    field_node(record, name).and_then(|node| node.text()).map(str::to_string)
}

/// Inner markup of the `arch` field: text content plus every child element
/// sliced verbatim from the source document, preserving structure.
fn arch_markup(doc_text: &str, record: Node) -> String {
    let Some(arch) = field_node(record, "arch") else {
        return String::new();
    };

    let mut out = String::new();
    for child in arch.children() {
        if child.is_element() {
            out.push_str(&doc_text[child.range()]);
        } else if let Some(text) = child.text() {
            out.push_str(text);
        }
    }
    out
}
