//! Static extraction of Odoo models from Python source.
//!
//! Model declarations are recognized purely syntactically: a class is a
//! model when one of its bases is the two-level attribute access
//! `models.Model`, `models.TransientModel` or `models.AbstractModel`. No
//! name resolution happens and no code runs; reserved class attributes and
//! field constructor arguments are recovered through the literal whitelist
//! in [`crate::literal`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustpython_ast as ast;
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::FileFilter;
use crate::literal::{self, Literal};

/// Field constructors whose first argument names another model.
pub const RELATIONAL_FIELDS: [&str; 4] = ["Many2one", "One2many", "Many2many", "Reference"];

/// A field declared on a model via `fields.<Constructor>(...)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    /// Leaf name of the constructor, e.g. `Char` or `Many2one`.
    pub field_type: String,
    /// Target model of a relational field, when syntactically literal.
    pub related_model: Option<String>,
    /// Keyword arguments with safely evaluable values.
    pub attributes: BTreeMap<String, Literal>,
}

impl FieldInfo {
    pub fn is_relational(&self) -> bool {
        RELATIONAL_FIELDS.contains(&self.field_type.as_str())
    }
}

/// A model extracted from one class declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Effective name: `_name` when declared, else the single `_inherit`
    /// entry of an in-place extension. `None` marks an unnamed mixin.
    pub name: Option<String>,
    /// The literal `_name`, when present.
    pub declared_name: Option<String>,
    /// `_inherit`, normalized to a list.
    pub inherits: Vec<String>,
    /// `_inherits`: parent model name mapped to the delegating field.
    pub inherits_delegation: BTreeMap<String, String>,
    pub description: String,
    pub fields: Vec<FieldInfo>,
    pub module: String,
    pub file_path: PathBuf,
    /// Syntactic class name of the declaration.
    pub class_name: String,
    /// No `_name` was declared.
    pub is_abstract: bool,
    /// Declares `_inherit` without `_name`: modifies a model in place.
    pub is_extension: bool,
    pub is_transient: bool,
}

/// Parses Python files of one module, collecting model declarations.
pub struct ModelParser {
    module_name: String,
}

impl ModelParser {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Parse every non-test Python file under `dir`.
    pub fn parse_directory(&self, dir: &Path, filter: &FileFilter) -> Vec<ModelInfo> {
        let mut models = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().is_none_or(|ext| ext != "py")
                || filter.excludes_source(path)
            {
                continue;
            }
            models.extend(self.parse_file(path));
        }
        models
    }

    /// Parse one file. Read and syntax errors skip the file with a warning.
    pub fn parse_file(&self, path: &Path) -> Vec<ModelInfo> {
        match std::fs::read_to_string(path) {
            Ok(source) => self.parse_source(&source, path),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable source file; skipping");
                Vec::new()
            }
        }
    }

    /// Parse model declarations out of a source string.
    pub fn parse_source(&self, source: &str, path: &Path) -> Vec<ModelInfo> {
        let module = match parse(source, Mode::Module, &path.to_string_lossy()) {
            Ok(ast::Mod::Module(module)) => module,
            Ok(_) => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "syntax error; skipping file");
                return Vec::new();
            }
        };

        let mut classes = Vec::new();
        collect_classes(&module.body, &mut classes);

        classes
            .into_iter()
            .filter_map(|class| self.parse_class(class, path))
            .collect()
    }

    fn parse_class(&self, class: &ast::StmtClassDef, path: &Path) -> Option<ModelInfo> {
        if !is_odoo_model(class) {
            return None;
        }

        let declared_name =
            get_class_attribute(class, "_name").and_then(|v| v.as_str().map(str::to_string));
        let inherits = get_class_attribute(class, "_inherit")
            .map(|v| v.as_str_list())
            .unwrap_or_default();
        let inherits_delegation = get_class_attribute(class, "_inherits")
            .map(|v| v.as_str_map())
            .unwrap_or_default();
        let description = get_class_attribute(class, "_description")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        // The `_transient` attribute wins even on an AbstractModel base.
        let is_transient = get_class_attribute(class, "_transient")
            .is_some_and(|v| v.is_truthy())
            || extends_transient(class);

        let is_extension = !inherits.is_empty() && declared_name.is_none();

        // An in-place extension is identified by the model it extends.
        let name = declared_name.clone().or_else(|| {
            (is_extension && inherits.len() == 1).then(|| inherits[0].clone())
        });

        Some(ModelInfo {
            name,
            is_abstract: declared_name.is_none(),
            declared_name,
            inherits,
            inherits_delegation,
            description,
            fields: parse_fields(class),
            module: self.module_name.clone(),
            file_path: std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
            class_name: class.name.to_string(),
            is_extension,
            is_transient,
        })
    }
}

/// True when any base is `models.{Model,TransientModel,AbstractModel}`.
fn is_odoo_model(class: &ast::StmtClassDef) -> bool {
    class.bases.iter().any(|base| {
        matches_model_base(base, &["Model", "TransientModel", "AbstractModel"])
    })
}

/// True when any base is `models.TransientModel`.
fn extends_transient(class: &ast::StmtClassDef) -> bool {
    class
        .bases
        .iter()
        .any(|base| matches_model_base(base, &["TransientModel"]))
}

fn matches_model_base(base: &ast::Expr, leaves: &[&str]) -> bool {
    let ast::Expr::Attribute(attr) = base else {
        return false;
    };
    matches!(attr.value.as_ref(), ast::Expr::Name(n) if n.id.as_str() == "models")
        && leaves.contains(&attr.attr.as_str())
}

/// Value of a top-level `attr_name = <literal>` class attribute, if any.
fn get_class_attribute(class: &ast::StmtClassDef, attr_name: &str) -> Option<Literal> {
    for stmt in &class.body {
        let ast::Stmt::Assign(assign) = stmt else {
            continue;
        };
        for target in &assign.targets {
            if matches!(target, ast::Expr::Name(n) if n.id.as_str() == attr_name) {
                return literal::eval_expr(&assign.value);
            }
        }
    }
    None
}

/// Extract `fields.<Constructor>(...)` assignments from the class body.
fn parse_fields(class: &ast::StmtClassDef) -> Vec<FieldInfo> {
    let mut fields = Vec::new();
    for stmt in &class.body {
        let ast::Stmt::Assign(assign) = stmt else {
            continue;
        };
        for target in &assign.targets {
            let ast::Expr::Name(target) = target else {
                continue;
            };
            if let Some(field) = parse_field_definition(target.id.as_str(), &assign.value) {
                fields.push(field);
            }
        }
    }
    fields
}

fn parse_field_definition(field_name: &str, value: &ast::Expr) -> Option<FieldInfo> {
    let ast::Expr::Call(call) = value else {
        return None;
    };
    let field_type = field_constructor(call)?;

    let related_model = RELATIONAL_FIELDS
        .contains(&field_type)
        .then(|| related_model(call))
        .flatten();

    let mut attributes = BTreeMap::new();
    for keyword in &call.keywords {
        let Some(arg) = &keyword.arg else {
            continue;
        };
        if let Some(value) = literal::eval_expr(&keyword.value) {
            // A literal None carries no information worth storing.
            if value != Literal::None {
                attributes.insert(arg.to_string(), value);
            }
        }
    }

    Some(FieldInfo {
        name: field_name.to_string(),
        field_type: field_type.to_string(),
        related_model,
        attributes,
    })
}

/// Constructor leaf of a `fields.<Constructor>` call, if that is what the
/// callee is.
fn field_constructor(call: &ast::ExprCall) -> Option<&str> {
    let ast::Expr::Attribute(attr) = call.func.as_ref() else {
        return None;
    };
    matches!(attr.value.as_ref(), ast::Expr::Name(n) if n.id.as_str() == "fields")
        .then(|| attr.attr.as_str())
}

/// Target of a relational field: first positional string literal, else the
/// `comodel_name` keyword.
fn related_model(call: &ast::ExprCall) -> Option<String> {
    if let Some(first) = call.args.first() {
        if let Some(Literal::Str(s)) = literal::eval_expr(first) {
            return Some(s);
        }
    }
    call.keywords
        .iter()
        .find(|kw| kw.arg.as_ref().is_some_and(|a| a.as_str() == "comodel_name"))
        .and_then(|kw| match literal::eval_expr(&kw.value) {
            Some(Literal::Str(s)) => Some(s),
            _ => None,
        })
}

/// Collect class declarations recursively; models are occasionally nested
/// inside conditionals or other classes.
fn collect_classes<'a>(stmts: &'a [ast::Stmt], out: &mut Vec<&'a ast::StmtClassDef>) {
    for stmt in stmts {
        match stmt {
            ast::Stmt::ClassDef(class) => {
                out.push(class);
                collect_classes(&class.body, out);
            }
            ast::Stmt::FunctionDef(f) => collect_classes(&f.body, out),
            ast::Stmt::AsyncFunctionDef(f) => collect_classes(&f.body, out),
            ast::Stmt::If(s) => {
                collect_classes(&s.body, out);
                collect_classes(&s.orelse, out);
            }
            ast::Stmt::While(s) => {
                collect_classes(&s.body, out);
                collect_classes(&s.orelse, out);
            }
            ast::Stmt::For(s) => {
                collect_classes(&s.body, out);
                collect_classes(&s.orelse, out);
            }
            ast::Stmt::With(s) => collect_classes(&s.body, out),
            ast::Stmt::Try(s) => {
                collect_classes(&s.body, out);
                for handler in &s.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    collect_classes(&h.body, out);
                }
                collect_classes(&s.orelse, out);
                collect_classes(&s.finalbody, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<ModelInfo> {
        ModelParser::new("test_module").parse_source(source, Path::new("models.py"))
    }

    #[test]
    fn test_basic_model() {
        let models = parse(
            r#"
class ResPartner(models.Model):
    _name = 'res.partner'
    _description = 'Contact'

    name = fields.Char(string='Name', required=True)
    active = fields.Boolean(default=True)
"#,
        );

        assert_eq!(models.len(), 1);
        let model = &models[0];
        assert_eq!(model.name.as_deref(), Some("res.partner"));
        assert_eq!(model.declared_name.as_deref(), Some("res.partner"));
        assert_eq!(model.description, "Contact");
        assert_eq!(model.class_name, "ResPartner");
        assert_eq!(model.module, "test_module");
        assert!(!model.is_abstract);
        assert!(!model.is_extension);
        assert!(!model.is_transient);

        assert_eq!(model.fields.len(), 2);
        assert_eq!(model.fields[0].name, "name");
        assert_eq!(model.fields[0].field_type, "Char");
        assert_eq!(
            model.fields[0].attributes.get("required"),
            Some(&Literal::Bool(true))
        );
    }

    #[test]
    fn test_non_model_class_ignored() {
        let models = parse(
            r#"
class Helper:
    pass

class Base(object):
    _name = 'not.a.model'
"#,
        );
        assert!(models.is_empty());
    }

    #[test]
    fn test_in_place_extension() {
        let models = parse(
            r#"
class PartnerExt(models.Model):
    _inherit = 'res.partner'

    vat = fields.Char()
"#,
        );

        let model = &models[0];
        assert_eq!(model.name.as_deref(), Some("res.partner"));
        assert_eq!(model.declared_name, None);
        assert!(model.is_extension);
        assert!(model.is_abstract);
        assert_eq!(model.inherits, vec!["res.partner".to_string()]);
    }

    #[test]
    fn test_inherit_string_normalized_to_list() {
        let single = parse("class A(models.Model):\n    _inherit = 'res.partner'\n");
        let listed = parse("class A(models.Model):\n    _inherit = ['res.partner']\n");
        assert_eq!(single[0].inherits, listed[0].inherits);
    }

    #[test]
    fn test_unnamed_multi_inherit_is_mixin() {
        let models = parse(
            r#"
class Mixed(models.AbstractModel):
    _inherit = ['mail.thread', 'mail.activity.mixin']

    note = fields.Text()
"#,
        );

        let model = &models[0];
        assert_eq!(model.name, None);
        assert!(model.is_extension);
        assert_eq!(model.inherits.len(), 2);
    }

    #[test]
    fn test_delegation_inheritance() {
        let models = parse(
            r#"
class ResUsers(models.Model):
    _name = 'res.users'
    _inherits = {'res.partner': 'partner_id'}

    partner_id = fields.Many2one('res.partner', required=True, ondelete='restrict')
"#,
        );

        let model = &models[0];
        assert_eq!(
            model.inherits_delegation.get("res.partner").map(String::as_str),
            Some("partner_id")
        );
        let field = &model.fields[0];
        assert_eq!(field.field_type, "Many2one");
        assert_eq!(field.related_model.as_deref(), Some("res.partner"));
        assert_eq!(
            field.attributes.get("ondelete"),
            Some(&Literal::Str("restrict".to_string()))
        );
    }

    #[test]
    fn test_transient_via_base_and_attribute() {
        let via_base = parse("class W(models.TransientModel):\n    _name = 'w.izard'\n");
        assert!(via_base[0].is_transient);

        let via_attr = parse(
            "class A(models.AbstractModel):\n    _name = 'a.bstract'\n    _transient = True\n",
        );
        assert!(via_attr[0].is_transient);

        let plain = parse("class M(models.Model):\n    _name = 'm.odel'\n");
        assert!(!plain[0].is_transient);
    }

    #[test]
    fn test_comodel_name_keyword() {
        let models = parse(
            r#"
class SaleOrder(models.Model):
    _name = 'sale.order'

    partner_id = fields.Many2one(comodel_name='res.partner')
    line_ids = fields.One2many('sale.order.line', 'order_id')
"#,
        );

        let fields = &models[0].fields;
        assert_eq!(fields[0].related_model.as_deref(), Some("res.partner"));
        assert_eq!(fields[1].related_model.as_deref(), Some("sale.order.line"));
    }

    #[test]
    fn test_dynamic_comodel_not_resolved() {
        let models = parse(
            r#"
class M(models.Model):
    _name = 'm.odel'

    ref_id = fields.Many2one(TARGET)
"#,
        );
        assert_eq!(models[0].fields[0].related_model, None);
    }

    #[test]
    fn test_non_relational_first_arg_is_not_related_model() {
        let models = parse(
            "class M(models.Model):\n    _name = 'm'\n    label = fields.Char('Label')\n",
        );
        assert_eq!(models[0].fields[0].related_model, None);
    }

    #[test]
    fn test_unsafe_attribute_values_skipped() {
        let models = parse(
            r#"
class M(models.Model):
    _name = 'm.odel'

    state = fields.Selection(selection=[('a', 'A')], default=lambda self: 'a', index=True)
"#,
        );

        let attrs = &models[0].fields[0].attributes;
        assert!(attrs.contains_key("selection"));
        assert!(attrs.contains_key("index"));
        assert!(!attrs.contains_key("default"));
    }

    #[test]
    fn test_syntax_error_returns_empty() {
        let models = parse("class Broken(models.Model:\n    pass\n");
        assert!(models.is_empty());
    }

    #[test]
    fn test_nested_class_found() {
        let models = parse(
            r#"
if True:
    class Hidden(models.Model):
        _name = 'hidden.model'
"#,
        );
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name.as_deref(), Some("hidden.model"));
    }

    #[test]
    fn test_methods_are_not_fields() {
        let models = parse(
            r#"
class M(models.Model):
    _name = 'm.odel'

    name = fields.Char()

    def action_confirm(self):
        self.state = fields.Selection([])
        return True
"#,
        );
        assert_eq!(models[0].fields.len(), 1);
    }
}
