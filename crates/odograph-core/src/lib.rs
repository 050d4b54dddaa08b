//! # Odograph Core - Extract and Transform
//!
//! Core pipeline stages for the odograph analyzer: module discovery, static
//! parsing of Odoo Python models and XML views, incremental change
//! detection, and transformation of parsed facts into a normalized graph
//! dataset.
//!
//! ## Overview
//!
//! An Odoo source tree is a corpus of *modules*, each a directory with a
//! `__manifest__.py`. This crate extracts the declarative surface of the
//! corpus without ever executing user code:
//!
//! 1. **Discovery** ([`scanner`]) - Walk the corpus root and parse manifests
//! 2. **Parsing** ([`model_parser`], [`view_parser`]) - Static extraction of
//!    models, fields and views
//! 3. **Change detection** ([`state`], [`changes`]) - Content-addressed
//!    selection of the modules worth re-parsing
//! 4. **Transformation** ([`transform`]) - Normalized, de-duplicated,
//!    deterministic node/relationship dataset ([`dataset`])
//!
//! Manifest and class-attribute values are recovered through a restricted
//! literal evaluator ([`literal`]) that accepts only scalars, sequences and
//! mappings - no calls, no name resolution, no attribute access.
//!
//! ## Example
//!
//! ```rust
//! use odograph_core::model_parser::ModelParser;
//!
//! let source = r#"
//! class ResPartner(models.Model):
//!     _name = 'res.partner'
//!     name = fields.Char(string='Name')
//! "#;
//!
//! let parser = ModelParser::new("base");
//! let models = parser.parse_source(source, std::path::Path::new("partner.py"));
//! assert_eq!(models[0].name.as_deref(), Some("res.partner"));
//! ```

pub mod changes;
pub mod config;
pub mod dataset;
pub mod error;
pub mod literal;
pub mod model_parser;
pub mod scanner;
pub mod state;
pub mod transform;
pub mod view_parser;

pub use config::AnalyzerConfig;
pub use dataset::GraphDataset;
pub use error::{CoreError, CoreResult};
pub use scanner::{ModuleInfo, ModuleScanner};
pub use state::StateStore;
