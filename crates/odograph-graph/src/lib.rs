//! # Odograph Graph - Load
//!
//! The load side of the odograph ETL: the property-graph schema, the narrow
//! store contract the loader writes through, an in-process store, and the
//! phased batched loader itself.
//!
//! ## Overview
//!
//! The loader materializes a [`odograph_core::GraphDataset`] in two strict
//! phases - all nodes, then all relationships - with identity-keyed upserts
//! throughout, so re-loading the same dataset is a no-op and forward
//! references close themselves as placeholder nodes. Writes go through the
//! [`store::GraphStore`] contract; the Bolt driver that talks to a real
//! Neo4j server is a deployment concern and implements the same contract by
//! rendering the statements in [`cypher`].
//!
//! ## Example
//!
//! ```rust
//! use odograph_graph::loader::GraphLoader;
//! use odograph_graph::memory::MemoryGraph;
//! use odograph_core::GraphDataset;
//!
//! let mut loader = GraphLoader::new(MemoryGraph::in_memory(), 1000);
//! loader.ensure_schema();
//! let metrics = loader.load(&GraphDataset::default()).unwrap();
//! assert_eq!(metrics.errors, 0);
//! ```

pub mod cypher;
pub mod loader;
pub mod memory;
pub mod schema;
pub mod store;

pub use loader::{GraphLoader, GraphStats, LoadMetrics};
pub use memory::MemoryGraph;
pub use schema::{NodeLabel, RelType};
pub use store::{connect, GraphConfig, GraphError, GraphResult, GraphStore};
