//! Unit and integration tests for the protez-admin backend.
//!
//! ## Test Modules
//!
//! - **support**: in-memory database, state and request helpers shared by the others
//! - **hierarchy_tests**: forest construction and post-order descendant walks
//! - **guard_tests**: re-parenting cycle checks
//! - **resolver_tests**: display values per input type
//! - **aggregate_tests**: group and section folds
//! - **cascade_tests**: guarded and forced group deletion
//! - **cache_tests** / **gate_tests**: response cache and storage gate
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error to status/code mapping
//! - **db_tests**: schema initialization and inspection
//! - **health_api_tests**: health, metrics and version endpoints
//! - **characteristics_api_tests**: groups, values, templates and product characteristics
//! - **catalog_api_tests**: categories, manufacturers, model lines, products, media,
//!   orders, site settings and export
//! - **storefront_api_tests**: product variants, warehouse settings, catalog menu and
//!   catalog files
//!
//! Individual modules can be run with `cargo test cascade_tests` and so on.

pub mod support;

pub mod characteristics_api_tests;
pub mod config_tests;
pub mod guard_tests;
pub mod health_api_tests;
pub mod hierarchy_tests;
pub mod storefront_api_tests;
