//! # Protez Admin Backend Library
//!
//! Core library for the admin backend of a prosthetics product catalog. It exposes a REST
//! API over a SQLite schema of products, categories, manufacturers, model lines, orders,
//! media records and site settings, with product characteristics stored EAV-style.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: Modern web framework for HTTP server and routing
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime for concurrent operations
//! - **Serde**: Serialization/deserialization for JSON APIs
//!
//! ## Core Components
//!
//! - [`characteristics`]: hierarchy builder, re-parenting guard, value resolver,
//!   section aggregation and cascading group deletion
//! - [`cache`]: TTL + LRU response cache with glob invalidation
//! - [`config`]: Application configuration management
//! - [`db`]: Database schema initialization and inspection
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`gate`]: bounded gate for batch storage calls
//! - [`metrics`]: Application usage counters
//! - [`middleware`]: HTTP middleware for request validation and security headers
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and shared type definitions

pub mod cache;
pub mod characteristics;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
