//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust: the resource, data
//! source and provider traits, the schema system, an in-process server that
//! drives plan/apply/refresh/import, the gRPC plugin transport Terraform
//! talks to, and the state poller resources use to wait for remote objects
//! to settle.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod plan_modifier;
pub mod retry;
pub mod validator;

// Framework implementation modules
pub mod grpc;
pub mod logging;
pub mod proto;
pub mod server;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use grpc::PluginServer;
pub use import::import_state_passthrough_id;
pub use logging::{init_logging, try_init_logging};
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure};
pub use retry::{retry_when, RefreshError, RetryError, StateChangeConf, WaitError};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use server::ProviderServer;
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
