//! Generated types for Terraform plugin protocol 6
//!
//! Built from `proto/tfplugin6.proto` by `tonic_build`. Several messages share
//! names with framework types (`DynamicValue`, `Diagnostic`, `Schema`), so
//! refer to these through the `proto::` prefix.
//!
//! Per-RPC request and response messages live in snake_case modules, e.g.
//! `proto::read_resource::Request`.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};
