//! Provider trait and the resource/data source registry
//!
//! A provider hands the server an explicit map from type name to factory.
//! The server builds a fresh instance per call and configures it with the
//! data returned from [`Provider::configure`].

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{ClientCapabilities, Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor registered for a resource type
pub type ResourceFactory = fn() -> Box<dyn ResourceWithConfigure>;

/// Constructor registered for a data source type
pub type DataSourceFactory = fn() -> Box<dyn DataSourceWithConfigure>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by all resource type names (e.g., "aws")
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse;

    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    /// Validates provider configuration and builds the shared provider data
    /// (API clients etc.) handed to every resource and data source
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderMetadataRequest;

pub struct ProviderMetadataResponse {
    pub type_name: String,
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
    pub client_capabilities: ClientCapabilities,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    /// Passed unchanged to every resource and data source `configure`
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}
