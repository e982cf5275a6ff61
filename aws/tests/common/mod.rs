//! Shared fixtures for provider integration tests

#![allow(dead_code)]

use aws::api::{Client, Endpoints, RetryConfig};
use aws::{AwsProvider, AwsProviderData};
use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{ConfigureDataSourceRequest, DataSourceWithConfigure};
use tfplug::provider::Provider;
use tfplug::resource::{ConfigureResourceRequest, ResourceWithConfigure};

pub const REGION: &str = "us-west-2";

/// Provider data whose client sends every service to `url` without retries
pub fn provider_data(url: &str) -> Arc<dyn Any + Send + Sync> {
    let endpoints = Endpoints {
        default: Some(url.to_string()),
        ..Default::default()
    };
    let retry_config = RetryConfig {
        max_retries: 0,
        timeout_seconds: 5,
        ..Default::default()
    };
    let client = Client::with_config(REGION, endpoints, false, retry_config)
        .expect("client should build");
    Arc::new(AwsProviderData::new(client))
}

pub async fn configured_resource(type_name: &str, url: &str) -> Box<dyn ResourceWithConfigure> {
    let factories = AwsProvider::new().resources();
    let factory = factories.get(type_name).expect("resource type is registered");
    let mut resource = factory();

    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(provider_data(url)),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

pub async fn configured_data_source(type_name: &str, url: &str) -> Box<dyn DataSourceWithConfigure> {
    let factories = AwsProvider::new().data_sources();
    let factory = factories.get(type_name).expect("data source type is registered");
    let mut data_source = factory();

    let response = data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(provider_data(url)),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    data_source
}

/// Body of a service error response
pub fn error_body(code: &str, message: &str) -> String {
    serde_json::json!({"__type": code, "message": message}).to_string()
}
