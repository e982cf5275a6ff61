pub mod api;
pub mod arn;
pub mod data_sources;
pub mod flex;
pub mod provider_data;
pub mod resources;

pub use provider_data::AwsProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

use api::{Client, Endpoints, RetryConfig, Service};

const ENV_REGION: &str = "AWS_REGION";
const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
const ENV_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";
const ENV_INSECURE: &str = "AWS_INSECURE";

const MAX_RETRIES_LIMIT: u32 = 25;

#[derive(Default)]
pub struct AwsProvider {
    provider_data: Option<AwsProviderData>,
}

impl AwsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_data(&self) -> Option<&AwsProviderData> {
        self.provider_data.as_ref()
    }
}

#[async_trait]
impl Provider for AwsProvider {
    fn type_name(&self) -> &str {
        "aws"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("AWS provider")
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("Region to manage resources in. Can also be set with AWS_REGION or AWS_DEFAULT_REGION.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Endpoint URL used for every service. Can also be set with AWS_ENDPOINT_URL.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoints", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Per-service endpoint URLs keyed by service (ec2, kms, networkmonitor, resourceexplorer2, ssoadmin)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .description("Retries for throttled or failed requests. Can also be set with AWS_MAX_ATTEMPTS.")
                    .optional()
                    .validator(NumberRangeValidator::between(0.0, f64::from(MAX_RETRIES_LIMIT)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification. Can also be set with AWS_INSECURE.")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];
        let config = &request.config;

        let region = config_string(config, "region")
            .or_else(|| env_var(ENV_REGION))
            .or_else(|| env_var(ENV_DEFAULT_REGION));

        let endpoints = match endpoints_from_config(config) {
            Ok(endpoints) => endpoints,
            Err(mut errors) => {
                diagnostics.append(&mut errors);
                Endpoints::default()
            }
        };

        let max_retries = match config.get_number_opt(&AttributePath::new("max_retries")) {
            Some(n) => Some((n as u32).min(MAX_RETRIES_LIMIT)),
            None => match env_var(ENV_MAX_ATTEMPTS).map(|v| v.parse::<u32>()) {
                Some(Ok(n)) if n <= MAX_RETRIES_LIMIT => Some(n),
                Some(Ok(n)) => {
                    diagnostics.push(Diagnostic::error(
                        format!("Invalid {} value", ENV_MAX_ATTEMPTS),
                        format!("{} exceeds the maximum of {}", n, MAX_RETRIES_LIMIT),
                    ));
                    None
                }
                Some(Err(e)) => {
                    diagnostics.push(Diagnostic::error(
                        format!("Invalid {} value", ENV_MAX_ATTEMPTS),
                        e.to_string(),
                    ));
                    None
                }
                None => None,
            },
        };

        let insecure = config
            .get_bool_opt(&AttributePath::new("insecure"))
            .or_else(|| env_var(ENV_INSECURE).and_then(|v| v.parse::<bool>().ok()))
            .unwrap_or(false);

        let Some(region) = region else {
            diagnostics.push(Diagnostic::error(
                "region is required (set in provider config or AWS_REGION env var)",
                "No region was configured for the AWS provider",
            ));
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        };

        if tfplug::types::has_errors(&diagnostics) {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }

        let retry_config = RetryConfig {
            max_retries: max_retries.unwrap_or(RetryConfig::default().max_retries),
            ..RetryConfig::default()
        };

        tracing::info!(
            region = %region,
            insecure,
            max_retries = retry_config.max_retries,
            "configuring AWS provider"
        );

        match Client::with_config(&region, endpoints, insecure, retry_config) {
            Ok(client) => {
                let provider_data = AwsProviderData::new(client);
                self.provider_data = Some(provider_data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(provider_data)),
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "aws_kms_replica_key".to_string(),
            resources::ReplicaKeyResource::factory,
        );
        factories.insert(
            "aws_networkmonitor_monitor".to_string(),
            resources::MonitorResource::factory,
        );
        factories.insert(
            "aws_resourceexplorer2_index".to_string(),
            resources::IndexResource::factory,
        );
        factories.insert(
            "aws_ssoadmin_application_assignment".to_string(),
            resources::ApplicationAssignmentResource::factory,
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "aws_prefix_list".to_string(),
            data_sources::PrefixListDataSource::factory,
        );
        factories
    }
}

/// Unset and empty environment variables are treated alike
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn config_string(config: &DynamicValue, name: &str) -> Option<String> {
    config
        .get_string_opt(&AttributePath::new(name))
        .filter(|v| !v.is_empty())
}

fn validate_url(url: &str, path: AttributePath) -> Result<String, Diagnostic> {
    url::Url::parse(url)
        .map(|_| url.to_string())
        .map_err(|e| {
            Diagnostic::error(format!("Invalid endpoint URL: {}", url), e.to_string())
                .with_attribute(path)
        })
}

fn endpoints_from_config(config: &DynamicValue) -> Result<Endpoints, Vec<Diagnostic>> {
    let mut endpoints = Endpoints::default();
    let mut errors = vec![];

    if let Some(url) = config_string(config, "endpoint").or_else(|| env_var(ENV_ENDPOINT_URL)) {
        match validate_url(&url, AttributePath::new("endpoint")) {
            Ok(url) => endpoints.default = Some(url),
            Err(e) => errors.push(e),
        }
    }

    if let Ok(overrides) = config.get_map(&AttributePath::new("endpoints")) {
        for (key, value) in overrides {
            let path = AttributePath::new("endpoints").key(&key);
            if !Service::ALL.iter().any(|s| s.key() == key) {
                errors.push(
                    Diagnostic::error(
                        format!("Unsupported endpoints key: {}", key),
                        "Supported keys are ec2, kms, networkmonitor, resourceexplorer2 and ssoadmin",
                    )
                    .with_attribute(path),
                );
                continue;
            }
            let Some(url) = value.as_str().filter(|u| !u.is_empty()) else {
                continue;
            };
            match validate_url(url, path) {
                Ok(url) => {
                    endpoints.services.insert(key, url);
                }
                Err(e) => errors.push(e),
            }
        }
    }

    if errors.is_empty() {
        Ok(endpoints)
    } else {
        Err(errors)
    }
}
