//! CloudWatch Network Monitor monitor resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::retry::{RefreshError, StateChangeConf, WaitError};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{OneOfValidator, StringLengthValidator, StringPatternValidator};

use crate::api::networkmonitor::{
    CreateMonitorRequest, Monitor, NetworkMonitorApi, UpdateMonitorRequest,
    MONITOR_STATE_ACTIVE, MONITOR_STATE_DELETING, MONITOR_STATE_INACTIVE, MONITOR_STATE_PENDING,
};
use crate::api::ApiError;
use crate::flex;
use crate::provider_data::{not_configured, AwsProviderData};

const RESOURCE_NAME: &str = "CloudWatch Network Monitor Monitor";
const MONITOR_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MONITOR_MIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct MonitorResource {
    provider_data: Option<AwsProviderData>,
}

impl MonitorResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn ResourceWithConfigure> {
        Box::new(Self::new())
    }
}

#[async_trait]
impl Resource for MonitorResource {
    fn type_name(&self) -> &str {
        "aws_networkmonitor_monitor"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut diagnostics = vec![];

        let mut monitor_name = AttributeBuilder::new("monitor_name", AttributeType::String)
            .description("The name of the monitor")
            .required()
            .plan_modifier(RequiresReplace::create())
            .validator(StringLengthValidator::between(1, 255));
        match StringPatternValidator::create(
            "[a-zA-Z0-9_-]+",
            "must contain only letters, digits, underscores and hyphens",
        ) {
            Ok(validator) => monitor_name = monitor_name.validator(validator),
            Err(e) => diagnostics.push(Diagnostic::error("Invalid schema", e.to_string())),
        }

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a CloudWatch Network Monitor monitor")
            .attribute(
                AttributeBuilder::new("aggregation_period", AttributeType::Number)
                    .description("Time, in seconds, that metrics are aggregated and sent to CloudWatch (30 or 60)")
                    .optional()
                    .computed()
                    .validator(OneOfValidator::numbers(&[30.0, 60.0]))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arn", AttributeType::String)
                    .description("The ARN of the monitor")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(monitor_name.build())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics,
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![not_configured()],
            };
        };

        let name = match request
            .planned_state
            .get_string(&AttributePath::new("monitor_name"))
        {
            Ok(name) => name,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error("Missing monitor_name", e.to_string())],
                }
            }
        };

        let input = CreateMonitorRequest {
            monitor_name: name.clone(),
            aggregation_period: request
                .planned_state
                .get_number_opt(&AttributePath::new("aggregation_period"))
                .map(|p| p as i64),
            client_token: flex::client_token(),
        };

        let api = provider_data.client.networkmonitor();
        if let Err(e) = api.create_monitor(&input).await {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error(
                    format!("creating {} ({})", RESOURCE_NAME, name),
                    e.to_string(),
                )],
            };
        }

        match wait_monitor_ready(&ctx, &api, &name).await {
            Ok(Some(monitor)) => {
                tracing::info!(monitor_name = %name, state = %monitor.state, "created monitor");
                CreateResourceResponse {
                    new_state: monitor_state(&monitor),
                    diagnostics: vec![],
                }
            }
            result => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![wait_diagnostic(&name, "create", result.err())],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let Some(name) = monitor_name_from_state(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            };
        };

        match provider_data.client.networkmonitor().get_monitor(&name).await {
            Ok(monitor) => ReadResourceResponse {
                new_state: Some(monitor_state(&monitor)),
                diagnostics: vec![],
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!(monitor_name = %name, "{} not found, removing from state", RESOURCE_NAME);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![Diagnostic::warning(
                        "Resource not found",
                        format!("{} ({}) not found, removing from state", RESOURCE_NAME, name),
                    )],
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    format!("reading {} ({})", RESOURCE_NAME, name),
                    e.to_string(),
                )],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let path = AttributePath::new("aggregation_period");
        let planned_period = request.planned_state.get_number_opt(&path);
        if planned_period == request.prior_state.get_number_opt(&path) {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            };
        }

        let Some(name) = monitor_name_from_state(&request.prior_state) else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    format!("updating {}", RESOURCE_NAME),
                    "monitor_name is missing from state",
                )],
            };
        };

        let Some(period) = planned_period else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            };
        };

        let api = provider_data.client.networkmonitor();
        let input = UpdateMonitorRequest {
            aggregation_period: period as i64,
        };
        if let Err(e) = api.update_monitor(&name, &input).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    format!("updating {} ({})", RESOURCE_NAME, name),
                    e.to_string(),
                )],
            };
        }

        match wait_monitor_ready(&ctx, &api, &name).await {
            Ok(Some(monitor)) => UpdateResourceResponse {
                new_state: monitor_state(&monitor),
                diagnostics: vec![],
            },
            result => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![wait_diagnostic(&name, "update", result.err())],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let Some(name) = monitor_name_from_state(&request.prior_state) else {
            return DeleteResourceResponse {
                diagnostics: vec![],
            };
        };

        let api = provider_data.client.networkmonitor();
        tracing::debug!(monitor_name = %name, "deleting monitor");
        match api.delete_monitor(&name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![Diagnostic::error(
                        format!("deleting {} ({})", RESOURCE_NAME, name),
                        e.to_string(),
                    )],
                }
            }
        }

        let diagnostics = match wait_monitor_deleted(&ctx, &api, &name).await {
            Ok(_) => vec![],
            Err(e) => vec![wait_diagnostic(&name, "delete", Some(e))],
        };

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);

        for imported in &mut response.imported_resources {
            if let Err(e) = imported
                .state
                .set_string(&AttributePath::new("monitor_name"), request.id.clone())
            {
                response.diagnostics.push(Diagnostic::error(
                    format!("importing {} ({})", RESOURCE_NAME, request.id),
                    e.to_string(),
                ));
            }
        }

        response
    }
}

#[async_trait]
impl ResourceWithConfigure for MonitorResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let (provider_data, diagnostics) = AwsProviderData::from_configure(request.provider_data);
        self.provider_data = provider_data;
        ConfigureResourceResponse { diagnostics }
    }
}

/// `monitor_name`, falling back to `id`
fn monitor_name_from_state(state: &DynamicValue) -> Option<String> {
    state
        .get_string_opt(&AttributePath::new("monitor_name"))
        .or_else(|| state.get_string_opt(&AttributePath::new("id")))
        .filter(|name| !name.is_empty())
}

fn monitor_state(monitor: &Monitor) -> DynamicValue {
    let mut state = DynamicValue::object();
    let _ = state.set_string(&AttributePath::new("arn"), monitor.monitor_arn.clone());
    let _ = state.set_string(&AttributePath::new("id"), monitor.monitor_name.clone());
    let _ = state.set_string(
        &AttributePath::new("monitor_name"),
        monitor.monitor_name.clone(),
    );
    match monitor.aggregation_period {
        Some(period) => {
            let _ = state.set_number(&AttributePath::new("aggregation_period"), period as f64);
        }
        None => {
            let _ = state.set_null(&AttributePath::new("aggregation_period"));
        }
    }
    state
}

fn wait_diagnostic(name: &str, action: &str, err: Option<WaitError<Monitor>>) -> Diagnostic {
    let detail = match err {
        Some(e) => e.to_string(),
        None => "monitor not found".to_string(),
    };
    Diagnostic::error(
        format!("waiting for {} ({}) {}", RESOURCE_NAME, name, action),
        detail,
    )
}

async fn status_monitor(
    api: &NetworkMonitorApi<'_>,
    name: &str,
) -> Result<(Monitor, String), RefreshError<ApiError>> {
    match api.get_monitor(name).await {
        Ok(monitor) => {
            let state = monitor.state.clone();
            Ok((monitor, state))
        }
        Err(e) if e.is_not_found() => Err(RefreshError::NotFound),
        Err(e) => Err(RefreshError::Other(e)),
    }
}

async fn wait_monitor_ready(
    ctx: &Context,
    api: &NetworkMonitorApi<'_>,
    name: &str,
) -> Result<Option<Monitor>, WaitError<Monitor>> {
    StateChangeConf::new(
        [MONITOR_STATE_PENDING],
        [MONITOR_STATE_ACTIVE, MONITOR_STATE_INACTIVE],
    )
    .timeout(MONITOR_TIMEOUT)
    .min_timeout(MONITOR_MIN_TIMEOUT)
    .wait_for_state(ctx, || status_monitor(api, name))
    .await
}

async fn wait_monitor_deleted(
    ctx: &Context,
    api: &NetworkMonitorApi<'_>,
    name: &str,
) -> Result<Option<Monitor>, WaitError<Monitor>> {
    StateChangeConf::new(
        [
            MONITOR_STATE_DELETING,
            MONITOR_STATE_ACTIVE,
            MONITOR_STATE_INACTIVE,
        ],
        Vec::<String>::new(),
    )
    .timeout(MONITOR_TIMEOUT)
    .min_timeout(MONITOR_MIN_TIMEOUT)
    .wait_for_state(ctx, || status_monitor(api, name))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_built_from_monitor() {
        let monitor = Monitor {
            monitor_arn: "arn:aws:networkmonitor:us-west-2:123456789012:monitor/m1".to_string(),
            monitor_name: "m1".to_string(),
            state: MONITOR_STATE_ACTIVE.to_string(),
            aggregation_period: Some(60),
        };

        let state = monitor_state(&monitor);
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "m1");
        assert_eq!(state.get_string(&AttributePath::new("monitor_name")).unwrap(), "m1");
        assert_eq!(
            state.get_number(&AttributePath::new("aggregation_period")).unwrap(),
            60.0
        );
    }

    #[test]
    fn name_falls_back_to_id() {
        let state = DynamicValue::from_json(serde_json::json!({"id": "imported"}));
        assert_eq!(monitor_name_from_state(&state).as_deref(), Some("imported"));
        assert_eq!(monitor_name_from_state(&DynamicValue::object()), None);
    }
}
