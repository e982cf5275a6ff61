//! Resource Explorer index resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
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
use tfplug::validator::OneOfValidator;

use crate::api::resourceexplorer2::{
    Index, ResourceExplorer2Api, INDEX_STATE_ACTIVE, INDEX_STATE_CREATING, INDEX_STATE_DELETED,
    INDEX_STATE_DELETING, INDEX_STATE_UPDATING, INDEX_TYPE_AGGREGATOR, INDEX_TYPE_LOCAL,
};
use crate::api::ApiError;
use crate::flex;
use crate::provider_data::{not_configured, AwsProviderData};

const RESOURCE_NAME: &str = "Resource Explorer Index";
const INDEX_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Default)]
pub struct IndexResource {
    provider_data: Option<AwsProviderData>,
}

impl IndexResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn ResourceWithConfigure> {
        Box::new(Self::new())
    }
}

#[async_trait]
impl Resource for IndexResource {
    fn type_name(&self) -> &str {
        "aws_resourceexplorer2_index"
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
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Turns on Resource Explorer in the provider's region by creating an index")
            .attribute(
                AttributeBuilder::new("arn", AttributeType::String)
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
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("LOCAL or AGGREGATOR")
                    .required()
                    .validator(OneOfValidator::strings(&[INDEX_TYPE_LOCAL, INDEX_TYPE_AGGREGATOR]))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![not_configured()],
            };
        };

        let index_type = request
            .planned_state
            .get_string_opt(&AttributePath::new("type"))
            .unwrap_or_else(|| INDEX_TYPE_LOCAL.to_string());

        let api = provider_data.client.resourceexplorer2();
        let created = match api.create_index(&flex::client_token()).await {
            Ok(created) => created,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        format!("creating {}", RESOURCE_NAME),
                        e.to_string(),
                    )],
                }
            }
        };
        let arn = created.arn;

        // Partial state so a failed wait still records the index
        let mut partial = request.planned_state.clone();
        let _ = partial.set_string(&AttributePath::new("arn"), arn.clone());
        let _ = partial.set_string(&AttributePath::new("id"), arn.clone());

        let mut index = match wait_index(
            &ctx,
            &api,
            [INDEX_STATE_CREATING],
            [INDEX_STATE_ACTIVE],
        )
        .await
        {
            Ok(Some(index)) => index,
            result => {
                return CreateResourceResponse {
                    new_state: partial,
                    diagnostics: vec![wait_diagnostic(&arn, "create", result.err())],
                }
            }
        };

        if index_type == INDEX_TYPE_AGGREGATOR {
            match self.change_type(&ctx, &api, &arn, &index_type).await {
                Ok(updated) => index = updated,
                Err(diagnostic) => {
                    return CreateResourceResponse {
                        new_state: partial,
                        diagnostics: vec![diagnostic],
                    }
                }
            }
        }

        tracing::info!(arn = %arn, index_type = %index.index_type, "created index");
        CreateResourceResponse {
            new_state: index_state(&arn, &index),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let id = request
            .current_state
            .get_string_opt(&AttributePath::new("id"))
            .unwrap_or_default();

        let api = provider_data.client.resourceexplorer2();
        match find_index(&api).await {
            Ok(index) => {
                let arn = if index.arn.is_empty() { id } else { index.arn.clone() };
                ReadResourceResponse {
                    new_state: Some(index_state(&arn, &index)),
                    diagnostics: vec![],
                }
            }
            Err(RefreshError::NotFound) => {
                tracing::warn!(id = %id, "{} not found, removing from state", RESOURCE_NAME);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![Diagnostic::warning(
                        "Resource not found",
                        format!("{} ({}) not found, removing from state", RESOURCE_NAME, id),
                    )],
                }
            }
            Err(RefreshError::Other(e)) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    format!("reading {} ({})", RESOURCE_NAME, id),
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

        let type_path = AttributePath::new("type");
        let prior_type = request.prior_state.get_string_opt(&type_path);
        let index_type = match request.planned_state.get_string_opt(&type_path) {
            Some(planned) if Some(&planned) != prior_type.as_ref() => planned,
            _ => {
                return UpdateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![],
                }
            }
        };

        let arn = request
            .prior_state
            .get_string_opt(&AttributePath::new("arn"))
            .or_else(|| request.prior_state.get_string_opt(&AttributePath::new("id")))
            .unwrap_or_default();

        let api = provider_data.client.resourceexplorer2();
        match self.change_type(&ctx, &api, &arn, &index_type).await {
            Ok(index) => UpdateResourceResponse {
                new_state: index_state(&arn, &index),
                diagnostics: vec![],
            },
            Err(diagnostic) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![diagnostic],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let arn = request
            .prior_state
            .get_string_opt(&AttributePath::new("arn"))
            .or_else(|| request.prior_state.get_string_opt(&AttributePath::new("id")))
            .unwrap_or_default();

        let api = provider_data.client.resourceexplorer2();
        tracing::debug!(arn = %arn, "deleting index");
        match api.delete_index(&arn).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![Diagnostic::error(
                        format!("deleting {} ({})", RESOURCE_NAME, arn),
                        e.to_string(),
                    )],
                }
            }
        }

        let diagnostics = match wait_index(&ctx, &api, [INDEX_STATE_DELETING], Vec::<String>::new()).await {
            Ok(_) => vec![],
            Err(e) => vec![wait_diagnostic(&arn, "delete", Some(e))],
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
            let _ = imported
                .state
                .set_string(&AttributePath::new("arn"), request.id.clone());
        }

        response
    }
}

#[async_trait]
impl ResourceWithConfigure for IndexResource {
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

impl IndexResource {
    async fn change_type(
        &self,
        ctx: &Context,
        api: &ResourceExplorer2Api<'_>,
        arn: &str,
        index_type: &str,
    ) -> Result<Index, Diagnostic> {
        api.update_index_type(arn, index_type).await.map_err(|e| {
            Diagnostic::error(
                format!("updating {} ({}) type to {}", RESOURCE_NAME, arn, index_type),
                e.to_string(),
            )
        })?;

        match wait_index(ctx, api, [INDEX_STATE_UPDATING], [INDEX_STATE_ACTIVE]).await {
            Ok(Some(index)) => Ok(index),
            result => Err(wait_diagnostic(arn, "update", result.err())),
        }
    }
}

fn index_state(arn: &str, index: &Index) -> DynamicValue {
    let mut state = DynamicValue::object();
    let _ = state.set_string(&AttributePath::new("arn"), arn.to_string());
    let _ = state.set_string(&AttributePath::new("id"), arn.to_string());
    let _ = state.set_string(&AttributePath::new("type"), index.index_type.clone());
    state
}

fn wait_diagnostic(arn: &str, action: &str, err: Option<WaitError<Index>>) -> Diagnostic {
    let detail = match err {
        Some(e) => e.to_string(),
        None => "index not found".to_string(),
    };
    Diagnostic::error(
        format!("waiting for {} ({}) {}", RESOURCE_NAME, arn, action),
        detail,
    )
}

/// A `DELETED` index is reported as absent
async fn find_index(api: &ResourceExplorer2Api<'_>) -> Result<Index, RefreshError<ApiError>> {
    match api.get_index().await {
        Ok(index) if index.state == INDEX_STATE_DELETED => Err(RefreshError::NotFound),
        Ok(index) => Ok(index),
        Err(e) if e.is_not_found() => Err(RefreshError::NotFound),
        Err(e) => Err(RefreshError::Other(e)),
    }
}

async fn status_index(
    api: &ResourceExplorer2Api<'_>,
) -> Result<(Index, String), RefreshError<ApiError>> {
    let index = find_index(api).await?;
    let state = index.state.clone();
    Ok((index, state))
}

async fn wait_index<P, Q>(
    ctx: &Context,
    api: &ResourceExplorer2Api<'_>,
    pending: P,
    target: Q,
) -> Result<Option<Index>, WaitError<Index>>
where
    P: IntoIterator,
    P::Item: Into<String>,
    Q: IntoIterator,
    Q::Item: Into<String>,
{
    StateChangeConf::new(pending, target)
        .timeout(INDEX_TIMEOUT)
        .wait_for_state(ctx, || status_index(api))
        .await
}
