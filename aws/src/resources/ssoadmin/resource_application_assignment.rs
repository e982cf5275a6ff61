//! IAM Identity Center application assignment resource

use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::OneOfValidator;

use crate::api::ssoadmin::ApplicationAssignment;
use crate::arn::ArnValidator;
use crate::flex;
use crate::provider_data::{not_configured, AwsProviderData};

const RESOURCE_NAME: &str = "SSO Application Assignment";
const ID_PARTS: usize = 3;

#[derive(Default)]
pub struct ApplicationAssignmentResource {
    provider_data: Option<AwsProviderData>,
}

impl ApplicationAssignmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn ResourceWithConfigure> {
        Box::new(Self::new())
    }
}

#[async_trait]
impl Resource for ApplicationAssignmentResource {
    fn type_name(&self) -> &str {
        "aws_ssoadmin_application_assignment"
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
            .description("Assigns a user or group to an IAM Identity Center application")
            .attribute(
                AttributeBuilder::new("application_arn", AttributeType::String)
                    .required()
                    .validator(ArnValidator::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("principal_id", AttributeType::String)
                    .description("Identifier of the user or group in the identity store")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("principal_type", AttributeType::String)
                    .required()
                    .validator(OneOfValidator::strings(&["USER", "GROUP"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![not_configured()],
            };
        };

        let assignment = match assignment_from_state(&request.planned_state) {
            Ok(assignment) => assignment,
            Err(diagnostic) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diagnostic],
                }
            }
        };

        let id = match assignment_id(&assignment) {
            Ok(id) => id,
            Err(diagnostic) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diagnostic],
                }
            }
        };

        if let Err(e) = provider_data
            .client
            .ssoadmin()
            .create_application_assignment(&assignment)
            .await
        {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error(
                    format!("creating {} ({})", RESOURCE_NAME, id),
                    e.to_string(),
                )],
            };
        }

        tracing::info!(id = %id, "created application assignment");
        let mut new_state = request.planned_state;
        let _ = new_state.set_string(&AttributePath::new("id"), id);

        CreateResourceResponse {
            new_state,
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
        let parts = match flex::expand_resource_id(&id, ID_PARTS, false) {
            Ok(parts) => parts,
            Err(e) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![Diagnostic::error(
                        format!("reading {} ({})", RESOURCE_NAME, id),
                        e.to_string(),
                    )
                    .with_attribute(AttributePath::new("id"))],
                }
            }
        };

        let query = ApplicationAssignment {
            application_arn: parts[0].clone(),
            principal_id: parts[1].clone(),
            principal_type: parts[2].clone(),
        };

        match provider_data
            .client
            .ssoadmin()
            .describe_application_assignment(&query)
            .await
        {
            Ok(found) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(&AttributePath::new("id"), id);
                let _ = state.set_string(&AttributePath::new("application_arn"), found.application_arn);
                let _ = state.set_string(&AttributePath::new("principal_id"), found.principal_id);
                let _ = state.set_string(&AttributePath::new("principal_type"), found.principal_type);
                ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: vec![],
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "{} not found, removing from state", RESOURCE_NAME);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![Diagnostic::warning(
                        "Resource not found",
                        format!("{} ({}) not found, removing from state", RESOURCE_NAME, id),
                    )],
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    format!("reading {} ({})", RESOURCE_NAME, id),
                    e.to_string(),
                )],
            },
        }
    }

    /// Every attribute forces replacement
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let assignment = match assignment_from_state(&request.prior_state) {
            Ok(assignment) => assignment,
            Err(diagnostic) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diagnostic],
                }
            }
        };

        match provider_data
            .client
            .ssoadmin()
            .delete_application_assignment(&assignment)
            .await
        {
            Ok(()) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) if e.is_not_found() => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![Diagnostic::error(
                    format!(
                        "deleting {} ({})",
                        RESOURCE_NAME,
                        assignment_id(&assignment).unwrap_or_default()
                    ),
                    e.to_string(),
                )],
            },
        }
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

        if let Err(e) = flex::expand_resource_id(&request.id, ID_PARTS, false) {
            response.diagnostics.push(Diagnostic::error(
                format!("importing {} ({})", RESOURCE_NAME, request.id),
                e.to_string(),
            ));
            return response;
        }

        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for ApplicationAssignmentResource {
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

fn assignment_from_state(state: &DynamicValue) -> Result<ApplicationAssignment, Diagnostic> {
    let get = |name: &str| {
        state
            .get_string(&AttributePath::new(name))
            .map_err(|e| Diagnostic::error(format!("Missing {}", name), e.to_string()))
    };

    Ok(ApplicationAssignment {
        application_arn: get("application_arn")?,
        principal_id: get("principal_id")?,
        principal_type: get("principal_type")?,
    })
}

fn assignment_id(assignment: &ApplicationAssignment) -> Result<String, Diagnostic> {
    flex::flatten_resource_id(
        &[
            assignment.application_arn.as_str(),
            assignment.principal_id.as_str(),
            assignment.principal_type.as_str(),
        ],
        false,
    )
    .map_err(|e| Diagnostic::error(format!("flattening {} ID", RESOURCE_NAME), e.to_string()))
}
