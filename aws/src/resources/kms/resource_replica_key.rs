//! KMS multi-Region replica key resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::retry::{retry_when, RefreshError, StateChangeConf, WaitError};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringLengthValidator};

use crate::api::kms::{
    KeyMetadata, KmsApi, ReplicateKeyRequest, KEY_MANAGER_CUSTOMER, KEY_STATE_CREATING,
    KEY_STATE_DISABLED, KEY_STATE_ENABLED, KEY_STATE_PENDING_DELETION,
    MULTI_REGION_KEY_TYPE_REPLICA, ORIGIN_AWS_KMS,
};
use crate::api::ApiError;
use crate::arn::{Arn, ArnValidator};
use crate::flex::{self, JsonValidator};
use crate::provider_data::{not_configured, AwsProviderData};

const RESOURCE_NAME: &str = "KMS Replica Key";

const KEY_CREATED_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const KEY_DELETED_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const PROPAGATION_CHECKS: u32 = 5;
const ERR_CODE_MALFORMED_POLICY_DOCUMENT: &str = "MalformedPolicyDocumentException";
const ERR_CODE_KMS_INVALID_STATE: &str = "KMSInvalidStateException";

#[derive(Default)]
pub struct ReplicaKeyResource {
    provider_data: Option<AwsProviderData>,
}

impl ReplicaKeyResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn ResourceWithConfigure> {
        Box::new(Self::new())
    }
}

/// Everything read back for a key in one refresh
#[derive(Debug, Clone)]
struct KeyInfo {
    metadata: KeyMetadata,
    policy: String,
    rotation_enabled: bool,
}

#[async_trait]
impl Resource for ReplicaKeyResource {
    fn type_name(&self) -> &str {
        "aws_kms_replica_key"
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
        let computed = |name: &str, type_: AttributeType| {
            AttributeBuilder::new(name, type_)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a KMS multi-Region replica key")
            .attribute(computed("arn", AttributeType::String))
            .attribute(
                AttributeBuilder::new("bypass_policy_lockout_safety_check", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("deletion_window_in_days", AttributeType::Number)
                    .description("Waiting period, in days, before the replica key is deleted")
                    .optional()
                    .computed()
                    .default(StaticDefault::number(30.0))
                    .validator(NumberRangeValidator::between(7.0, 30.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .validator(StringLengthValidator::between(0, 8192))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(computed("id", AttributeType::String))
            .attribute(computed("key_id", AttributeType::String))
            .attribute(computed("key_rotation_enabled", AttributeType::Bool))
            .attribute(computed("key_spec", AttributeType::String))
            .attribute(computed("key_usage", AttributeType::String))
            .attribute(
                AttributeBuilder::new("policy", AttributeType::String)
                    .description("Key policy as a JSON document")
                    .optional()
                    .computed()
                    .validator(JsonValidator::create())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primary_key_arn", AttributeType::String)
                    .description("ARN of the multi-Region primary key to replicate")
                    .required()
                    .validator(ArnValidator::create())
                    .plan_modifier(RequiresReplace::create())
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

        let mut partial = request.planned_state.clone();
        match self
            .create_replica(&ctx, provider_data, &request.planned_state, &mut partial)
            .await
        {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diagnostic) => CreateResourceResponse {
                new_state: partial,
                diagnostics: vec![diagnostic],
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

        let Some(key_id) = request.current_state.get_string_opt(&AttributePath::new("id")) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            };
        };

        let api = provider_data.client.kms();
        match find_key_info(&api, &key_id).await {
            Ok(info) => match key_state(&key_id, &info, &request.current_state) {
                Ok(state) => ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: vec![],
                },
                Err(diagnostic) => ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diagnostic],
                },
            },
            Err(RefreshError::NotFound) => {
                tracing::warn!(key_id = %key_id, "{} not found, removing from state", RESOURCE_NAME);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![Diagnostic::warning(
                        "Resource not found",
                        format!("{} ({}) not found, removing from state", RESOURCE_NAME, key_id),
                    )],
                }
            }
            Err(RefreshError::Other(e)) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    format!("reading {} ({})", RESOURCE_NAME, key_id),
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

        match self
            .update_replica(&ctx, provider_data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
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

        let Some(key_id) = request.prior_state.get_string_opt(&AttributePath::new("id")) else {
            return DeleteResourceResponse {
                diagnostics: vec![],
            };
        };

        let window = request
            .prior_state
            .get_number_opt(&AttributePath::new("deletion_window_in_days"))
            .map(|days| days as i64);

        let api = provider_data.client.kms();
        tracing::debug!(key_id = %key_id, ?window, "scheduling replica key deletion");
        match api.schedule_key_deletion(&key_id, window).await {
            Ok(()) => {}
            Err(e)
                if e.is_not_found()
                    || e.is_code_with_message(ERR_CODE_KMS_INVALID_STATE, "is pending deletion") =>
            {
                return DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![Diagnostic::error(
                        format!("deleting {} ({})", RESOURCE_NAME, key_id),
                        e.to_string(),
                    )],
                }
            }
        }

        let result = StateChangeConf::new(
            [KEY_STATE_ENABLED, KEY_STATE_DISABLED],
            Vec::<String>::new(),
        )
        .timeout(KEY_DELETED_TIMEOUT)
        .wait_for_state(&ctx, || status_key_state(&api, &key_id))
        .await;

        let diagnostics = match result {
            Ok(_) => vec![],
            Err(e) => vec![Diagnostic::error(
                format!("waiting for {} ({}) delete", RESOURCE_NAME, key_id),
                e.to_string(),
            )],
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
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for ReplicaKeyResource {
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

impl ReplicaKeyResource {
    async fn create_replica(
        &self,
        ctx: &Context,
        provider_data: &AwsProviderData,
        plan: &DynamicValue,
        partial: &mut DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let primary_key_arn = plan
            .get_string(&AttributePath::new("primary_key_arn"))
            .map_err(|e| Diagnostic::error("Missing primary_key_arn", e.to_string()))?;
        let primary = Arn::parse(&primary_key_arn).map_err(|e| {
            Diagnostic::error("parsing primary key ARN", e.to_string())
                .with_attribute(AttributePath::new("primary_key_arn"))
        })?;

        let description = plan.get_string_opt(&AttributePath::new("description"));
        let policy = plan
            .get_string_opt(&AttributePath::new("policy"))
            .filter(|p| !p.is_empty());
        let bypass = plan
            .get_bool_opt(&AttributePath::new("bypass_policy_lockout_safety_check"))
            .unwrap_or(false);
        let enabled = plan
            .get_bool_opt(&AttributePath::new("enabled"))
            .unwrap_or(true);

        let client = &provider_data.client;
        let input = ReplicateKeyRequest {
            key_id: primary_key_arn.clone(),
            replica_region: client.region().to_string(),
            description: description.clone(),
            policy: policy.clone(),
            bypass_policy_lockout_safety_check: bypass,
        };

        // The primary key's region owns the replication call
        let api = client.kms();
        let output = retry_when(
            ctx,
            PROPAGATION_TIMEOUT,
            || api.replicate_key(&primary.region, &input),
            |e: &ApiError| e.is_code(ERR_CODE_MALFORMED_POLICY_DOCUMENT),
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                format!("creating {} ({})", RESOURCE_NAME, primary_key_arn),
                e.to_string(),
            )
        })?;

        let key_id = output.replica_key_metadata.key_id;
        tracing::info!(key_id = %key_id, primary_region = %primary.region, "replicated key");

        // From here on a failure still records the replica
        let _ = partial.set_string(&AttributePath::new("id"), key_id.clone());
        let _ = partial.set_string(&AttributePath::new("key_id"), key_id.clone());
        let _ = partial.set_string(&AttributePath::new("arn"), output.replica_key_metadata.arn);

        StateChangeConf::new([KEY_STATE_CREATING], [KEY_STATE_ENABLED])
            .timeout(KEY_CREATED_TIMEOUT)
            .wait_for_state(ctx, || status_key_state(&api, &key_id))
            .await
            .map_err(|e| wait_error(&key_id, "create", e))?;

        if !enabled {
            api.disable_key(&key_id)
                .await
                .map_err(|e| step_error("disabling", &key_id, e))?;
            wait_enabled_propagated(ctx, &api, &key_id, false)
                .await
                .map_err(|e| wait_error(&key_id, "disable propagation", e))?;
        }

        if let Some(policy) = &policy {
            wait_policy_propagated(ctx, &api, &key_id, policy)
                .await
                .map_err(|e| wait_error(&key_id, "policy propagation", e))?;
        }

        // New keys can take a moment to become readable in the replica region
        let info = retry_when(
            ctx,
            PROPAGATION_TIMEOUT,
            || find_key_info(&api, &key_id),
            |e: &RefreshError<ApiError>| matches!(e, RefreshError::NotFound),
        )
        .await
        .map_err(|e| {
            let detail = match e.into_inner() {
                Some(RefreshError::Other(err)) => err.to_string(),
                Some(RefreshError::NotFound) => "key not found".to_string(),
                None => "cancelled".to_string(),
            };
            Diagnostic::error(format!("reading {} ({})", RESOURCE_NAME, key_id), detail)
        })?;

        key_state(&key_id, &info, plan)
    }

    async fn update_replica(
        &self,
        ctx: &Context,
        provider_data: &AwsProviderData,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let key_id = prior
            .get_string(&AttributePath::new("id"))
            .map_err(|e| Diagnostic::error(format!("updating {}", RESOURCE_NAME), e.to_string()))?;
        let api = provider_data.client.kms();

        let enabled_path = AttributePath::new("enabled");
        let planned_enabled = plan.get_bool_opt(&enabled_path);
        let prior_enabled = prior.get_bool_opt(&enabled_path);

        // Enable before any other change so the key accepts it
        if planned_enabled == Some(true) && prior_enabled != Some(true) {
            api.enable_key(&key_id)
                .await
                .map_err(|e| step_error("enabling", &key_id, e))?;
            wait_enabled_propagated(ctx, &api, &key_id, true)
                .await
                .map_err(|e| wait_error(&key_id, "enable propagation", e))?;
        }

        let description_path = AttributePath::new("description");
        let description = plan.get_string_opt(&description_path);
        if description != prior.get_string_opt(&description_path) {
            let description = description.unwrap_or_default();
            api.update_key_description(&key_id, &description)
                .await
                .map_err(|e| step_error("updating description of", &key_id, e))?;
            wait_description_propagated(ctx, &api, &key_id, &description)
                .await
                .map_err(|e| wait_error(&key_id, "description propagation", e))?;
        }

        let policy_path = AttributePath::new("policy");
        if let Some(policy) = plan.get_string_opt(&policy_path).filter(|p| !p.is_empty()) {
            let unchanged = prior
                .get_string_opt(&policy_path)
                .is_some_and(|old| flex::json_equivalent(&old, &policy));
            if !unchanged {
                let bypass = plan
                    .get_bool_opt(&AttributePath::new("bypass_policy_lockout_safety_check"))
                    .unwrap_or(false);
                api.put_key_policy(&key_id, &policy, bypass)
                    .await
                    .map_err(|e| step_error("updating policy of", &key_id, e))?;
                wait_policy_propagated(ctx, &api, &key_id, &policy)
                    .await
                    .map_err(|e| wait_error(&key_id, "policy propagation", e))?;
            }
        }

        if planned_enabled == Some(false) && prior_enabled != Some(false) {
            api.disable_key(&key_id)
                .await
                .map_err(|e| step_error("disabling", &key_id, e))?;
            wait_enabled_propagated(ctx, &api, &key_id, false)
                .await
                .map_err(|e| wait_error(&key_id, "disable propagation", e))?;
        }

        match find_key_info(&api, &key_id).await {
            Ok(info) => key_state(&key_id, &info, plan),
            Err(RefreshError::NotFound) => Err(Diagnostic::error(
                format!("reading {} ({})", RESOURCE_NAME, key_id),
                "key not found after update",
            )),
            Err(RefreshError::Other(e)) => Err(Diagnostic::error(
                format!("reading {} ({})", RESOURCE_NAME, key_id),
                e.to_string(),
            )),
        }
    }
}

fn step_error(action: &str, key_id: &str, err: ApiError) -> Diagnostic {
    Diagnostic::error(
        format!("{} {} ({})", action, RESOURCE_NAME, key_id),
        err.to_string(),
    )
}

fn wait_error<T>(key_id: &str, what: &str, err: WaitError<T>) -> Diagnostic {
    Diagnostic::error(
        format!("waiting for {} ({}) {}", RESOURCE_NAME, key_id, what),
        err.to_string(),
    )
}

/// Builds state from a refreshed key. Attributes the API does not return
/// are carried over from `prior`.
fn key_state(key_id: &str, info: &KeyInfo, prior: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
    let metadata = &info.metadata;
    let invalid = |detail: String| Diagnostic::error(format!("reading {} ({})", RESOURCE_NAME, key_id), detail);

    if metadata.key_manager != KEY_MANAGER_CUSTOMER {
        return Err(invalid(format!(
            "{} ({}) has invalid KeyManager: {}",
            RESOURCE_NAME, key_id, metadata.key_manager
        )));
    }
    if metadata.origin != ORIGIN_AWS_KMS {
        return Err(invalid(format!(
            "{} ({}) has invalid Origin: {}",
            RESOURCE_NAME, key_id, metadata.origin
        )));
    }
    let primary_key = metadata
        .multi_region_configuration
        .as_ref()
        .filter(|c| metadata.multi_region && c.multi_region_key_type == MULTI_REGION_KEY_TYPE_REPLICA)
        .and_then(|c| c.primary_key.as_ref())
        .ok_or_else(|| {
            invalid(format!(
                "{} ({}) is not a multi-Region replica key",
                RESOURCE_NAME, key_id
            ))
        })?;

    let prior_policy = prior
        .get_string_opt(&AttributePath::new("policy"))
        .unwrap_or_default();
    let policy = flex::second_json_unless_equivalent(&prior_policy, &info.policy)
        .map_err(|e| invalid(format!("policy contains invalid JSON: {}", e)))?;

    let mut state = DynamicValue::object();
    let set = |state: &mut DynamicValue, name: &str, value: String| {
        let _ = state.set_string(&AttributePath::new(name), value);
    };
    set(&mut state, "arn", metadata.arn.clone());
    set(&mut state, "id", metadata.key_id.clone());
    set(&mut state, "key_id", metadata.key_id.clone());
    set(&mut state, "key_spec", metadata.key_spec.clone());
    set(&mut state, "key_usage", metadata.key_usage.clone());
    set(&mut state, "policy", policy);
    set(&mut state, "primary_key_arn", primary_key.arn.clone());
    // An empty description stays empty when configured as such
    let prior_description = prior.get_string_opt(&AttributePath::new("description"));
    let description = if metadata.description.is_empty() && prior_description.as_deref() != Some("") {
        None
    } else {
        Some(metadata.description.clone())
    };
    let _ = state.set_string_opt(&AttributePath::new("description"), description);
    let _ = state.set_bool(&AttributePath::new("enabled"), metadata.enabled);
    let _ = state.set_bool(
        &AttributePath::new("key_rotation_enabled"),
        info.rotation_enabled,
    );
    let _ = state.set_bool(
        &AttributePath::new("bypass_policy_lockout_safety_check"),
        prior
            .get_bool_opt(&AttributePath::new("bypass_policy_lockout_safety_check"))
            .unwrap_or(false),
    );
    let _ = state.set_number(
        &AttributePath::new("deletion_window_in_days"),
        prior
            .get_number_opt(&AttributePath::new("deletion_window_in_days"))
            .unwrap_or(30.0),
    );

    Ok(state)
}

fn refresh_error(err: ApiError) -> RefreshError<ApiError> {
    if err.is_not_found() {
        RefreshError::NotFound
    } else {
        RefreshError::Other(err)
    }
}

/// Keys pending deletion are treated as gone
async fn find_key(api: &KmsApi<'_>, key_id: &str) -> Result<KeyMetadata, RefreshError<ApiError>> {
    let metadata = api.describe_key(key_id).await.map_err(refresh_error)?;
    if metadata.key_state == KEY_STATE_PENDING_DELETION {
        return Err(RefreshError::NotFound);
    }
    Ok(metadata)
}

async fn find_key_info(api: &KmsApi<'_>, key_id: &str) -> Result<KeyInfo, RefreshError<ApiError>> {
    let (metadata, policy, rotation_enabled) = futures::try_join!(
        find_key(api, key_id),
        async { api.get_key_policy(key_id).await.map_err(refresh_error) },
        async { api.get_key_rotation_status(key_id).await.map_err(refresh_error) },
    )?;

    Ok(KeyInfo {
        metadata,
        policy,
        rotation_enabled,
    })
}

async fn status_key_state(
    api: &KmsApi<'_>,
    key_id: &str,
) -> Result<(KeyMetadata, String), RefreshError<ApiError>> {
    let metadata = find_key(api, key_id).await?;
    let state = metadata.key_state.clone();
    Ok((metadata, state))
}

/// Waits until `check` has held for several consecutive reads
async fn wait_propagated<F, Fut>(
    ctx: &Context,
    mut check: F,
) -> Result<Option<bool>, WaitError<bool>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool, RefreshError<ApiError>>>,
{
    StateChangeConf::new(["false"], ["true"])
        .timeout(PROPAGATION_TIMEOUT)
        .continuous_target_occurence(PROPAGATION_CHECKS)
        .wait_for_state(ctx, || {
            let fut = check();
            async move { fut.await.map(|done| (done, done.to_string())) }
        })
        .await
}

async fn wait_enabled_propagated(
    ctx: &Context,
    api: &KmsApi<'_>,
    key_id: &str,
    enabled: bool,
) -> Result<Option<bool>, WaitError<bool>> {
    wait_propagated(ctx, || async move {
        find_key(api, key_id).await.map(|key| key.enabled == enabled)
    })
    .await
}

async fn wait_description_propagated(
    ctx: &Context,
    api: &KmsApi<'_>,
    key_id: &str,
    description: &str,
) -> Result<Option<bool>, WaitError<bool>> {
    wait_propagated(ctx, || async move {
        find_key(api, key_id)
            .await
            .map(|key| key.description == description)
    })
    .await
}

async fn wait_policy_propagated(
    ctx: &Context,
    api: &KmsApi<'_>,
    key_id: &str,
    policy: &str,
) -> Result<Option<bool>, WaitError<bool>> {
    wait_propagated(ctx, || async move {
        api.get_key_policy(key_id)
            .await
            .map(|current| flex::json_equivalent(&current, policy))
            .map_err(refresh_error)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::kms::{MultiRegionConfiguration, MultiRegionKey};

    fn replica_metadata() -> KeyMetadata {
        KeyMetadata {
            arn: "arn:aws:kms:us-west-2:111122223333:key/mrk-1".to_string(),
            key_id: "mrk-1".to_string(),
            description: String::new(),
            enabled: true,
            key_manager: KEY_MANAGER_CUSTOMER.to_string(),
            origin: ORIGIN_AWS_KMS.to_string(),
            key_spec: "SYMMETRIC_DEFAULT".to_string(),
            key_usage: "ENCRYPT_DECRYPT".to_string(),
            key_state: KEY_STATE_ENABLED.to_string(),
            multi_region: true,
            multi_region_configuration: Some(MultiRegionConfiguration {
                multi_region_key_type: MULTI_REGION_KEY_TYPE_REPLICA.to_string(),
                primary_key: Some(MultiRegionKey {
                    arn: "arn:aws:kms:us-east-1:111122223333:key/mrk-1".to_string(),
                    region: "us-east-1".to_string(),
                }),
            }),
        }
    }

    fn info(metadata: KeyMetadata) -> KeyInfo {
        KeyInfo {
            metadata,
            policy: r#"{"Statement":[],"Version":"2012-10-17"}"#.to_string(),
            rotation_enabled: false,
        }
    }

    #[test]
    fn state_carries_config_only_attributes() {
        let prior = DynamicValue::from_json(serde_json::json!({
            "deletion_window_in_days": 7,
            "bypass_policy_lockout_safety_check": true,
            "policy": r#"{"Version": "2012-10-17", "Statement": []}"#,
        }));

        let state = key_state("mrk-1", &info(replica_metadata()), &prior).unwrap();

        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "mrk-1");
        assert_eq!(
            state.get_number(&AttributePath::new("deletion_window_in_days")).unwrap(),
            7.0
        );
        assert!(state.get_bool(&AttributePath::new("bypass_policy_lockout_safety_check")).unwrap());
        assert_eq!(
            state.get_string(&AttributePath::new("policy")).unwrap(),
            r#"{"Version": "2012-10-17", "Statement": []}"#
        );
        assert_eq!(
            state.get_string(&AttributePath::new("primary_key_arn")).unwrap(),
            "arn:aws:kms:us-east-1:111122223333:key/mrk-1"
        );
        assert_eq!(state.get_string_opt(&AttributePath::new("description")), None);
    }

    #[test]
    fn rejects_keys_that_are_not_replicas() {
        let mut metadata = replica_metadata();
        metadata.multi_region_configuration = None;
        let err = key_state("mrk-1", &info(metadata), &DynamicValue::object()).unwrap_err();
        assert!(err.detail.contains("is not a multi-Region replica key"));

        let mut metadata = replica_metadata();
        metadata.key_manager = "AWS".to_string();
        let err = key_state("mrk-1", &info(metadata), &DynamicValue::object()).unwrap_err();
        assert!(err.detail.contains("has invalid KeyManager: AWS"));

        let mut metadata = replica_metadata();
        metadata.origin = "EXTERNAL".to_string();
        let err = key_state("mrk-1", &info(metadata), &DynamicValue::object()).unwrap_err();
        assert!(err.detail.contains("has invalid Origin: EXTERNAL"));
    }

    #[test]
    fn empty_description_follows_prior_value() {
        let configured_empty = DynamicValue::from_json(serde_json::json!({"description": ""}));
        let state = key_state("mrk-1", &info(replica_metadata()), &configured_empty).unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new("description")).unwrap(),
            ""
        );

        let unset = DynamicValue::from_json(serde_json::json!({"description": null}));
        let state = key_state("mrk-1", &info(replica_metadata()), &unset).unwrap();
        assert_eq!(state.get_string_opt(&AttributePath::new("description")), None);

        let mut metadata = replica_metadata();
        metadata.description = "replica".to_string();
        let state = key_state("mrk-1", &info(metadata), &configured_empty).unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new("description")).unwrap(),
            "replica"
        );
    }
}
