//! Drives a small in-memory provider through the server lifecycle

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource,
    DataSourceMetadataRequest, DataSourceMetadataResponse, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::server::{
    ApplyResourceChangeRequest, PlanResourceChangeRequest, ProviderServer, UpgradeResourceStateRequest,
};
use tfplug::types::{AttributePath, ClientCapabilities, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

#[derive(Clone, Default)]
struct Backend {
    widgets: Arc<Mutex<HashMap<String, (String, f64)>>>,
}

impl Backend {
    fn insert(&self, id: &str, name: &str, size: f64) {
        self.widgets
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), size));
    }

    fn get(&self, id: &str) -> Option<(String, f64)> {
        self.widgets.lock().unwrap().get(id).cloned()
    }

    fn remove(&self, id: &str) {
        self.widgets.lock().unwrap().remove(id);
    }
}

struct TestProvider {
    backend: Backend,
}

#[async_trait]
impl Provider for TestProvider {
    fn type_name(&self) -> &str {
        "test"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "test".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("fail", AttributeType::Bool)
                        .optional()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        if request.config.get_bool_opt(&AttributePath::new("fail")) == Some(true) {
            return ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error("Configuration failed", "requested")],
                provider_data: None,
            };
        }

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(self.backend.clone())),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert("test_widget".to_string(), WidgetResource::factory);
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert("test_widget_count".to_string(), WidgetCountDataSource::factory);
        data_sources
    }
}

#[derive(Default)]
struct WidgetResource {
    backend: Option<Backend>,
}

impl WidgetResource {
    fn factory() -> Box<dyn ResourceWithConfigure> {
        Box::new(Self::default())
    }

    fn state(id: &str, name: &str, size: f64) -> DynamicValue {
        DynamicValue::from_json(json!({"id": id, "name": name, "size": size}))
    }
}

#[async_trait]
impl Resource for WidgetResource {
    fn type_name(&self) -> &str {
        "test_widget"
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

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .optional()
                    .computed()
                    .default(StaticDefault::number(1.0))
                    .validator(NumberRangeValidator::between(1.0, 10.0))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let backend = self.backend.as_ref().unwrap();
        let name = request.planned_state.get_string(&AttributePath::new("name")).unwrap();
        let size = request.planned_state.get_number(&AttributePath::new("size")).unwrap();

        if name == "fail" {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error("creating Widget (fail)", "boom")],
            };
        }

        let id = format!("w-{}", name);
        backend.insert(&id, &name, size);

        CreateResourceResponse {
            new_state: Self::state(&id, &name, size),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let backend = self.backend.as_ref().unwrap();
        let id = request.current_state.get_string(&AttributePath::new("id")).unwrap();

        ReadResourceResponse {
            new_state: backend
                .get(&id)
                .map(|(name, size)| Self::state(&id, &name, size)),
            diagnostics: vec![],
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let backend = self.backend.as_ref().unwrap();
        let id = request.prior_state.get_string(&AttributePath::new("id")).unwrap();
        let name = request.planned_state.get_string(&AttributePath::new("name")).unwrap();
        let size = request.planned_state.get_number(&AttributePath::new("size")).unwrap();
        backend.insert(&id, &name, size);

        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let id = request.prior_state.get_string(&AttributePath::new("id")).unwrap();
        self.backend.as_ref().unwrap().remove(&id);
        DeleteResourceResponse {
            diagnostics: vec![],
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
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for WidgetResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.backend = request
            .provider_data
            .and_then(|data| data.downcast_ref::<Backend>().cloned());
        ConfigureResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[derive(Default)]
struct WidgetCountDataSource {
    backend: Option<Backend>,
}

impl WidgetCountDataSource {
    fn factory() -> Box<dyn DataSourceWithConfigure> {
        Box::new(Self::default())
    }
}

#[async_trait]
impl DataSource for WidgetCountDataSource {
    fn type_name(&self) -> &str {
        "test_widget_count"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("count", AttributeType::Number)
                        .computed()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match &self.backend {
            Some(backend) => {
                let count = backend.widgets.lock().unwrap().len();
                ReadDataSourceResponse {
                    state: DynamicValue::from_json(json!({"count": count})),
                    diagnostics: vec![],
                }
            }
            None => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                )],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for WidgetCountDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.backend = request
            .provider_data
            .and_then(|data| data.downcast_ref::<Backend>().cloned());
        ConfigureDataSourceResponse {
            diagnostics: vec![],
        }
    }
}

async fn configured_server() -> (ProviderServer<TestProvider>, Backend) {
    let backend = Backend::default();
    let server = ProviderServer::new(TestProvider {
        backend: backend.clone(),
    });

    let diagnostics = server
        .configure(
            &Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::object(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    (server, backend)
}

async fn create_widget(server: &ProviderServer<TestProvider>, name: &str) -> DynamicValue {
    let ctx = Context::new();
    let config = DynamicValue::from_json(json!({ "name": name }));

    let plan = server
        .plan_resource_change(
            &ctx,
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: DynamicValue::null(),
                config: config.clone(),
            },
        )
        .await;
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    let applied = server
        .apply_resource_change(
            &ctx,
            ApplyResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: DynamicValue::null(),
                planned_state: plan.planned_state,
                config,
            },
        )
        .await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);

    applied.new_state
}

#[tokio::test]
async fn registry_lists_types() {
    let server = ProviderServer::new(TestProvider {
        backend: Backend::default(),
    });

    assert_eq!(server.resource_types(), vec!["test_widget".to_string()]);
    assert_eq!(server.data_source_types(), vec!["test_widget_count".to_string()]);

    let schemas = server.schemas(&Context::new()).await;
    assert!(schemas.resources["test_widget"].block.attribute("name").is_some());
    assert!(schemas.data_sources.contains_key("test_widget_count"));
}

#[tokio::test]
async fn failed_configure_keeps_provider_unconfigured() {
    let server = ProviderServer::new(TestProvider {
        backend: Backend::default(),
    });
    let ctx = Context::new();

    let diagnostics = server
        .configure(
            &ctx,
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::from_json(json!({"fail": true})),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert_eq!(diagnostics.len(), 1);

    let response = server
        .read_data_source(
            &ctx,
            ReadDataSourceRequest {
                type_name: "test_widget_count".to_string(),
                config: DynamicValue::object(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert_eq!(response.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn unknown_resource_type_is_reported() {
    let (server, _) = configured_server().await;

    let plan = server
        .plan_resource_change(
            &Context::new(),
            PlanResourceChangeRequest {
                type_name: "test_gadget".to_string(),
                prior_state: DynamicValue::null(),
                config: DynamicValue::from_json(json!({"name": "a"})),
            },
        )
        .await;

    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.diagnostics[0].summary, "Resource type not found: test_gadget");
}

#[tokio::test]
async fn validate_runs_schema_checks_and_validators() {
    let (server, _) = configured_server().await;

    let response = server
        .validate_resource_config(
            &Context::new(),
            ValidateResourceConfigRequest {
                type_name: "test_widget".to_string(),
                config: DynamicValue::from_json(json!({"size": 20, "colour": "red"})),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    let summaries: Vec<&str> = response
        .diagnostics
        .iter()
        .map(|d| d.summary.as_str())
        .collect();
    assert!(summaries.contains(&"Missing required argument"));
    assert!(summaries.contains(&"Invalid Attribute Value for size"));
    assert!(summaries.contains(&"Unsupported argument"));
}

#[tokio::test]
async fn plan_create_applies_defaults_and_marks_computed_unknown() {
    let (server, _) = configured_server().await;

    let plan = server
        .plan_resource_change(
            &Context::new(),
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: DynamicValue::null(),
                config: DynamicValue::from_json(json!({"name": "alpha"})),
            },
        )
        .await;

    assert!(plan.diagnostics.is_empty());
    assert!(plan.requires_replace.is_empty());
    assert_eq!(
        plan.planned_state.get_number(&AttributePath::new("size")).unwrap(),
        1.0
    );
    assert!(plan
        .planned_state
        .get(&AttributePath::new("id"))
        .unwrap()
        .is_unknown());
}

#[tokio::test]
async fn apply_create_then_plan_replacement() {
    let (server, backend) = configured_server().await;
    let state = create_widget(&server, "alpha").await;

    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "w-alpha");
    assert_eq!(backend.get("w-alpha"), Some(("alpha".to_string(), 1.0)));

    let plan = server
        .plan_resource_change(
            &Context::new(),
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: state.clone(),
                config: DynamicValue::from_json(json!({"name": "beta"})),
            },
        )
        .await;

    assert_eq!(plan.requires_replace, vec![AttributePath::new("name")]);
    assert_eq!(
        plan.planned_state.get_string(&AttributePath::new("id")).unwrap(),
        "w-alpha"
    );
}

#[tokio::test]
async fn plan_without_changes_matches_prior_state() {
    let (server, _) = configured_server().await;
    let state = create_widget(&server, "alpha").await;

    let plan = server
        .plan_resource_change(
            &Context::new(),
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: state.clone(),
                config: DynamicValue::from_json(json!({"name": "alpha"})),
            },
        )
        .await;

    assert!(plan.requires_replace.is_empty());
    assert!(plan.planned_state.value.semantically_equal(&state.value));
}

#[tokio::test]
async fn apply_update_and_delete() {
    let (server, backend) = configured_server().await;
    let ctx = Context::new();
    let state = create_widget(&server, "alpha").await;

    let config = DynamicValue::from_json(json!({"name": "alpha", "size": 4}));
    let plan = server
        .plan_resource_change(
            &ctx,
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: state.clone(),
                config: config.clone(),
            },
        )
        .await;
    assert!(plan.requires_replace.is_empty());

    let updated = server
        .apply_resource_change(
            &ctx,
            ApplyResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: state,
                planned_state: plan.planned_state,
                config,
            },
        )
        .await;
    assert!(updated.diagnostics.is_empty());
    assert_eq!(backend.get("w-alpha"), Some(("alpha".to_string(), 4.0)));

    let destroy = server
        .plan_resource_change(
            &ctx,
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: updated.new_state.clone(),
                config: DynamicValue::null(),
            },
        )
        .await;
    assert!(destroy.planned_state.is_null());

    let deleted = server
        .apply_resource_change(
            &ctx,
            ApplyResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: updated.new_state,
                planned_state: destroy.planned_state,
                config: DynamicValue::null(),
            },
        )
        .await;
    assert!(deleted.new_state.is_null());
    assert_eq!(backend.get("w-alpha"), None);
}

#[tokio::test]
async fn failed_create_returns_planned_state() {
    let (server, _) = configured_server().await;
    let ctx = Context::new();
    let config = DynamicValue::from_json(json!({"name": "fail"}));

    let plan = server
        .plan_resource_change(
            &ctx,
            PlanResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: DynamicValue::null(),
                config: config.clone(),
            },
        )
        .await;

    let applied = server
        .apply_resource_change(
            &ctx,
            ApplyResourceChangeRequest {
                type_name: "test_widget".to_string(),
                prior_state: DynamicValue::null(),
                planned_state: plan.planned_state.clone(),
                config,
            },
        )
        .await;

    assert_eq!(applied.diagnostics[0].summary, "creating Widget (fail)");
    assert_eq!(applied.new_state, plan.planned_state);
}

#[tokio::test]
async fn read_detects_drift_and_removal() {
    let (server, backend) = configured_server().await;
    let ctx = Context::new();
    let state = create_widget(&server, "alpha").await;

    backend.insert("w-alpha", "alpha", 7.0);
    let refreshed = server
        .read_resource(
            &ctx,
            ReadResourceRequest {
                type_name: "test_widget".to_string(),
                current_state: state.clone(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert_eq!(refreshed.drift, vec![AttributePath::new("size")]);
    assert_eq!(
        refreshed
            .new_state
            .unwrap()
            .get_number(&AttributePath::new("size"))
            .unwrap(),
        7.0
    );

    backend.remove("w-alpha");
    let refreshed = server
        .read_resource(
            &ctx,
            ReadResourceRequest {
                type_name: "test_widget".to_string(),
                current_state: state,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(refreshed.new_state.is_none());
    assert!(refreshed.drift.is_empty());
}

#[tokio::test]
async fn import_reads_back_existing_objects() {
    let (server, backend) = configured_server().await;
    let ctx = Context::new();
    backend.insert("w-existing", "existing", 3.0);

    let imported = server
        .import_resource_state(
            &ctx,
            ImportResourceStateRequest {
                type_name: "test_widget".to_string(),
                id: "w-existing".to_string(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(imported.diagnostics.is_empty());
    let state = &imported.imported_resources[0].state;
    assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "existing");
    assert_eq!(state.get_number(&AttributePath::new("size")).unwrap(), 3.0);

    let missing = server
        .import_resource_state(
            &ctx,
            ImportResourceStateRequest {
                type_name: "test_widget".to_string(),
                id: "w-missing".to_string(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(missing.imported_resources.is_empty());
    assert_eq!(
        missing.diagnostics[0].summary,
        "Cannot import non-existent remote object"
    );
}

#[tokio::test]
async fn data_source_reads_through_provider_data() {
    let (server, backend) = configured_server().await;
    backend.insert("w-1", "one", 1.0);
    backend.insert("w-2", "two", 2.0);

    let response = server
        .read_data_source(
            &Context::new(),
            ReadDataSourceRequest {
                type_name: "test_widget_count".to_string(),
                config: DynamicValue::object(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty());
    assert_eq!(
        response.state.get(&AttributePath::new("count")),
        Some(&Dynamic::Number(2.0))
    );
}

#[tokio::test]
async fn upgrade_drops_attributes_missing_from_schema() {
    let (server, _) = configured_server().await;
    let ctx = Context::new();

    let upgraded = server
        .upgrade_resource_state(
            &ctx,
            UpgradeResourceStateRequest {
                type_name: "test_widget".to_string(),
                version: 0,
                raw_state: DynamicValue::from_json(
                    json!({"id": "w-alpha", "name": "alpha", "size": 2, "colour": "red"}),
                ),
            },
        )
        .await;
    assert!(upgraded.diagnostics.is_empty(), "{:?}", upgraded.diagnostics);
    assert_eq!(
        upgraded.upgraded_state.to_json().unwrap(),
        json!({"id": "w-alpha", "name": "alpha", "size": 2})
    );

    let newer = server
        .upgrade_resource_state(
            &ctx,
            UpgradeResourceStateRequest {
                type_name: "test_widget".to_string(),
                version: 3,
                raw_state: DynamicValue::from_json(json!({"id": "w-alpha"})),
            },
        )
        .await;
    assert_eq!(newer.diagnostics[0].summary, "Resource state is newer than the provider");
}
