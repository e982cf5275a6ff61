//! In-process provider server
//!
//! [`ProviderServer`] owns a provider and the registry of resource and data
//! source factories it declared, and drives the framework side of every
//! operation: configuration checks, defaults, plan modifiers, apply dispatch,
//! drift detection after refresh, and import read-back.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
    ValidateDataSourceConfigResponse,
};
use crate::error::TfplugError;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest, ResourceFactory,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure, UpdateResourceRequest,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use crate::schema::{Block, DefaultRequest, NestingMode, PlanModifierRequest, Schema, ValidatorRequest};
use crate::types::{has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Diagnosed<T> = std::result::Result<T, Vec<Diagnostic>>;

pub struct PlanResourceChangeRequest {
    pub type_name: String,
    /// Null when the resource does not exist yet
    pub prior_state: DynamicValue,
    /// Null when the resource is being destroyed
    pub config: DynamicValue,
}

pub struct PlanResourceChangeResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ApplyResourceChangeRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct ApplyResourceChangeResponse {
    /// Null after a successful destroy
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct UpgradeResourceStateRequest {
    pub type_name: String,
    /// Schema version the stored state was written with
    pub version: i64,
    pub raw_state: DynamicValue,
}

pub struct UpgradeResourceStateResponse {
    pub upgraded_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadResourceResult {
    /// `None` when the remote object is gone and should leave state
    pub new_state: Option<DynamicValue>,
    /// Attributes whose refreshed value differs from prior state
    pub drift: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Schemas for the provider and everything it registers
pub struct ProviderSchemas {
    pub provider: Schema,
    pub resources: HashMap<String, Schema>,
    pub data_sources: HashMap<String, Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderServer<P: Provider> {
    provider: RwLock<P>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    provider_data: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
}

impl<P: Provider> ProviderServer<P> {
    /// Captures the provider's registry once; it is not consulted again
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        Self {
            provider: RwLock::new(provider),
            resources,
            data_sources,
            provider_data: RwLock::new(None),
        }
    }

    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn data_source_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn schemas(&self, ctx: &Context) -> ProviderSchemas {
        let provider_schema = self
            .provider
            .read()
            .await
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        let mut diagnostics = provider_schema.diagnostics;

        let mut resources = HashMap::new();
        for (name, factory) in &self.resources {
            let response = factory().schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resources.insert(name.clone(), response.schema);
        }

        let mut data_sources = HashMap::new();
        for (name, factory) in &self.data_sources {
            let response = factory().schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_sources.insert(name.clone(), response.schema);
        }

        ProviderSchemas {
            provider: provider_schema.schema,
            resources,
            data_sources,
            diagnostics,
        }
    }

    /// Validates and applies provider configuration. Provider data is kept
    /// only when configuration succeeds.
    pub async fn configure(&self, ctx: &Context, request: ConfigureProviderRequest) -> Vec<Diagnostic> {
        let mut provider = self.provider.write().await;

        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_block(
            &schema.schema.block,
            &request.config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let response = provider.configure(ctx.clone(), request).await;
        diagnostics.extend(response.diagnostics);

        if !has_errors(&diagnostics) {
            *self.provider_data.write().await = response.provider_data;
            tracing::info!(provider = provider.type_name(), "provider configured");
        }

        diagnostics
    }

    /// Schema checks for provider configuration ahead of [`Self::configure`]
    pub async fn validate_provider_config(&self, ctx: &Context, config: &DynamicValue) -> Vec<Diagnostic> {
        let schema = self
            .provider
            .read()
            .await
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        let mut diagnostics = schema.diagnostics;
        validate_block(&schema.schema.block, &config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }

    pub async fn validate_resource_config(
        &self,
        ctx: &Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let resource = match self.resource_instance(&request.type_name) {
            Ok(resource) => resource,
            Err(diagnostics) => return ValidateResourceConfigResponse { diagnostics },
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_block(
            &schema.schema.block,
            &request.config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );

        if !has_errors(&diagnostics) {
            diagnostics.extend(resource.validate(ctx.clone(), request).await.diagnostics);
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    pub async fn plan_resource_change(
        &self,
        ctx: &Context,
        request: PlanResourceChangeRequest,
    ) -> PlanResourceChangeResponse {
        if request.config.is_null() {
            tracing::debug!(type_name = %request.type_name, "planned destroy");
            return PlanResourceChangeResponse {
                planned_state: DynamicValue::null(),
                requires_replace: vec![],
                diagnostics: vec![],
            };
        }

        let resource = match self.configured_resource(ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return PlanResourceChangeResponse {
                    planned_state: request.prior_state,
                    requires_replace: vec![],
                    diagnostics,
                }
            }
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        let block = &schema.schema.block;
        let mut diagnostics = schema.diagnostics;

        let is_create = request.prior_state.is_null();
        let mut planned = propose_new_state(block, &request.prior_state, &request.config);

        for attr in &block.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            if !attribute_value(&request.config, &attr.name).is_null() {
                continue;
            }

            let path = AttributePath::new(&attr.name);
            let value = default
                .default_value(DefaultRequest { path: path.clone() })
                .value;
            set_planned(&mut planned, &path, value.value, &mut diagnostics);
        }

        let has_changes = is_create || !changed_paths(block, &request.prior_state, &planned).is_empty();
        if has_changes {
            for attr in block.attributes.iter().filter(|a| a.computed && a.default.is_none()) {
                if attribute_value(&request.config, &attr.name).is_null() {
                    let path = AttributePath::new(&attr.name);
                    set_planned(&mut planned, &path, Dynamic::Unknown, &mut diagnostics);
                }
            }
        }

        let mut requires_replace: Vec<AttributePath> = vec![];
        for attr in block.attributes.iter().filter(|a| !a.plan_modifiers.is_empty()) {
            let path = AttributePath::new(&attr.name);
            let state_value = DynamicValue::new(attribute_value(&request.prior_state, &attr.name));
            let config_value = DynamicValue::new(attribute_value(&request.config, &attr.name));
            let mut plan_value = DynamicValue::new(attribute_value(&planned, &attr.name));

            for modifier in &attr.plan_modifiers {
                let response = modifier.modify(PlanModifierRequest {
                    config_value: config_value.clone(),
                    state_value: state_value.clone(),
                    plan_value,
                    path: path.clone(),
                });

                plan_value = response.plan_value;
                diagnostics.extend(response.diagnostics);
                if response.requires_replace && !requires_replace.contains(&path) {
                    requires_replace.push(path.clone());
                }
            }

            set_planned(&mut planned, &path, plan_value.value, &mut diagnostics);
        }

        let response = resource
            .modify_plan(
                ctx.clone(),
                ModifyPlanRequest {
                    type_name: request.type_name.clone(),
                    config: request.config,
                    prior_state: request.prior_state,
                    proposed_new_state: planned,
                },
            )
            .await;

        diagnostics.extend(response.diagnostics);
        for path in response.requires_replace {
            if !requires_replace.contains(&path) {
                requires_replace.push(path);
            }
        }

        tracing::debug!(
            type_name = %request.type_name,
            create = is_create,
            replace = requires_replace.len(),
            "planned resource change"
        );

        PlanResourceChangeResponse {
            planned_state: response.planned_state,
            requires_replace,
            diagnostics,
        }
    }

    pub async fn apply_resource_change(
        &self,
        ctx: &Context,
        request: ApplyResourceChangeRequest,
    ) -> ApplyResourceChangeResponse {
        let is_create = request.prior_state.is_null() && !request.planned_state.is_null();
        let is_delete = !request.prior_state.is_null() && request.planned_state.is_null();

        let resource = match self.configured_resource(ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ApplyResourceChangeResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        };

        let type_name = request.type_name.clone();

        if is_delete {
            let response = resource
                .delete(
                    ctx.clone(),
                    DeleteResourceRequest {
                        type_name: request.type_name,
                        prior_state: request.prior_state.clone(),
                    },
                )
                .await;

            if has_errors(&response.diagnostics) {
                return ApplyResourceChangeResponse {
                    new_state: request.prior_state,
                    diagnostics: response.diagnostics,
                };
            }

            tracing::info!(type_name = %type_name, "deleted resource");
            return ApplyResourceChangeResponse {
                new_state: DynamicValue::null(),
                diagnostics: response.diagnostics,
            };
        }

        let (new_state, mut diagnostics) = if is_create {
            let response = resource
                .create(
                    ctx.clone(),
                    CreateResourceRequest {
                        type_name: request.type_name,
                        planned_state: request.planned_state.clone(),
                        config: request.config,
                    },
                )
                .await;
            (response.new_state, response.diagnostics)
        } else {
            let response = resource
                .update(
                    ctx.clone(),
                    UpdateResourceRequest {
                        type_name: request.type_name,
                        prior_state: request.prior_state.clone(),
                        planned_state: request.planned_state.clone(),
                        config: request.config,
                    },
                )
                .await;
            (response.new_state, response.diagnostics)
        };

        if has_errors(&diagnostics) {
            // A failed create keeps the resource's state once it carries an id,
            // otherwise the plan. A failed update keeps what existed.
            let new_state = if is_create {
                if has_identifier(&new_state) {
                    let mut partial = new_state;
                    partial.unknowns_to_null();
                    tracing::warn!(type_name = %type_name, "create failed after the object was created");
                    partial
                } else {
                    request.planned_state
                }
            } else {
                request.prior_state
            };
            return ApplyResourceChangeResponse {
                new_state,
                diagnostics,
            };
        }

        if !new_state.value.is_fully_known() {
            diagnostics.push(Diagnostic::error(
                "Provider returned invalid result object after apply",
                format!(
                    "After applying changes to {}, the new state still contains unknown values",
                    type_name
                ),
            ));
            return ApplyResourceChangeResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        tracing::info!(
            type_name = %type_name,
            operation = if is_create { "create" } else { "update" },
            "applied resource change"
        );

        ApplyResourceChangeResponse {
            new_state,
            diagnostics,
        }
    }

    /// Refreshes a resource and reports which attributes drifted
    pub async fn read_resource(&self, ctx: &Context, request: ReadResourceRequest) -> ReadResourceResult {
        let resource = match self.configured_resource(ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ReadResourceResult {
                    new_state: Some(request.current_state),
                    drift: vec![],
                    diagnostics,
                }
            }
        };

        let type_name = request.type_name.clone();
        let prior = request.current_state.clone();
        let response = resource.read(ctx.clone(), request).await;

        let Some(new_state) = response.new_state else {
            tracing::warn!(type_name = %type_name, "resource not found, removing from state");
            return ReadResourceResult {
                new_state: None,
                drift: vec![],
                diagnostics: response.diagnostics,
            };
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        let drift = changed_paths(&schema.schema.block, &prior, &new_state);
        for path in &drift {
            tracing::warn!(type_name = %type_name, attribute = %path, "detected drift");
        }

        ReadResourceResult {
            new_state: Some(new_state),
            drift,
            diagnostics: response.diagnostics,
        }
    }

    /// Imports by id, then reads every imported object back
    pub async fn import_resource_state(
        &self,
        ctx: &Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let resource = match self.configured_resource(ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics,
                }
            }
        };

        let id = request.id.clone();
        let client_capabilities = request.client_capabilities.clone();
        let imported = resource.import_state(ctx.clone(), request).await;
        let mut diagnostics = imported.diagnostics;
        if has_errors(&diagnostics) {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics,
            };
        }

        let mut imported_resources = Vec::with_capacity(imported.imported_resources.len());
        for mut item in imported.imported_resources {
            let response = resource
                .read(
                    ctx.clone(),
                    ReadResourceRequest {
                        type_name: item.type_name.clone(),
                        current_state: item.state,
                        client_capabilities: client_capabilities.clone(),
                    },
                )
                .await;
            let read_failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            if read_failed {
                continue;
            }

            match response.new_state {
                Some(state) => {
                    item.state = state;
                    imported_resources.push(item);
                }
                None => diagnostics.push(Diagnostic::error(
                    "Cannot import non-existent remote object",
                    format!(
                        "While attempting to import an existing object to {}, the provider detected that no object exists with the given id ({})",
                        item.type_name, id
                    ),
                )),
            }
        }

        if !has_errors(&diagnostics) {
            tracing::info!(id = %id, count = imported_resources.len(), "imported resource state");
        }

        ImportResourceStateResponse {
            imported_resources,
            diagnostics,
        }
    }

    pub async fn validate_data_source_config(
        &self,
        ctx: &Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let data_source = match self.data_source_instance(&request.type_name) {
            Ok(data_source) => data_source,
            Err(diagnostics) => return ValidateDataSourceConfigResponse { diagnostics },
        };

        let schema = data_source.schema(ctx.clone(), DataSourceSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_block(
            &schema.schema.block,
            &request.config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );

        if !has_errors(&diagnostics) {
            diagnostics.extend(data_source.validate(ctx.clone(), request).await.diagnostics);
        }

        ValidateDataSourceConfigResponse { diagnostics }
    }

    pub async fn read_data_source(
        &self,
        ctx: &Context,
        request: ReadDataSourceRequest,
    ) -> ReadDataSourceResponse {
        let mut data_source = match self.data_source_instance(&request.type_name) {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        };

        let provider_data = self.provider_data.read().await.clone();
        let configured = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&configured.diagnostics) {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: configured.diagnostics,
            };
        }

        let mut response = data_source.read(ctx.clone(), request).await;
        let mut diagnostics = configured.diagnostics;
        diagnostics.append(&mut response.diagnostics);
        response.diagnostics = diagnostics;
        response
    }

    /// Carries stored state forward to the current schema. Attributes the
    /// schema no longer declares are dropped.
    pub async fn upgrade_resource_state(
        &self,
        ctx: &Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        let resource = match self.resource_instance(&request.type_name) {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return UpgradeResourceStateResponse {
                    upgraded_state: request.raw_state,
                    diagnostics,
                }
            }
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        if request.version > schema.schema.version {
            diagnostics.push(Diagnostic::error(
                "Resource state is newer than the provider",
                format!(
                    "State for {} was written with schema version {}, but this provider only supports up to version {}",
                    request.type_name, request.version, schema.schema.version
                ),
            ));
            return UpgradeResourceStateResponse {
                upgraded_state: request.raw_state,
                diagnostics,
            };
        }

        let block = &schema.schema.block;
        let mut upgraded_state = request.raw_state;
        if let Dynamic::Map(entries) = &mut upgraded_state.value {
            entries.retain(|name, _| {
                let declared = block.attribute(name).is_some() || block.nested_block(name).is_some();
                if !declared {
                    tracing::debug!(type_name = %request.type_name, attribute = %name, "dropping attribute missing from schema");
                }
                declared
            });
        }

        UpgradeResourceStateResponse {
            upgraded_state,
            diagnostics,
        }
    }

    fn resource_instance(&self, type_name: &str) -> Diagnosed<Box<dyn ResourceWithConfigure>> {
        self.resources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| {
                let err = TfplugError::ResourceNotFound(type_name.to_string());
                vec![Diagnostic::error(
                    err.to_string(),
                    "The provider does not register a resource with this type name",
                )]
            })
    }

    fn data_source_instance(&self, type_name: &str) -> Diagnosed<Box<dyn DataSourceWithConfigure>> {
        self.data_sources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| {
                let err = TfplugError::DataSourceNotFound(type_name.to_string());
                vec![Diagnostic::error(
                    err.to_string(),
                    "The provider does not register a data source with this type name",
                )]
            })
    }

    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Diagnosed<Box<dyn ResourceWithConfigure>> {
        let mut resource = self.resource_instance(type_name)?;
        let provider_data = self.provider_data.read().await.clone();

        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(resource)
    }
}

/// Whether a state names a remote object through a known `id`
fn has_identifier(state: &DynamicValue) -> bool {
    matches!(state.get(&AttributePath::new("id")), Some(Dynamic::String(id)) if !id.is_empty())
}

fn attribute_value(value: &DynamicValue, name: &str) -> Dynamic {
    value
        .get(&AttributePath::new(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

fn set_planned(
    planned: &mut DynamicValue,
    path: &AttributePath,
    value: Dynamic,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Err(e) = planned.set_value(path, value) {
        diagnostics.push(
            Diagnostic::error("Failed to plan attribute", e.to_string()).with_attribute(path.clone()),
        );
    }
}

/// Configuration values win; computed attributes left unset keep their prior value
fn propose_new_state(block: &Block, prior: &DynamicValue, config: &DynamicValue) -> DynamicValue {
    let mut proposed = HashMap::new();

    for attr in &block.attributes {
        let config_value = attribute_value(config, &attr.name);
        let value = if attr.computed && config_value.is_null() {
            attribute_value(prior, &attr.name)
        } else {
            config_value
        };
        proposed.insert(attr.name.clone(), value);
    }

    for nested in &block.block_types {
        let value = match (attribute_value(config, &nested.type_name), nested.nesting) {
            (Dynamic::Null, NestingMode::List | NestingMode::Set) => Dynamic::List(vec![]),
            (value, _) => value,
        };
        proposed.insert(nested.type_name.clone(), value);
    }

    DynamicValue::new(Dynamic::Map(proposed))
}

/// Top-level attributes and blocks whose values differ between two states
fn changed_paths(block: &Block, before: &DynamicValue, after: &DynamicValue) -> Vec<AttributePath> {
    let names = block
        .attributes
        .iter()
        .map(|a| a.name.as_str())
        .chain(block.block_types.iter().map(|b| b.type_name.as_str()));

    names
        .filter(|name| {
            let old = normalize_empty(attribute_value(before, name));
            let new = normalize_empty(attribute_value(after, name));
            !old.semantically_equal(&new)
        })
        .map(AttributePath::new)
        .collect()
}

/// Empty collections and null are the same for change detection
fn normalize_empty(value: Dynamic) -> Dynamic {
    match value {
        Dynamic::List(items) if items.is_empty() => Dynamic::Null,
        Dynamic::Map(entries) if entries.is_empty() => Dynamic::Null,
        other => other,
    }
}

fn validate_block(
    block: &Block,
    value: &Dynamic,
    prefix: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let entries = match value {
        Dynamic::Map(entries) => entries,
        Dynamic::Null => &empty,
        Dynamic::Unknown => return,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid configuration",
                    format!("Expected an object, got {}", other.type_name()),
                )
                .with_attribute(prefix.clone()),
            );
            return;
        }
    };

    for attr in &block.attributes {
        let path = prefix.clone().attribute(&attr.name);
        let value = entries.get(&attr.name).unwrap_or(&Dynamic::Null);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument \"{}\" is required, but no definition was found.",
                            path
                        ),
                    )
                    .with_attribute(path),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid Configuration for Read-Only Attribute",
                    format!(
                        "Cannot set value for \"{}\" as the provider has marked it as read-only. Remove the configuration line setting the value.",
                        path
                    ),
                )
                .with_attribute(path),
            );
            continue;
        }

        if !attr.r#type.accepts(value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute \"{}\": {} required, got {}.",
                        path,
                        attr.r#type,
                        value.type_name()
                    ),
                )
                .with_attribute(path),
            );
            continue;
        }

        if attr.deprecated {
            diagnostics.push(
                Diagnostic::warning(
                    "Attribute Deprecated",
                    format!("The attribute \"{}\" is deprecated.", path),
                )
                .with_attribute(path.clone()),
            );
        }

        if value.is_unknown() {
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(value.clone()),
                path: path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let path = prefix.clone().attribute(&nested.type_name);
        let items: Vec<&Dynamic> = match (entries.get(&nested.type_name), nested.nesting) {
            (None, _) | (Some(Dynamic::Null), _) => vec![],
            (Some(Dynamic::Unknown), _) => continue,
            (Some(Dynamic::List(items)), NestingMode::List | NestingMode::Set) => items.iter().collect(),
            (Some(single @ Dynamic::Map(_)), NestingMode::Single) => vec![single],
            (Some(other), _) => {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid block",
                        format!("Unexpected {} value for block \"{}\"", other.type_name(), path),
                    )
                    .with_attribute(path),
                );
                continue;
            }
        };

        let count = items.len() as i64;
        if nested.min_items > 0 && count < nested.min_items {
            diagnostics.push(
                Diagnostic::error(
                    format!("Insufficient {} blocks", nested.type_name),
                    format!(
                        "At least {} \"{}\" blocks are required.",
                        nested.min_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            diagnostics.push(
                Diagnostic::error(
                    format!("Too many {} blocks", nested.type_name),
                    format!(
                        "No more than {} \"{}\" blocks are allowed.",
                        nested.max_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }

        for (i, item) in items.into_iter().enumerate() {
            let item_path = match nested.nesting {
                NestingMode::Single => path.clone(),
                NestingMode::List | NestingMode::Set => path.clone().index(i as i64),
            };
            validate_block(&nested.block, item, &item_path, diagnostics);
        }
    }

    for key in entries.keys() {
        let known = block.attribute(key).is_some() || block.nested_block(key).is_some();
        if !known {
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here.", key),
                )
                .with_attribute(prefix.clone().attribute(key)),
            );
        }
    }
}
