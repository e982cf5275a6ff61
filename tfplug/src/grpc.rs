//! gRPC transport for Terraform plugin protocol 6
//!
//! [`PluginServer`] performs the go-plugin handshake on stdout and serves the
//! `tfplugin6.Provider` service on a loopback port. Every RPC is decoded into
//! framework types and handed to [`ProviderServer`]; results travel back as
//! msgpack.

use crate::context::Context;
use crate::data_source::{ReadDataSourceRequest, ValidateDataSourceConfigRequest};
use crate::error::{Result, TfplugError};
use crate::provider::{ConfigureProviderRequest, Provider};
use crate::proto;
use crate::resource::{ImportResourceStateRequest, ReadResourceRequest, ValidateResourceConfigRequest};
use crate::schema::{Attribute, AttributeType, Block, NestedBlock, NestingMode, Schema};
use crate::server::{
    ApplyResourceChangeRequest, PlanResourceChangeRequest, ProviderServer, UpgradeResourceStateRequest,
};
use crate::types::{
    AttributePath, AttributePathStep, ClientCapabilities, Diagnostic, DiagnosticSeverity,
    DynamicValue,
};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;
const PROTOCOL_VERSIONS_ENV: &str = "PLUGIN_PROTOCOL_VERSIONS";
const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

/// Terraform core sends schemas and states well above tonic's 4MB default
const MAX_MESSAGE_SIZE: usize = 256 << 20;

struct TlsFiles {
    cert_path: PathBuf,
    key_path: PathBuf,
}

pub struct PluginServer<P: Provider> {
    server: Arc<ProviderServer<P>>,
    tls: Option<TlsFiles>,
}

impl<P: Provider + 'static> PluginServer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            server: Arc::new(ProviderServer::new(provider)),
            tls: None,
        }
    }

    /// Serves TLS with the given PEM pair and advertises the certificate in
    /// the handshake. `PLUGIN_CLIENT_CERT`, when Terraform sets it, becomes the
    /// trusted client root.
    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Runs until SIGTERM. Fails before binding when the process was not
    /// launched by Terraform.
    pub async fn run(self) -> Result<()> {
        check_magic_cookie(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())?;
        check_protocol_versions(std::env::var(PROTOCOL_VERSIONS_ENV).ok().as_deref())?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mut builder = Server::builder();
        let mut handshake = handshake_line(&addr.to_string());
        if let Some(tls) = &self.tls {
            // Already installed when the host process set one up
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

            let cert = tokio::fs::read(&tls.cert_path).await?;
            let key = tokio::fs::read(&tls.key_path).await?;
            let advertised = advertised_certificate(&cert)?;

            let mut tls_config = ServerTlsConfig::new().identity(Identity::from_pem(&cert, key));
            if let Ok(client_cert) = std::env::var(CLIENT_CERT_ENV) {
                tls_config = tls_config.client_ca_root(Certificate::from_pem(client_cert));
            }
            builder = builder.tls_config(tls_config)?;
            handshake = format!("{}|{}", handshake, advertised);
        }

        let service = proto::ProviderServer::new(GrpcProvider::new(self.server))
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);

        // Terraform reads the handshake from the first line of stdout
        println!("{}", handshake);
        tracing::info!(address = %addr, tls = self.tls.is_some(), "plugin server listening");

        builder
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal())
            .await?;

        tracing::info!("plugin server stopped");
        Ok(())
    }
}

fn check_magic_cookie(value: Option<&str>) -> Result<()> {
    match value {
        Some(MAGIC_COOKIE_VALUE) => Ok(()),
        _ => Err(TfplugError::Custom(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

/// Terraform lists the protocol versions it speaks; unset means any
fn check_protocol_versions(value: Option<&str>) -> Result<()> {
    let Some(versions) = value else {
        return Ok(());
    };
    let wanted = PROTOCOL_VERSION.to_string();
    if versions.split(',').any(|v| v.trim() == wanted) {
        Ok(())
    } else {
        Err(TfplugError::Custom(format!(
            "Terraform requested plugin protocol versions {}, this provider speaks {}",
            versions, PROTOCOL_VERSION
        )))
    }
}

fn handshake_line(addr: &str) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    )
}

/// First certificate of a PEM bundle as unpadded base64 DER
fn advertised_certificate(pem: &[u8]) -> Result<String> {
    let der = CertificateDer::from_pem_slice(pem)
        .map_err(|e| TfplugError::TlsError(format!("reading server certificate: {:?}", e)))?;
    Ok(STANDARD_NO_PAD.encode(der.as_ref()))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        // Interrupts go to Terraform, which stops its plugins itself
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}

/// `tfplugin6.Provider` service backed by a [`ProviderServer`]
pub struct GrpcProvider<P: Provider> {
    server: Arc<ProviderServer<P>>,
}

impl<P: Provider> GrpcProvider<P> {
    pub fn new(server: Arc<ProviderServer<P>>) -> Self {
        Self { server }
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProvider<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let resources = self
            .server
            .resource_types()
            .into_iter()
            .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
            .collect();
        let data_sources = self
            .server
            .data_source_types()
            .into_iter()
            .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
            .collect();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources,
            resources,
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let schemas = self.server.schemas(&Context::new()).await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&schemas.provider)),
            resource_schemas: schemas
                .resources
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            data_source_schemas: schemas
                .data_sources
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            diagnostics: diagnostics_to_proto(schemas.diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let diagnostics = self
            .server
            .validate_provider_config(&Context::new(), &config)
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let response = self
            .server
            .validate_resource_config(
                &Context::new(),
                ValidateResourceConfigRequest {
                    type_name: request.type_name,
                    config,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let response = self
            .server
            .validate_data_source_config(
                &Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: request.type_name,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let request = request.into_inner();
        let raw_state = match request.raw_state {
            Some(raw) if !raw.json.is_empty() => DynamicValue::decode_json(&raw.json)
                .map_err(|e| Status::invalid_argument(e.to_string()))?,
            Some(raw) if !raw.flatmap.is_empty() => {
                let diagnostic = Diagnostic::error(
                    "Unsupported state format",
                    format!(
                        "The stored state for {} uses the legacy flatmap format, which this provider cannot read",
                        request.type_name
                    ),
                );
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(vec![diagnostic]),
                }));
            }
            _ => DynamicValue::null(),
        };

        let response = self
            .server
            .upgrade_resource_state(
                &Context::new(),
                UpgradeResourceStateRequest {
                    type_name: request.type_name,
                    version: request.version,
                    raw_state,
                },
            )
            .await;

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_value(&response.upgraded_state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let diagnostics = self
            .server
            .configure(
                &Context::new(),
                ConfigureProviderRequest {
                    terraform_version: request.terraform_version,
                    config,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let request = request.into_inner();
        let current_state = decode_value(request.current_state.as_ref())?;
        let result = self
            .server
            .read_resource(
                &Context::new(),
                ReadResourceRequest {
                    type_name: request.type_name,
                    current_state,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        // A null new state tells Terraform the object is gone
        let new_state = result.new_state.unwrap_or_else(DynamicValue::null);
        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_value(&new_state)?),
            diagnostics: diagnostics_to_proto(result.diagnostics),
            private: request.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let request = request.into_inner();
        let prior_state = decode_value(request.prior_state.as_ref())?;
        let config = decode_value(request.config.as_ref())?;
        let response = self
            .server
            .plan_resource_change(
                &Context::new(),
                PlanResourceChangeRequest {
                    type_name: request.type_name,
                    prior_state,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_value(&response.planned_state)?),
            requires_replace: response.requires_replace.iter().map(path_to_proto).collect(),
            planned_private: request.prior_private,
            diagnostics: diagnostics_to_proto(response.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        let prior_state = decode_value(request.prior_state.as_ref())?;
        let planned_state = decode_value(request.planned_state.as_ref())?;
        let config = decode_value(request.config.as_ref())?;
        let response = self
            .server
            .apply_resource_change(
                &Context::new(),
                ApplyResourceChangeRequest {
                    type_name: request.type_name,
                    prior_state,
                    planned_state,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_value(&response.new_state)?),
            private: request.planned_private,
            diagnostics: diagnostics_to_proto(response.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let request = request.into_inner();
        let response = self
            .server
            .import_resource_state(
                &Context::new(),
                ImportResourceStateRequest {
                    type_name: request.type_name,
                    id: request.id,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        let imported_resources = response
            .imported_resources
            .into_iter()
            .map(|item| {
                Ok(proto::import_resource_state::ImportedResource {
                    type_name: item.type_name,
                    state: Some(encode_value(&item.state)?),
                    private: vec![],
                })
            })
            .collect::<std::result::Result<Vec<_>, Status>>()?;

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let response = self
            .server
            .read_data_source(
                &Context::new(),
                ReadDataSourceRequest {
                    type_name: request.type_name,
                    config,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&response.state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("stop requested");
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn client_capabilities(capabilities: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    capabilities
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

/// Msgpack wins when both encodings are present; neither means null
#[allow(clippy::result_large_err)]
fn decode_value(value: Option<&proto::DynamicValue>) -> std::result::Result<DynamicValue, Status> {
    let decoded = match value {
        Some(v) if !v.msgpack.is_empty() => DynamicValue::decode_msgpack(&v.msgpack),
        Some(v) if !v.json.is_empty() => DynamicValue::decode_json(&v.json),
        _ => Ok(DynamicValue::null()),
    };
    decoded.map_err(|e| Status::invalid_argument(e.to_string()))
}

#[allow(clippy::result_large_err)]
fn encode_value(value: &DynamicValue) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|e| Status::internal(e.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| {
            let severity = match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            };
            proto::Diagnostic {
                severity: severity as i32,
                summary: d.summary,
                detail: d.detail,
                attribute: d.attribute.as_ref().map(path_to_proto),
            }
        })
        .collect()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    let steps = path
        .steps
        .iter()
        .map(|step| proto::attribute_path::Step {
            selector: Some(match step {
                AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                AttributePathStep::ElementKeyString(key) => Selector::ElementKeyString(key.clone()),
                AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
            }),
        })
        .collect();
    proto::AttributePath { steps }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block, schema.version)),
    }
}

fn block_to_proto(block: &Block, version: i64) -> proto::schema::Block {
    proto::schema::Block {
        version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: block.block_types.iter().map(nested_block_to_proto).collect(),
        description: block.description.clone(),
        description_kind: proto::StringKind::Plain as i32,
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attribute: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attribute.name.clone(),
        r#type: cty_type(&attribute.r#type).to_string().into_bytes(),
        description: attribute.description.clone(),
        required: attribute.required,
        optional: attribute.optional,
        computed: attribute.computed,
        sensitive: attribute.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attribute.deprecated,
        write_only: false,
    }
}

fn nested_block_to_proto(nested: &NestedBlock) -> proto::schema::NestedBlock {
    use proto::schema::nested_block::NestingMode as ProtoNesting;

    let nesting = match nested.nesting {
        NestingMode::Single => ProtoNesting::Single,
        NestingMode::List => ProtoNesting::List,
        NestingMode::Set => ProtoNesting::Set,
    };
    proto::schema::NestedBlock {
        type_name: nested.type_name.clone(),
        block: Some(block_to_proto(&nested.block, 0)),
        nesting: nesting as i32,
        min_items: nested.min_items,
        max_items: nested.max_items,
    }
}

/// Type constraint in cty's JSON notation
fn cty_type(attribute_type: &AttributeType) -> Value {
    match attribute_type {
        AttributeType::String => json!("string"),
        AttributeType::Number => json!("number"),
        AttributeType::Bool => json!("bool"),
        AttributeType::List(elem) => json!(["list", cty_type(elem)]),
        AttributeType::Set(elem) => json!(["set", cty_type(elem)]),
        AttributeType::Map(elem) => json!(["map", cty_type(elem)]),
        AttributeType::Object(fields) => {
            let fields: serde_json::Map<String, Value> = fields
                .iter()
                .map(|(name, field)| (name.clone(), cty_type(field)))
                .collect();
            json!(["object", fields])
        }
    }
}
