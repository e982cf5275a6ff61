#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use aws::AwsProvider;
use mockito::Server;
use serde_json::json;
use std::sync::Arc;
use tfplug::grpc::GrpcProvider;
use tfplug::proto::{self, ProviderService};
use tfplug::server::ProviderServer;
use tfplug::types::{AttributePath, DynamicValue};
use tonic::{Code, Request};

const INDEX_ARN: &str = "arn:aws:resource-explorer-2:us-west-2:123456789012:index/1c1b2f9e";

fn msgpack(value: serde_json::Value) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: DynamicValue::from_json(value).encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn decode(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

fn service() -> GrpcProvider<AwsProvider> {
    GrpcProvider::new(Arc::new(ProviderServer::new(AwsProvider::new())))
}

async fn configured_service(url: &str) -> GrpcProvider<AwsProvider> {
    let service = service();
    let response = service
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: msgpack(json!({
                "region": common::REGION,
                "endpoint": url,
                "endpoints": null,
                "max_retries": 0,
                "insecure": null,
            })),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    service
}

#[tokio::test]
async fn metadata_and_schema_cover_registered_types() {
    let service = service();

    let metadata = service
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();
    assert!(metadata
        .resources
        .iter()
        .any(|r| r.type_name == "aws_resourceexplorer2_index"));
    assert!(metadata.server_capabilities.unwrap().plan_destroy);

    let schema = service
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();
    assert!(schema.diagnostics.is_empty(), "{:?}", schema.diagnostics);
    assert!(schema.resource_schemas.contains_key("aws_kms_replica_key"));
    assert_eq!(schema.data_source_schemas.len(), metadata.data_sources.len());

    let provider_block = schema.provider.unwrap().block.unwrap();
    let endpoints = provider_block
        .attributes
        .iter()
        .find(|a| a.name == "endpoints")
        .unwrap();
    assert_eq!(endpoints.r#type, br#"["map","string"]"#.to_vec());
}

#[tokio::test(flavor = "multi_thread")]
async fn index_plan_and_apply_over_the_wire() {
    let mut server = Server::new_async().await;
    let create_mock = server
        .mock("POST", "/CreateIndex")
        .with_status(200)
        .with_body(json!({"Arn": INDEX_ARN, "State": "CREATING"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _get = server
        .mock("POST", "/GetIndex")
        .with_status(200)
        .with_body(json!({"Arn": INDEX_ARN, "State": "ACTIVE", "Type": "LOCAL"}).to_string())
        .create_async()
        .await;

    let service = configured_service(&server.url()).await;
    let config = json!({"arn": null, "id": null, "type": "LOCAL"});

    let plan = service
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "aws_resourceexplorer2_index".to_string(),
            prior_state: None,
            proposed_new_state: msgpack(config.clone()),
            config: msgpack(config.clone()),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    // Unknown arn travels as cty's msgpack extension
    let planned = plan.planned_state.unwrap();
    assert!(planned.msgpack.windows(3).any(|w| w == [0xd4, 0x00, 0x00]));
    let planned_value = DynamicValue::decode_msgpack(&planned.msgpack).unwrap();
    assert!(planned_value.get(&AttributePath::new("arn")).unwrap().is_unknown());

    let applied = service
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "aws_resourceexplorer2_index".to_string(),
            prior_state: None,
            planned_state: Some(planned),
            config: msgpack(config),
            planned_private: b"{}".to_vec(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    assert_eq!(applied.private, b"{}".to_vec());

    create_mock.assert_async().await;
    let new_state = decode(applied.new_state);
    assert_eq!(new_state.get_string(&AttributePath::new("arn")).unwrap(), INDEX_ARN);
    assert!(new_state.value.is_fully_known());
}

#[tokio::test]
async fn config_errors_come_back_as_diagnostics() {
    let service = service();

    let response = service
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "aws_resourceexplorer2_index".to_string(),
            config: msgpack(json!({"arn": null, "id": null, "type": "GLOBAL"})),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.diagnostics.len(), 1);
    let diagnostic = &response.diagnostics[0];
    assert_eq!(diagnostic.severity, proto::diagnostic::Severity::Error as i32);
    assert_eq!(
        diagnostic.attribute.as_ref().unwrap().steps[0].selector,
        Some(proto::attribute_path::step::Selector::AttributeName("type".to_string()))
    );

    let unknown_type = service
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "aws_nope".to_string(),
            config: msgpack(json!({})),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(unknown_type.diagnostics[0].summary, "Resource type not found: aws_nope");
}

#[tokio::test]
async fn undecodable_state_is_rejected() {
    let service = service();

    let status = service
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "aws_resourceexplorer2_index".to_string(),
            current_state: Some(proto::DynamicValue {
                msgpack: vec![0xc1],
                json: vec![],
            }),
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn stored_json_state_is_upgraded_to_msgpack() {
    let service = service();

    let response = service
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "aws_resourceexplorer2_index".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: json!({"arn": INDEX_ARN, "id": INDEX_ARN, "type": "LOCAL", "tags": {}})
                    .to_string()
                    .into_bytes(),
                flatmap: Default::default(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    let upgraded = decode(response.upgraded_state);
    assert_eq!(
        upgraded.to_json().unwrap(),
        json!({"arn": INDEX_ARN, "id": INDEX_ARN, "type": "LOCAL"})
    );
}
