#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use tfplug::context::Context;
use tfplug::resource::{
    CreateResourceRequest, DeleteResourceRequest, ImportResourceStateRequest, ReadResourceRequest,
};
use tfplug::types::{AttributePath, ClientCapabilities, DiagnosticSeverity, DynamicValue};

const APPLICATION_ARN: &str = "arn:aws:sso::123456789012:application/ssoins-1/apl-1";
const ASSIGNMENT_ID: &str =
    "arn:aws:sso::123456789012:application/ssoins-1/apl-1,906745c1f8-e2b7a1d2,USER";

fn assignment_state() -> DynamicValue {
    DynamicValue::from_json(json!({
        "id": ASSIGNMENT_ID,
        "application_arn": APPLICATION_ARN,
        "principal_id": "906745c1f8-e2b7a1d2",
        "principal_type": "USER",
    }))
}

fn assignment_body() -> serde_json::Value {
    json!({
        "ApplicationArn": APPLICATION_ARN,
        "PrincipalId": "906745c1f8-e2b7a1d2",
        "PrincipalType": "USER",
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn create_assigns_principal_and_sets_id() {
    let mut server = Server::new_async().await;
    let create_mock = server
        .mock("POST", "/")
        .match_header("x-amz-target", "SWBExternalService.CreateApplicationAssignment")
        .match_body(Matcher::Json(assignment_body()))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", &server.url()).await;
    let planned = DynamicValue::from_json(json!({
        "application_arn": APPLICATION_ARN,
        "principal_id": "906745c1f8-e2b7a1d2",
        "principal_type": "USER",
    }));

    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                planned_state: planned.clone(),
                config: planned,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    create_mock.assert_async().await;
    assert_eq!(
        response.new_state.get_string(&AttributePath::new("id")).unwrap(),
        ASSIGNMENT_ID
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn read_refreshes_from_composite_id() {
    let mut server = Server::new_async().await;
    let describe_mock = server
        .mock("POST", "/")
        .match_header("x-amz-target", "SWBExternalService.DescribeApplicationAssignment")
        .match_body(Matcher::Json(assignment_body()))
        .with_status(200)
        .with_body(assignment_body().to_string())
        .expect(1)
        .create_async()
        .await;

    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", &server.url()).await;
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                current_state: DynamicValue::from_json(json!({"id": ASSIGNMENT_ID})),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    describe_mock.assert_async().await;
    let state = response.new_state.unwrap();
    assert_eq!(
        state.get_string(&AttributePath::new("application_arn")).unwrap(),
        APPLICATION_ARN
    );
    assert_eq!(state.get_string(&AttributePath::new("principal_type")).unwrap(), "USER");
}

#[tokio::test(flavor = "multi_thread")]
async fn read_removes_missing_assignment() {
    let mut server = Server::new_async().await;
    let _describe = server
        .mock("POST", "/")
        .match_header("x-amz-target", "SWBExternalService.DescribeApplicationAssignment")
        .with_status(400)
        .with_body(common::error_body(
            "ResourceNotFoundException",
            "assignment does not exist",
        ))
        .create_async()
        .await;

    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", &server.url()).await;
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                current_state: assignment_state(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.new_state.is_none());
    assert_eq!(response.diagnostics[0].severity, DiagnosticSeverity::Warning);
}

#[tokio::test]
async fn read_rejects_malformed_id() {
    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", "http://127.0.0.1:1").await;
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                current_state: DynamicValue::from_json(json!({"id": "only,two"})),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.new_state.is_some());
    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].is_error());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_of_missing_assignment_succeeds() {
    let mut server = Server::new_async().await;
    let delete_mock = server
        .mock("POST", "/")
        .match_header("x-amz-target", "SWBExternalService.DeleteApplicationAssignment")
        .with_status(400)
        .with_body(common::error_body("ResourceNotFoundException", "gone"))
        .expect(1)
        .create_async()
        .await;

    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", &server.url()).await;
    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                prior_state: assignment_state(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    delete_mock.assert_async().await;
}

#[tokio::test]
async fn import_validates_composite_id() {
    let resource =
        common::configured_resource("aws_ssoadmin_application_assignment", "http://127.0.0.1:1").await;

    let rejected = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                id: format!("{},,USER", APPLICATION_ARN),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(rejected.imported_resources.is_empty());
    assert!(rejected.diagnostics[0].is_error());

    let accepted = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "aws_ssoadmin_application_assignment".to_string(),
                id: ASSIGNMENT_ID.to_string(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(accepted.diagnostics.is_empty());
    assert_eq!(
        accepted.imported_resources[0]
            .state
            .get_string(&AttributePath::new("id"))
            .unwrap(),
        ASSIGNMENT_ID
    );
}
