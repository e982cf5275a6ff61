#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use aws::api::ec2::DescribePrefixListsRequest;
use aws::api::{Client, Endpoints, RetryConfig};
use mockito::{Matcher, Server};
use serde_json::json;
use tfplug::context::Context;
use tfplug::data_source::ReadDataSourceRequest;
use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

fn client(url: &str) -> Client {
    let endpoints = Endpoints {
        default: Some(url.to_string()),
        ..Default::default()
    };
    let retry_config = RetryConfig {
        max_retries: 0,
        timeout_seconds: 5,
        ..Default::default()
    };
    Client::with_config(common::REGION, endpoints, false, retry_config).unwrap()
}

fn s3_prefix_list() -> serde_json::Value {
    json!({
        "PrefixListId": "pl-68a54001",
        "PrefixListName": "com.amazonaws.us-west-2.s3",
        "Cidrs": ["52.92.16.0/20", "52.218.128.0/17"],
    })
}

fn read_request(config: serde_json::Value) -> ReadDataSourceRequest {
    ReadDataSourceRequest {
        type_name: "aws_prefix_list".to_string(),
        config: DynamicValue::from_json(config),
        client_capabilities: ClientCapabilities::default(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn describe_follows_next_token() {
    let mut server = Server::new_async().await;
    let first_page = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .match_body(Matcher::Json(json!({})))
        .with_status(200)
        .with_body(json!({"PrefixLists": [s3_prefix_list()], "NextToken": "t2"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let second_page = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .match_body(Matcher::PartialJson(json!({"NextToken": "t2"})))
        .with_status(200)
        .with_body(
            json!({"PrefixLists": [{
                "PrefixListId": "pl-4ea54027",
                "PrefixListName": "com.amazonaws.us-west-2.dynamodb",
                "Cidrs": ["52.94.24.0/23"],
            }]})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let lists = client
        .ec2()
        .describe_all_prefix_lists(&DescribePrefixListsRequest::default())
        .await
        .unwrap();

    first_page.assert_async().await;
    second_page.assert_async().await;
    let ids: Vec<&str> = lists.iter().map(|l| l.prefix_list_id.as_str()).collect();
    assert_eq!(ids, vec!["pl-68a54001", "pl-4ea54027"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn read_by_name_fills_cidr_blocks() {
    let mut server = Server::new_async().await;
    let describe_mock = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .match_body(Matcher::Json(json!({
            "Filters": [{"Name": "prefix-list-name", "Values": ["com.amazonaws.us-west-2.s3"]}],
        })))
        .with_status(200)
        .with_body(json!({"PrefixLists": [s3_prefix_list()]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let data_source = common::configured_data_source("aws_prefix_list", &server.url()).await;
    let response = data_source
        .read(
            Context::new(),
            read_request(json!({"name": "com.amazonaws.us-west-2.s3"})),
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    describe_mock.assert_async().await;
    assert_eq!(
        response.state.get_string(&AttributePath::new("id")).unwrap(),
        "pl-68a54001"
    );
    assert_eq!(
        response.state.get_list(&AttributePath::new("cidr_blocks")).unwrap(),
        vec![
            Dynamic::String("52.92.16.0/20".to_string()),
            Dynamic::String("52.218.128.0/17".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_prefix_list_id_matches_nothing() {
    let mut server = Server::new_async().await;
    let _describe = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .with_status(400)
        .with_body(common::error_body(
            "InvalidPrefixListID.NotFound",
            "The prefix list ID 'pl-00000000' does not exist",
        ))
        .create_async()
        .await;

    let data_source = common::configured_data_source("aws_prefix_list", &server.url()).await;
    let response = data_source
        .read(Context::new(), read_request(json!({"prefix_list_id": "pl-00000000"})))
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].detail, "no matching EC2 Prefix List found");
}

#[tokio::test(flavor = "multi_thread")]
async fn several_matches_are_rejected() {
    let mut server = Server::new_async().await;
    let _describe = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .with_status(200)
        .with_body(
            json!({"PrefixLists": [
                s3_prefix_list(),
                {"PrefixListId": "pl-4ea54027", "PrefixListName": "com.amazonaws.us-west-2.dynamodb"},
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let data_source = common::configured_data_source("aws_prefix_list", &server.url()).await;
    let response = data_source
        .read(
            Context::new(),
            read_request(json!({"filter": [{"name": "owner-id", "values": ["AWS"]}]})),
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0]
        .detail
        .starts_with("multiple EC2 Prefix Lists matched"));
}

#[tokio::test(flavor = "multi_thread")]
async fn other_describe_errors_are_reported() {
    let mut server = Server::new_async().await;
    let _describe = server
        .mock("POST", "/")
        .match_header("x-amz-target", "AmazonEC2.DescribePrefixLists")
        .with_status(403)
        .with_body(common::error_body("UnauthorizedOperation", "not allowed"))
        .create_async()
        .await;

    let data_source = common::configured_data_source("aws_prefix_list", &server.url()).await;
    let response = data_source
        .read(Context::new(), read_request(json!({})))
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "reading EC2 Prefix List");
    assert!(response.diagnostics[0].detail.contains("UnauthorizedOperation"));
}
