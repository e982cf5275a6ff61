//! Resource Explorer 2 API (REST-JSON, every operation is a POST)

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::client::{Client, Service};
use super::error::ApiError;

pub const INDEX_STATE_CREATING: &str = "CREATING";
pub const INDEX_STATE_ACTIVE: &str = "ACTIVE";
pub const INDEX_STATE_UPDATING: &str = "UPDATING";
pub const INDEX_STATE_DELETING: &str = "DELETING";
pub const INDEX_STATE_DELETED: &str = "DELETED";

pub const INDEX_TYPE_LOCAL: &str = "LOCAL";
pub const INDEX_TYPE_AGGREGATOR: &str = "AGGREGATOR";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateIndexRequest<'a> {
    client_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateIndexResponse {
    pub arn: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Index {
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub state: String,
    #[serde(rename = "Type", default)]
    pub index_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateIndexTypeRequest<'a> {
    arn: &'a str,
    #[serde(rename = "Type")]
    index_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteIndexRequest<'a> {
    arn: &'a str,
}

#[derive(Debug, Serialize)]
struct EmptyRequest {}

pub struct ResourceExplorer2Api<'a> {
    client: &'a Client,
}

impl<'a> ResourceExplorer2Api<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    async fn post<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.client
            .rest_json(
                Service::ResourceExplorer2,
                Method::POST,
                &format!("/{}", operation),
                Some(body),
            )
            .await
    }

    pub async fn create_index(&self, client_token: &str) -> Result<CreateIndexResponse, ApiError> {
        self.post("CreateIndex", &CreateIndexRequest { client_token })
            .await
    }

    /// The index in the client's region
    pub async fn get_index(&self) -> Result<Index, ApiError> {
        self.post("GetIndex", &EmptyRequest {}).await
    }

    pub async fn update_index_type(&self, arn: &str, index_type: &str) -> Result<Index, ApiError> {
        self.post("UpdateIndexType", &UpdateIndexTypeRequest { arn, index_type })
            .await
    }

    pub async fn delete_index(&self, arn: &str) -> Result<Index, ApiError> {
        self.post("DeleteIndex", &DeleteIndexRequest { arn }).await
    }
}
