//! EC2 API, prefix list operations only
//!
//! Requests use the JSON-RPC framing (`AmazonEC2.<Operation>`) shared with the
//! other services rather than EC2's native query/XML protocol.

use serde::{Deserialize, Serialize};

use super::client::{Client, Service};
use super::error::ApiError;

pub const ERR_CODE_INVALID_PREFIX_LIST_ID_NOT_FOUND: &str = "InvalidPrefixListID.NotFound";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: &str, values: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribePrefixListsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefix_list_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrefixList {
    pub prefix_list_id: String,
    #[serde(default)]
    pub prefix_list_name: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribePrefixListsResponse {
    #[serde(default)]
    pub prefix_lists: Vec<PrefixList>,
    pub next_token: Option<String>,
}

pub struct Ec2Api<'a> {
    client: &'a Client,
}

impl<'a> Ec2Api<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn describe_prefix_lists(
        &self,
        request: &DescribePrefixListsRequest,
    ) -> Result<DescribePrefixListsResponse, ApiError> {
        self.client
            .json_rpc(Service::Ec2, "DescribePrefixLists", request)
            .await
    }

    /// Follows `NextToken` until every page has been read
    pub async fn describe_all_prefix_lists(
        &self,
        request: &DescribePrefixListsRequest,
    ) -> Result<Vec<PrefixList>, ApiError> {
        let mut request = request.clone();
        let mut prefix_lists = Vec::new();

        loop {
            let page = self.describe_prefix_lists(&request).await?;
            prefix_lists.extend(page.prefix_lists);

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    tracing::debug!(fetched = prefix_lists.len(), "fetching next page of prefix lists");
                    request.next_token = Some(token);
                }
                None => return Ok(prefix_lists),
            }
        }
    }
}
