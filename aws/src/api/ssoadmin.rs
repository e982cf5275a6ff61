//! IAM Identity Center (SSO Admin) API (JSON-RPC, `SWBExternalService`)

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::client::{Client, Service};
use super::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationAssignment {
    pub application_arn: String,
    pub principal_id: String,
    pub principal_type: String,
}

pub struct SsoAdminApi<'a> {
    client: &'a Client,
}

impl<'a> SsoAdminApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_application_assignment(
        &self,
        assignment: &ApplicationAssignment,
    ) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::SsoAdmin, "CreateApplicationAssignment", assignment)
            .await?;
        Ok(())
    }

    pub async fn describe_application_assignment(
        &self,
        assignment: &ApplicationAssignment,
    ) -> Result<ApplicationAssignment, ApiError> {
        self.client
            .json_rpc(Service::SsoAdmin, "DescribeApplicationAssignment", assignment)
            .await
    }

    pub async fn delete_application_assignment(
        &self,
        assignment: &ApplicationAssignment,
    ) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::SsoAdmin, "DeleteApplicationAssignment", assignment)
            .await?;
        Ok(())
    }
}
