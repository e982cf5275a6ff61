//! AWS Key Management Service API (JSON-RPC, `TrentService`)

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::client::{Client, Service};
use super::error::ApiError;

pub const KEY_STATE_CREATING: &str = "Creating";
pub const KEY_STATE_ENABLED: &str = "Enabled";
pub const KEY_STATE_DISABLED: &str = "Disabled";
pub const KEY_STATE_PENDING_DELETION: &str = "PendingDeletion";

pub const KEY_MANAGER_CUSTOMER: &str = "CUSTOMER";
pub const ORIGIN_AWS_KMS: &str = "AWS_KMS";
pub const MULTI_REGION_KEY_TYPE_REPLICA: &str = "REPLICA";

pub const DEFAULT_POLICY_NAME: &str = "default";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyMetadata {
    #[serde(default)]
    pub arn: String,
    pub key_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub key_manager: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub key_spec: String,
    #[serde(default)]
    pub key_usage: String,
    #[serde(default)]
    pub key_state: String,
    #[serde(default)]
    pub multi_region: bool,
    #[serde(default)]
    pub multi_region_configuration: Option<MultiRegionConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiRegionConfiguration {
    #[serde(default)]
    pub multi_region_key_type: String,
    pub primary_key: Option<MultiRegionKey>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiRegionKey {
    pub arn: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicateKeyRequest {
    pub key_id: String,
    pub replica_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    pub bypass_policy_lockout_safety_check: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicateKeyResponse {
    pub replica_key_metadata: KeyMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyIdRequest<'a> {
    key_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeKeyResponse {
    key_metadata: KeyMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetKeyPolicyRequest<'a> {
    key_id: &'a str,
    policy_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetKeyPolicyResponse {
    #[serde(default)]
    policy: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetKeyRotationStatusResponse {
    #[serde(default)]
    key_rotation_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateKeyDescriptionRequest<'a> {
    key_id: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutKeyPolicyRequest<'a> {
    key_id: &'a str,
    policy_name: &'a str,
    policy: &'a str,
    bypass_policy_lockout_safety_check: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScheduleKeyDeletionRequest<'a> {
    key_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_window_in_days: Option<i64>,
}

pub struct KmsApi<'a> {
    client: &'a Client,
}

impl<'a> KmsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Replication is initiated in the primary key's region
    pub async fn replicate_key(
        &self,
        primary_region: &str,
        request: &ReplicateKeyRequest,
    ) -> Result<ReplicateKeyResponse, ApiError> {
        self.client
            .json_rpc_in_region(Service::Kms, primary_region, "ReplicateKey", request)
            .await
    }

    pub async fn describe_key(&self, key_id: &str) -> Result<KeyMetadata, ApiError> {
        let response: DescribeKeyResponse = self
            .client
            .json_rpc(Service::Kms, "DescribeKey", &KeyIdRequest { key_id })
            .await?;
        Ok(response.key_metadata)
    }

    pub async fn get_key_policy(&self, key_id: &str) -> Result<String, ApiError> {
        let request = GetKeyPolicyRequest {
            key_id,
            policy_name: DEFAULT_POLICY_NAME,
        };
        let response: GetKeyPolicyResponse = self
            .client
            .json_rpc(Service::Kms, "GetKeyPolicy", &request)
            .await?;
        Ok(response.policy)
    }

    pub async fn get_key_rotation_status(&self, key_id: &str) -> Result<bool, ApiError> {
        let response: GetKeyRotationStatusResponse = self
            .client
            .json_rpc(Service::Kms, "GetKeyRotationStatus", &KeyIdRequest { key_id })
            .await?;
        Ok(response.key_rotation_enabled)
    }

    pub async fn enable_key(&self, key_id: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::Kms, "EnableKey", &KeyIdRequest { key_id })
            .await?;
        Ok(())
    }

    pub async fn disable_key(&self, key_id: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::Kms, "DisableKey", &KeyIdRequest { key_id })
            .await?;
        Ok(())
    }

    pub async fn update_key_description(&self, key_id: &str, description: &str) -> Result<(), ApiError> {
        let request = UpdateKeyDescriptionRequest {
            key_id,
            description,
        };
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::Kms, "UpdateKeyDescription", &request)
            .await?;
        Ok(())
    }

    pub async fn put_key_policy(
        &self,
        key_id: &str,
        policy: &str,
        bypass_policy_lockout_safety_check: bool,
    ) -> Result<(), ApiError> {
        let request = PutKeyPolicyRequest {
            key_id,
            policy_name: DEFAULT_POLICY_NAME,
            policy,
            bypass_policy_lockout_safety_check,
        };
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::Kms, "PutKeyPolicy", &request)
            .await?;
        Ok(())
    }

    pub async fn schedule_key_deletion(
        &self,
        key_id: &str,
        pending_window_in_days: Option<i64>,
    ) -> Result<(), ApiError> {
        let request = ScheduleKeyDeletionRequest {
            key_id,
            pending_window_in_days,
        };
        let _: IgnoredAny = self
            .client
            .json_rpc(Service::Kms, "ScheduleKeyDeletion", &request)
            .await?;
        Ok(())
    }
}
