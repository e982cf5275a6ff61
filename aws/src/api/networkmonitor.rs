//! CloudWatch Network Monitor API (REST-JSON)

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::client::{Client, Service};
use super::error::ApiError;

pub const MONITOR_STATE_PENDING: &str = "PENDING";
pub const MONITOR_STATE_ACTIVE: &str = "ACTIVE";
pub const MONITOR_STATE_INACTIVE: &str = "INACTIVE";
pub const MONITOR_STATE_DELETING: &str = "DELETING";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMonitorRequest {
    pub monitor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_period: Option<i64>,
    pub client_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMonitorRequest {
    pub aggregation_period: i64,
}

/// Monitor as returned by create, get and update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub monitor_arn: String,
    pub monitor_name: String,
    pub state: String,
    #[serde(default)]
    pub aggregation_period: Option<i64>,
}

pub struct NetworkMonitorApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkMonitorApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn monitor_path(name: &str) -> String {
        format!("/monitors/{}", urlencoding::encode(name))
    }

    pub async fn create_monitor(&self, request: &CreateMonitorRequest) -> Result<Monitor, ApiError> {
        self.client
            .rest_json(Service::NetworkMonitor, Method::POST, "/monitors", Some(request))
            .await
    }

    pub async fn get_monitor(&self, name: &str) -> Result<Monitor, ApiError> {
        self.client
            .rest_json(
                Service::NetworkMonitor,
                Method::GET,
                &Self::monitor_path(name),
                None::<&()>,
            )
            .await
    }

    pub async fn update_monitor(
        &self,
        name: &str,
        request: &UpdateMonitorRequest,
    ) -> Result<Monitor, ApiError> {
        self.client
            .rest_json(
                Service::NetworkMonitor,
                Method::PATCH,
                &Self::monitor_path(name),
                Some(request),
            )
            .await
    }

    pub async fn delete_monitor(&self, name: &str) -> Result<(), ApiError> {
        let _: serde::de::IgnoredAny = self
            .client
            .rest_json(
                Service::NetworkMonitor,
                Method::DELETE,
                &Self::monitor_path(name),
                None::<&()>,
            )
            .await?;
        Ok(())
    }
}
