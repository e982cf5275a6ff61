//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;
use tfplug::types::Diagnostic;

#[derive(Clone)]
pub struct AwsProviderData {
    pub client: Arc<Client>,
}

impl AwsProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Extracts the provider data handed to a resource or data source.
    /// `None` leaves the component unconfigured without an error.
    pub fn from_configure(
        provider_data: Option<Arc<dyn std::any::Any + Send + Sync>>,
    ) -> (Option<Self>, Vec<Diagnostic>) {
        let Some(data) = provider_data else {
            return (None, vec![]);
        };

        match data.downcast_ref::<AwsProviderData>() {
            Some(provider_data) => (Some(provider_data.clone()), vec![]),
            None => (
                None,
                vec![Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AwsProviderData from provider data",
                )],
            ),
        }
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}
