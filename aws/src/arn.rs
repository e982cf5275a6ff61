//! Amazon Resource Names

use std::fmt;
use tfplug::schema::{Validator, ValidatorRequest, ValidatorResponse};
use tfplug::types::Diagnostic;

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid ARN ({0})")]
pub struct ArnError(String);

/// `arn:partition:service:region:account-id:resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(value: &str) -> Result<Self, ArnError> {
        let parts: Vec<&str> = value.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(ArnError(format!("{}: expected 6 colon-separated sections", value)));
        }
        if parts[1].is_empty() || parts[2].is_empty() || parts[5].is_empty() {
            return Err(ArnError(format!(
                "{}: partition, service and resource must not be empty",
                value
            )));
        }

        Ok(Self {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Validates that a string attribute holds an ARN
pub struct ArnValidator;

impl ArnValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for ArnValidator {
    fn description(&self) -> String {
        "value must be a valid ARN".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(value) = request.config_value.value.as_str() else {
            return ValidatorResponse::default();
        };

        match Arn::parse(value) {
            Ok(_) => ValidatorResponse::default(),
            Err(e) => ValidatorResponse {
                diagnostics: vec![Diagnostic::error(
                    format!("Invalid ARN for {}", request.path),
                    e.to_string(),
                )
                .with_attribute(request.path)],
            },
        }
    }
}
