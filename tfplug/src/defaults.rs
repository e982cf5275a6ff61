//! Default value providers for attributes
//!
//! Default providers are evaluated during planning when an attribute is absent
//! from the configuration. They differ from plan modifiers in that they only
//! run when the value is absent, not when it's explicitly set.
//!
//! # Examples
//!
//! ```no_run
//! use tfplug::schema::{AttributeBuilder, AttributeType};
//! use tfplug::defaults::{StaticDefault, EnvDefault};
//!
//! let window = AttributeBuilder::new("deletion_window_in_days", AttributeType::Number)
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::number(30.0))
//!     .build();
//!
//! let region = AttributeBuilder::new("region", AttributeType::String)
//!     .optional()
//!     .default(EnvDefault::create("AWS_DEFAULT_REGION", "us-east-1"))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::env;

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

/// EnvDefault gets the default value from an environment variable
pub struct EnvDefault {
    env_var: String,
    fallback: Option<String>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback.to_string()),
        })
    }

    /// Null when the variable is unset
    pub fn create_required(env_var: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }
}

impl Default for EnvDefault {
    fn description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!(
                "default from environment variable {} (fallback: {})",
                self.env_var, fallback
            ),
            None => format!("default from environment variable {}", self.env_var),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = match env::var(&self.env_var) {
            Ok(val) if !val.is_empty() => Dynamic::String(val),
            _ => self
                .fallback
                .clone()
                .map_or(Dynamic::Null, Dynamic::String),
        };

        DefaultResponse {
            value: DynamicValue::new(value),
        }
    }
}
