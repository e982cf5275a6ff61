//! Built-in attribute validators
//!
//! Validators only inspect known, non-null values. Null and unknown values
//! are left to the required/optional checks done by the server.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;

fn invalid(request: &ValidatorRequest, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(request.path.clone())],
    }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_most(max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: None,
            max: Some(max),
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("string length must be between {} and {}", min, max),
            (Some(min), None) => format!("string length must be at least {}", min),
            (None, Some(max)) => format!("string length must be at most {}", max),
            (None, None) => "any string length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ValidatorResponse::default();
        };

        let len = s.chars().count();
        let too_short = self.min.is_some_and(|min| len < min);
        let too_long = self.max.is_some_and(|max| len > max);

        if too_short || too_long {
            return invalid(
                &request,
                format!("Invalid Attribute Value Length for {}", request.path),
                format!("Attribute {} {}, got: {}", request.path, self.description(), len),
            );
        }

        ValidatorResponse::default()
    }
}

pub struct StringPatternValidator {
    pub pattern: Regex,
    pub description: String,
}

impl StringPatternValidator {
    /// Anchored match: the whole value must match `pattern`
    pub fn create(pattern: &str, description: &str) -> crate::Result<Box<dyn Validator>> {
        let pattern = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            crate::TfplugError::InvalidConfiguration(format!("invalid pattern: {}", e))
        })?;

        Ok(Box::new(Self {
            pattern,
            description: description.to_string(),
        }))
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        format!("value must match {}", self.description)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if !self.pattern.is_match(s) => invalid(
                &request,
                format!("Invalid Attribute Value Match for {}", request.path),
                format!("Attribute {} {}, got: {}", request.path, self.description(), s),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("value must be between {} and {}", min, max),
            (Some(min), None) => format!("value must be at least {}", min),
            (None, Some(max)) => format!("value must be at most {}", max),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.value.as_number() else {
            return ValidatorResponse::default();
        };

        if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
            return invalid(
                &request,
                format!("Invalid Attribute Value for {}", request.path),
                format!("Attribute {} {}, got: {}", request.path, self.description(), n),
            );
        }

        ValidatorResponse::default()
    }
}

/// Accepts only the listed values
pub struct OneOfValidator {
    allowed: Vec<Dynamic>,
}

impl OneOfValidator {
    pub fn strings(values: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: values.iter().map(|v| Dynamic::from(*v)).collect(),
        })
    }

    pub fn numbers(values: &[f64]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: values.iter().map(|v| Dynamic::Number(*v)).collect(),
        })
    }

    fn render(value: &Dynamic) -> String {
        match value {
            Dynamic::String(s) => format!("\"{}\"", s),
            Dynamic::Number(n) => n.to_string(),
            other => format!("{:?}", other),
        }
    }
}

impl Validator for OneOfValidator {
    fn description(&self) -> String {
        let allowed: Vec<String> = self.allowed.iter().map(Self::render).collect();
        format!("value must be one of: [{}]", allowed.join(" "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let value = &request.config_value.value;
        if value.is_null() || !value.is_fully_known() {
            return ValidatorResponse::default();
        }

        if self.allowed.iter().any(|a| a.semantically_equal(value)) {
            return ValidatorResponse::default();
        }

        invalid(
            &request,
            format!("Invalid Attribute Value Match for {}", request.path),
            format!(
                "Attribute {} {}, got: {}",
                request.path,
                self.description(),
                Self::render(value)
            ),
        )
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("list must contain between {} and {} elements", min, max),
            (Some(min), None) => format!("list must contain at least {} elements", min),
            (None, Some(max)) => format!("list must contain at most {} elements", max),
            (None, None) => "any list length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return ValidatorResponse::default();
        };

        let len = items.len();
        if self.min.is_some_and(|min| len < min) || self.max.is_some_and(|max| len > max) {
            return invalid(
                &request,
                format!("Invalid Attribute Value for {}", request.path),
                format!("Attribute {} {}, got: {}", request.path, self.description(), len),
            );
        }

        ValidatorResponse::default()
    }
}
