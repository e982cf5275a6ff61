//! Helpers shared by resources: composite ids, client tokens, JSON documents

use serde_json::Value;
use tfplug::schema::{Validator, ValidatorRequest, ValidatorResponse};
use tfplug::types::Diagnostic;

pub const RESOURCE_ID_SEPARATOR: &str = ",";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdError {
    #[error("unexpected format for ID ({id}), expected {expected} parts separated by ','")]
    PartCount { id: String, expected: usize },

    #[error("format for ID ({id}) is incorrect, value expected at part {part}")]
    EmptyPart { id: String, part: usize },
}

/// Joins id parts with [`RESOURCE_ID_SEPARATOR`]
pub fn flatten_resource_id(parts: &[&str], allow_empty_part: bool) -> Result<String, IdError> {
    let id = parts.join(RESOURCE_ID_SEPARATOR);
    check_parts(&id, parts, allow_empty_part)?;
    Ok(id)
}

/// Splits a composite id into exactly `part_count` parts
pub fn expand_resource_id(
    id: &str,
    part_count: usize,
    allow_empty_part: bool,
) -> Result<Vec<String>, IdError> {
    let parts: Vec<&str> = id.split(RESOURCE_ID_SEPARATOR).collect();
    if parts.len() != part_count {
        return Err(IdError::PartCount {
            id: id.to_string(),
            expected: part_count,
        });
    }

    check_parts(id, &parts, allow_empty_part)?;
    Ok(parts.into_iter().map(str::to_string).collect())
}

fn check_parts(id: &str, parts: &[&str], allow_empty_part: bool) -> Result<(), IdError> {
    if allow_empty_part {
        return Ok(());
    }
    match parts.iter().position(|p| p.is_empty()) {
        Some(i) => Err(IdError::EmptyPart {
            id: id.to_string(),
            part: i + 1,
        }),
        None => Ok(()),
    }
}

/// Idempotency token for create calls
pub fn client_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether two JSON documents are equal once parsed. Documents with a
/// `Statement` are compared as IAM policies: statement order, the order of
/// action/resource/principal/condition values, and a single value versus a
/// one-element list make no difference.
pub fn json_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => normalize_policy(a) == normalize_policy(b),
        _ => false,
    }
}

const POLICY_VALUE_LISTS: [&str; 4] = ["Action", "NotAction", "Resource", "NotResource"];

fn normalize_policy(document: Value) -> Value {
    let Value::Object(mut document) = document else {
        return document;
    };
    if let Some(statements) = document.get_mut("Statement") {
        let mut normalized: Vec<Value> = into_list(statements.take())
            .into_iter()
            .map(normalize_statement)
            .collect();
        sort_values(&mut normalized);
        *statements = Value::Array(normalized);
    }
    Value::Object(document)
}

fn normalize_statement(statement: Value) -> Value {
    let Value::Object(mut statement) = statement else {
        return statement;
    };
    for key in POLICY_VALUE_LISTS {
        if let Some(value) = statement.get_mut(key) {
            *value = string_set(value.take());
        }
    }
    for key in ["Principal", "NotPrincipal"] {
        if let Some(Value::Object(principals)) = statement.get_mut(key) {
            for ids in principals.values_mut() {
                *ids = string_set(ids.take());
            }
        }
    }
    if let Some(Value::Object(operators)) = statement.get_mut("Condition") {
        for keys in operators.values_mut() {
            if let Value::Object(keys) = keys {
                for values in keys.values_mut() {
                    *values = string_set(values.take());
                }
            }
        }
    }
    if statement.get("Sid").is_some_and(|sid| sid.as_str() == Some("")) {
        statement.remove("Sid");
    }
    Value::Object(statement)
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn string_set(value: Value) -> Value {
    let mut items = into_list(value);
    sort_values(&mut items);
    items.dedup();
    Value::Array(items)
}

fn sort_values(items: &mut [Value]) {
    items.sort_by_cached_key(Value::to_string);
}

/// Keeps `old` when it is equivalent to `new`, so formatting differences in
/// the remote copy do not show up as changes
pub fn second_json_unless_equivalent(old: &str, new: &str) -> Result<String, serde_json::Error> {
    if old.trim().is_empty() {
        return Ok(new.to_string());
    }

    serde_json::from_str::<Value>(new)?;
    if json_equivalent(old, new) {
        Ok(old.to_string())
    } else {
        Ok(new.to_string())
    }
}

/// Validates that a string attribute holds a JSON document
pub struct JsonValidator;

impl JsonValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for JsonValidator {
    fn description(&self) -> String {
        "value must be a valid JSON document".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(value) = request.config_value.value.as_str() else {
            return ValidatorResponse::default();
        };

        match serde_json::from_str::<Value>(value) {
            Ok(_) => ValidatorResponse::default(),
            Err(e) => ValidatorResponse {
                diagnostics: vec![Diagnostic::error(
                    format!("Invalid JSON for {}", request.path),
                    e.to_string(),
                )
                .with_attribute(request.path)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_round_trips() {
        let id = flatten_resource_id(&["arn:aws:sso::1:application/a", "p-1", "USER"], false).unwrap();
        assert_eq!(id, "arn:aws:sso::1:application/a,p-1,USER");

        let parts = expand_resource_id(&id, 3, false).unwrap();
        assert_eq!(parts, vec!["arn:aws:sso::1:application/a", "p-1", "USER"]);
    }

    #[test]
    fn expand_rejects_wrong_part_count_and_empty_parts() {
        assert_eq!(
            expand_resource_id("a,b", 3, false),
            Err(IdError::PartCount {
                id: "a,b".to_string(),
                expected: 3
            })
        );
        assert_eq!(
            expand_resource_id("a,,c", 3, false),
            Err(IdError::EmptyPart {
                id: "a,,c".to_string(),
                part: 2
            })
        );
        assert!(expand_resource_id("a,,c", 3, true).is_ok());
    }

    #[test]
    fn client_tokens_are_unique() {
        assert_ne!(client_token(), client_token());
    }

    #[test]
    fn equivalent_policy_keeps_prior_formatting() {
        let old = r#"{"Version": "2012-10-17", "Statement": []}"#;
        let new = r#"{"Statement":[],"Version":"2012-10-17"}"#;

        assert!(json_equivalent(old, new));
        assert_eq!(second_json_unless_equivalent(old, new).unwrap(), old);
        assert_eq!(second_json_unless_equivalent("", new).unwrap(), new);

        let changed = r#"{"Statement":[{"Effect":"Allow"}],"Version":"2012-10-17"}"#;
        assert_eq!(second_json_unless_equivalent(old, changed).unwrap(), changed);
    }

    #[test]
    fn policies_compare_without_ordering_or_list_wrapping() {
        let configured = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Sid": "Admin", "Effect": "Allow", "Action": "kms:*", "Resource": "*",
                 "Principal": {"AWS": "arn:aws:iam::111122223333:root"}},
                {"Effect": "Allow", "Action": ["kms:Encrypt", "kms:Decrypt"], "Resource": ["*"],
                 "Principal": {"AWS": ["arn:aws:iam::111122223333:role/b", "arn:aws:iam::111122223333:role/a"]},
                 "Condition": {"StringEquals": {"kms:ViaService": "s3.us-west-2.amazonaws.com"}}}
            ]
        }"#;
        let remote = r#"{
            "Statement": [
                {"Effect": "Allow", "Action": ["kms:Decrypt", "kms:Encrypt"], "Resource": "*",
                 "Principal": {"AWS": ["arn:aws:iam::111122223333:role/a", "arn:aws:iam::111122223333:role/b"]},
                 "Condition": {"StringEquals": {"kms:ViaService": ["s3.us-west-2.amazonaws.com"]}}},
                {"Sid": "Admin", "Effect": "Allow", "Action": ["kms:*"], "Resource": ["*"],
                 "Principal": {"AWS": ["arn:aws:iam::111122223333:root"]}}
            ],
            "Version": "2012-10-17"
        }"#;

        assert!(json_equivalent(configured, remote));
        assert_eq!(second_json_unless_equivalent(configured, remote).unwrap(), configured);
    }

    #[test]
    fn single_statement_object_matches_one_element_list() {
        let object = r#"{"Version":"2012-10-17","Statement":{"Effect":"Allow","Action":"kms:*","Resource":"*","Principal":"*"}}"#;
        let list = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["kms:*"],"Resource":"*","Principal":"*"}]}"#;
        assert!(json_equivalent(object, list));
    }

    #[test]
    fn different_policies_are_not_equivalent() {
        let allow = r#"{"Statement":[{"Effect":"Allow","Action":"kms:*","Resource":"*"}]}"#;
        let deny = r#"{"Statement":[{"Effect":"Deny","Action":"kms:*","Resource":"*"}]}"#;
        let narrower = r#"{"Statement":[{"Effect":"Allow","Action":["kms:*","kms:Decrypt"],"Resource":"*"}]}"#;

        assert!(!json_equivalent(allow, deny));
        assert!(!json_equivalent(allow, narrower));
        assert!(!json_equivalent(allow, "not json"));
    }
}
