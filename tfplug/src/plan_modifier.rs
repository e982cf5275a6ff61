//! Built-in attribute plan modifiers
//!
//! Plan modifiers run after defaults have been applied and can:
//! - Modify the planned value
//! - Mark an attribute as requiring replacement
//! - Add warnings or errors to the plan

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{Diagnostic, Dynamic};

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces replacement".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = value_changed(&request.state_value.value, &request.plan_value.value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Keeps the prior state value when the planned value is unknown
///
/// Used on computed attributes that never change after creation (ARNs, ids)
/// so that plans do not show them as "known after apply" on every update.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Requires replacement when the value changed and `predicate` agrees
pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync + 'static,
{
    pub fn create(predicate: F, description: impl Into<String>) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.into(),
        })
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let mut diagnostics = vec![];
        let requires_replace = value_changed(&request.state_value.value, &request.plan_value.value)
            && (self.predicate)(&request);

        if requires_replace {
            diagnostics.push(
                Diagnostic::warning(
                    format!("Attribute '{}' requires resource replacement", request.path),
                    &self.description,
                )
                .with_attribute(request.path.clone()),
            );
        }

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics,
        }
    }
}

/// A known prior value differs from a known planned value
fn value_changed(state: &Dynamic, plan: &Dynamic) -> bool {
    match (state, plan) {
        (Dynamic::Null, Dynamic::Null) => false,
        // Nothing to replace before the resource exists.
        (Dynamic::Null, _) => false,
        (Dynamic::Unknown, _) | (_, Dynamic::Unknown) => false,
        (state, plan) => !state.semantically_equal(plan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("type"),
        }
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("LOCAL".to_string()),
            Dynamic::String("LOCAL".to_string()),
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("LOCAL".to_string()),
            Dynamic::String("AGGREGATOR".to_string()),
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_creation_and_unknown_values() {
        let response = RequiresReplace.modify(request(
            Dynamic::Null,
            Dynamic::String("value".to_string()),
        ));
        assert!(!response.requires_replace);

        let response = RequiresReplace.modify(request(
            Dynamic::String("value".to_string()),
            Dynamic::Unknown,
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("arn:aws:kms:us-west-2:111122223333:key/mrk-1".to_string()),
            Dynamic::Unknown,
        ));

        assert_eq!(
            response.plan_value.value,
            Dynamic::String("arn:aws:kms:us-west-2:111122223333:key/mrk-1".to_string())
        );
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_on_create() {
        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn use_state_for_unknown_uses_plan_when_known() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::Number(30.0),
            Dynamic::Number(60.0),
        ));

        assert_eq!(response.plan_value.value, Dynamic::Number(60.0));
    }

    #[test]
    fn requires_replace_if_consults_predicate() {
        let modifier = RequiresReplaceIf::create(
            |req: &PlanModifierRequest| {
                matches!(&req.state_value.value,
                    Dynamic::String(old) if old == "AGGREGATOR")
            },
            "Demoting an aggregator index requires replacement",
        );

        let response = modifier.modify(request(
            Dynamic::String("AGGREGATOR".to_string()),
            Dynamic::String("LOCAL".to_string()),
        ));
        assert!(response.requires_replace);
        assert_eq!(response.diagnostics.len(), 1);
        assert!(!response.diagnostics[0].is_error());

        let response = modifier.modify(request(
            Dynamic::String("LOCAL".to_string()),
            Dynamic::String("AGGREGATOR".to_string()),
        ));
        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }
}
