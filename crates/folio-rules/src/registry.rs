//! Condition and action registry

use async_trait::async_trait;
use folio_core::models::{RuleCondition, RuleDefinition, WorkflowRule};
use folio_db::MediaStore;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::{
    AddFlagAction, MarkEntityCandidateAction, MergeTagsAction, NotifyAction, SetAltTextAction,
    SetStatusAction,
};
use crate::conditions::{
    DetectedTypeCondition, FilenameCondition, MimeTypeCondition, MinConfidenceCondition,
    StatusCondition, TagCondition,
};
use crate::context::RuleContext;
use crate::error::{RuleError, RuleResult};
use crate::notifier::AdminNotifier;

/// Evaluates one condition type against a rule context.
pub trait ConditionEvaluator: Send + Sync {
    fn condition_type(&self) -> &'static str;

    /// Check value and operator shape without a context.
    fn validate(&self, condition: &RuleCondition) -> RuleResult<()>;

    /// `Ok(false)` when the context lacks the data the condition inspects.
    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool>;
}

/// One action invocation inside a matched rule.
pub struct ActionInvocation<'a> {
    pub rule: &'a WorkflowRule,
    pub params: &'a JsonValue,
    pub context: &'a RuleContext,
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn action_type(&self) -> &'static str;

    fn validate(&self, _params: &JsonValue) -> RuleResult<()> {
        Ok(())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()>;
}

/// Type name to evaluator/executor map.
///
/// Built-in vocabulary comes from [`RuleRegistry::with_defaults`]; new types
/// are added with [`register_condition`](Self::register_condition) and
/// [`register_action`](Self::register_action). Registering an existing name
/// replaces it.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    conditions: HashMap<String, Arc<dyn ConditionEvaluator>>,
    actions: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(media: Arc<dyn MediaStore>, notifier: Arc<dyn AdminNotifier>) -> Self {
        let mut registry = Self::new();

        registry.register_condition(Arc::new(DetectedTypeCondition));
        registry.register_condition(Arc::new(MinConfidenceCondition));
        registry.register_condition(Arc::new(TagCondition));
        registry.register_condition(Arc::new(MimeTypeCondition));
        registry.register_condition(Arc::new(StatusCondition));
        registry.register_condition(Arc::new(FilenameCondition));

        registry.register_action(Arc::new(AddFlagAction::new(media.clone())));
        registry.register_action(Arc::new(MergeTagsAction::new(media.clone())));
        registry.register_action(Arc::new(MarkEntityCandidateAction::new(media.clone())));
        registry.register_action(Arc::new(NotifyAction::new(notifier)));
        registry.register_action(Arc::new(SetStatusAction::new(media.clone())));
        registry.register_action(Arc::new(SetAltTextAction::new(media)));

        registry
    }

    pub fn register_condition(&mut self, evaluator: Arc<dyn ConditionEvaluator>) {
        self.conditions
            .insert(evaluator.condition_type().to_string(), evaluator);
    }

    pub fn register_action(&mut self, executor: Arc<dyn ActionExecutor>) {
        self.actions
            .insert(executor.action_type().to_string(), executor);
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Arc<dyn ConditionEvaluator>> {
        self.conditions.get(condition_type)
    }

    pub fn action(&self, action_type: &str) -> Option<&Arc<dyn ActionExecutor>> {
        self.actions.get(action_type)
    }

    pub fn condition_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn action_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate a rule before it is stored.
    ///
    /// Types this registry does not know are accepted with a warning so rule
    /// data written for newer vocabularies still loads.
    pub fn validate_definition(&self, definition: &RuleDefinition) -> RuleResult<()> {
        definition
            .validate()
            .map_err(|e| RuleError::InvalidDefinition(e.to_string()))?;

        for condition in &definition.conditions {
            match self.condition(&condition.condition_type) {
                Some(evaluator) => evaluator.validate(condition)?,
                None => tracing::warn!(
                    rule_name = %definition.name,
                    condition_type = %condition.condition_type,
                    "Unknown condition type in rule definition"
                ),
            }
        }

        for action in &definition.actions {
            match self.action(&action.action_type) {
                Some(executor) => executor.validate(&action.params)?,
                None => tracing::warn!(
                    rule_name = %definition.name,
                    action_type = %action.action_type,
                    "Unknown action type in rule definition"
                ),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::TracingNotifier;
    use folio_core::models::{triggers, RuleAction};
    use folio_db::InMemoryMediaStore;
    use serde_json::json;

    fn registry() -> RuleRegistry {
        RuleRegistry::with_defaults(
            Arc::new(InMemoryMediaStore::new()),
            Arc::new(TracingNotifier),
        )
    }

    fn definition(conditions: Vec<RuleCondition>, actions: Vec<RuleAction>) -> RuleDefinition {
        RuleDefinition {
            name: "test".to_string(),
            trigger: triggers::ON_UPLOAD.to_string(),
            conditions,
            actions,
            priority: 0,
            enabled: true,
        }
    }

    #[test]
    fn default_vocabulary() {
        let registry = registry();
        assert_eq!(
            registry.condition_types(),
            vec!["detected_type", "filename", "mime_type", "min_confidence", "status", "tag"]
        );
        assert_eq!(
            registry.action_types(),
            vec![
                "add_flag",
                "mark_entity_candidate",
                "merge_tags",
                "notify",
                "set_alt_text",
                "set_status"
            ]
        );
    }

    #[test]
    fn validation_rejects_bad_condition_value() {
        let def = definition(
            vec![RuleCondition {
                condition_type: "min_confidence".to_string(),
                value: json!("high"),
                operator: None,
            }],
            vec![RuleAction {
                action_type: "add_flag".to_string(),
                params: json!({"flag": "x"}),
            }],
        );
        assert!(matches!(
            registry().validate_definition(&def),
            Err(RuleError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn validation_rejects_missing_action_param() {
        let def = definition(
            vec![],
            vec![RuleAction {
                action_type: "add_flag".to_string(),
                params: json!({}),
            }],
        );
        assert!(matches!(
            registry().validate_definition(&def),
            Err(RuleError::InvalidParams { .. })
        ));
    }

    #[test]
    fn validation_accepts_unknown_types() {
        let def = definition(
            vec![RuleCondition {
                condition_type: "color_palette".to_string(),
                value: json!("warm"),
                operator: None,
            }],
            vec![RuleAction {
                action_type: "post_to_instagram".to_string(),
                params: json!({}),
            }],
        );
        assert!(registry().validate_definition(&def).is_ok());
    }
}
