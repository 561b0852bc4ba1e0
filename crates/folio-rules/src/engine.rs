//! Rule evaluation

use chrono::Utc;
use folio_core::models::{
    ExecutionResult, RuleAction, RuleCondition, RuleDefinition, WorkflowExecution, WorkflowRule,
};
use folio_db::{WorkflowExecutionLog, WorkflowRuleStore};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::RuleContext;
use crate::error::{RuleError, RuleResult};
use crate::registry::{ActionInvocation, RuleRegistry};

pub struct WorkflowEngine {
    rules: Arc<dyn WorkflowRuleStore>,
    executions: Arc<dyn WorkflowExecutionLog>,
    registry: RuleRegistry,
}

/// Condition and action lists decoded from a stored rule.
struct ParsedRule {
    conditions: Vec<RuleCondition>,
    actions: Vec<RuleAction>,
}

impl ParsedRule {
    fn parse(rule: &WorkflowRule) -> RuleResult<Self> {
        let conditions = serde_json::from_value(rule.conditions.clone())
            .map_err(|e| RuleError::Malformed(format!("conditions: {}", e)))?;
        let actions = serde_json::from_value(rule.actions.clone())
            .map_err(|e| RuleError::Malformed(format!("actions: {}", e)))?;
        Ok(Self {
            conditions,
            actions,
        })
    }
}

impl WorkflowEngine {
    pub fn new(
        rules: Arc<dyn WorkflowRuleStore>,
        executions: Arc<dyn WorkflowExecutionLog>,
        registry: RuleRegistry,
    ) -> Self {
        Self {
            rules,
            executions,
            registry,
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Validate and persist a new rule.
    pub async fn create_rule(&self, definition: &RuleDefinition) -> RuleResult<WorkflowRule> {
        self.registry.validate_definition(definition)?;
        let rule = self.rules.create(definition).await?;
        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            trigger = %rule.trigger,
            priority = rule.priority,
            "Workflow rule created"
        );
        Ok(rule)
    }

    /// Evaluate every enabled rule for `trigger` in priority order.
    ///
    /// Only failing to load the rule list is an error. Per-rule problems are
    /// captured in the returned executions, and audit or `last_fired_at`
    /// write failures are logged.
    #[tracing::instrument(skip(self, context), fields(media_id = ?context.media_id))]
    pub async fn evaluate(
        &self,
        trigger: &str,
        context: &RuleContext,
    ) -> RuleResult<Vec<WorkflowExecution>> {
        let rules = self.rules.list_enabled_for_trigger(trigger).await?;
        let mut executions = Vec::with_capacity(rules.len());

        for rule in &rules {
            let execution = self.evaluate_rule(rule, trigger, context).await;

            if let Err(e) = self.rules.touch_last_fired(rule.id, execution.executed_at).await {
                tracing::warn!(rule_id = %rule.id, error = %e, "Failed to update rule last_fired_at");
            }
            if let Err(e) = self.executions.record(&execution).await {
                tracing::warn!(rule_id = %rule.id, error = %e, "Failed to record workflow execution");
            }

            executions.push(execution);
        }

        tracing::debug!(
            trigger = %trigger,
            rules = rules.len(),
            matched = executions.iter().filter(|e| e.matched).count(),
            "Workflow rules evaluated"
        );

        Ok(executions)
    }

    async fn evaluate_rule(
        &self,
        rule: &WorkflowRule,
        trigger: &str,
        context: &RuleContext,
    ) -> WorkflowExecution {
        let mut execution = WorkflowExecution {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            trigger: trigger.to_string(),
            media_id: context.media_id,
            matched: false,
            actions_executed: Vec::new(),
            actions_failed: Vec::new(),
            result: ExecutionResult::Success,
            error: None,
            executed_at: Utc::now(),
        };

        let parsed = match ParsedRule::parse(rule) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Skipping malformed workflow rule");
                execution.result = ExecutionResult::Failure;
                execution.error = Some(e.to_string());
                return execution;
            }
        };

        match self.conditions_hold(rule, &parsed.conditions, context) {
            Ok(true) => execution.matched = true,
            Ok(false) => return execution,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Workflow rule condition failed");
                execution.result = ExecutionResult::Failure;
                execution.error = Some(e.to_string());
                return execution;
            }
        }

        let mut errors = Vec::new();
        for action in &parsed.actions {
            let Some(executor) = self.registry.action(&action.action_type) else {
                tracing::warn!(
                    rule_id = %rule.id,
                    action_type = %action.action_type,
                    "Unknown action type, skipping"
                );
                continue;
            };

            let invocation = ActionInvocation {
                rule,
                params: &action.params,
                context,
            };
            match executor.execute(&invocation).await {
                Ok(()) => execution.actions_executed.push(action.action_type.clone()),
                Err(e) => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        action_type = %action.action_type,
                        error = %e,
                        "Workflow action failed"
                    );
                    execution.actions_failed.push(action.action_type.clone());
                    errors.push(format!("{}: {}", action.action_type, e));
                }
            }
        }

        if !errors.is_empty() {
            execution.result = ExecutionResult::Failure;
            execution.error = Some(errors.join("; "));
        }
        execution
    }

    /// AND over all conditions. Unknown types hold vacuously.
    fn conditions_hold(
        &self,
        rule: &WorkflowRule,
        conditions: &[RuleCondition],
        context: &RuleContext,
    ) -> RuleResult<bool> {
        for condition in conditions {
            let Some(evaluator) = self.registry.condition(&condition.condition_type) else {
                tracing::warn!(
                    rule_id = %rule.id,
                    condition_type = %condition.condition_type,
                    "Unknown condition type, treating as satisfied"
                );
                continue;
            };
            if !evaluator.evaluate(condition, context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
