//! Workflow rule models
//!
//! Conditions and actions are stored as JSON and parsed at evaluation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Trigger names the pipeline fires.
pub mod triggers {
    pub const ON_UPLOAD: &str = "on_upload";
}

pub const MAX_RULE_CONDITIONS: usize = 50;
pub const MAX_RULE_ACTIONS: usize = 50;

/// Persisted rule (database row shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRule {
    pub id: Uuid,
    pub name: String,
    pub trigger: String,
    pub conditions: JsonValue,
    pub actions: JsonValue,
    pub priority: i32,
    pub enabled: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub params: JsonValue,
}

/// Rule document accepted when creating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Rule name cannot be empty");
        }
        if self.trigger.trim().is_empty() {
            anyhow::bail!("Rule trigger cannot be empty");
        }
        if self.conditions.len() > MAX_RULE_CONDITIONS {
            anyhow::bail!("Rule cannot have more than {} conditions", MAX_RULE_CONDITIONS);
        }
        if self.actions.is_empty() {
            anyhow::bail!("Rule must have at least one action");
        }
        if self.actions.len() > MAX_RULE_ACTIONS {
            anyhow::bail!("Rule cannot have more than {} actions", MAX_RULE_ACTIONS);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionResult {
    Success,
    Failure,
}

impl Display for ExecutionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExecutionResult::Success => f.write_str("success"),
            ExecutionResult::Failure => f.write_str("failure"),
        }
    }
}

impl FromStr for ExecutionResult {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExecutionResult::Success),
            "failure" => Ok(ExecutionResult::Failure),
            _ => Err(anyhow::anyhow!("Invalid execution result: {}", s)),
        }
    }
}

/// Audit record of one rule evaluated against one trigger event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub trigger: String,
    pub media_id: Option<Uuid>,
    pub matched: bool,
    pub actions_executed: Vec<String>,
    pub actions_failed: Vec<String>,
    pub result: ExecutionResult,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}
