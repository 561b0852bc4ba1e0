//! Workflow rule and workflow execution repositories

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use folio_core::models::{RuleDefinition, WorkflowExecution, WorkflowRule};

use super::traits::{WorkflowExecutionLog, WorkflowRuleStore};

#[derive(Debug, FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    trigger: String,
    conditions: serde_json::Value,
    actions: serde_json::Value,
    priority: i32,
    enabled: bool,
    last_fired_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RuleRow> for WorkflowRule {
    fn from(row: RuleRow) -> Self {
        WorkflowRule {
            id: row.id,
            name: row.name,
            trigger: row.trigger,
            conditions: row.conditions,
            actions: row.actions,
            priority: row.priority,
            enabled: row.enabled,
            last_fired_at: row.last_fired_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct WorkflowRuleRepository {
    pool: PgPool,
}

impl WorkflowRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRuleStore for WorkflowRuleRepository {
    async fn create(&self, definition: &RuleDefinition) -> Result<WorkflowRule> {
        let conditions = serde_json::to_value(&definition.conditions)
            .context("Failed to serialize rule conditions")?;
        let actions =
            serde_json::to_value(&definition.actions).context("Failed to serialize rule actions")?;

        let row = sqlx::query_as::<Postgres, RuleRow>(
            r#"
            INSERT INTO workflow_rules (id, name, trigger, conditions, actions, priority, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, name, trigger, conditions, actions, priority, enabled, last_fired_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&definition.name)
        .bind(&definition.trigger)
        .bind(&conditions)
        .bind(&actions)
        .bind(definition.priority)
        .bind(definition.enabled)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create workflow rule")?;

        Ok(row.into())
    }

    async fn list_enabled_for_trigger(&self, trigger: &str) -> Result<Vec<WorkflowRule>> {
        let rows = sqlx::query_as::<Postgres, RuleRow>(
            r#"
            SELECT id, name, trigger, conditions, actions, priority, enabled, last_fired_at, created_at
            FROM workflow_rules
            WHERE trigger = $1 AND enabled = TRUE
            ORDER BY priority ASC, created_at ASC, id ASC
            "#,
        )
        .bind(trigger)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflow rules for trigger")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list(&self) -> Result<Vec<WorkflowRule>> {
        let rows = sqlx::query_as::<Postgres, RuleRow>(
            r#"
            SELECT id, name, trigger, conditions, actions, priority, enabled, last_fired_at, created_at
            FROM workflow_rules
            ORDER BY trigger ASC, priority ASC, created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflow rules")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn touch_last_fired(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workflow_rules SET last_fired_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("Failed to update rule last_fired_at")?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ExecutionRow {
    id: Uuid,
    rule_id: Uuid,
    rule_name: String,
    trigger: String,
    media_id: Option<Uuid>,
    matched: bool,
    actions_executed: Vec<String>,
    actions_failed: Vec<String>,
    result: String,
    error: Option<String>,
    executed_at: DateTime<Utc>,
}

impl TryFrom<ExecutionRow> for WorkflowExecution {
    type Error = anyhow::Error;

    fn try_from(row: ExecutionRow) -> Result<Self> {
        Ok(WorkflowExecution {
            id: row.id,
            rule_id: row.rule_id,
            rule_name: row.rule_name,
            trigger: row.trigger,
            media_id: row.media_id,
            matched: row.matched,
            actions_executed: row.actions_executed,
            actions_failed: row.actions_failed,
            result: row.result.parse()?,
            error: row.error,
            executed_at: row.executed_at,
        })
    }
}

#[derive(Clone)]
pub struct WorkflowExecutionRepository {
    pool: PgPool,
}

impl WorkflowExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowExecutionLog for WorkflowExecutionRepository {
    async fn record(&self, execution: &WorkflowExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_executions (
                id, rule_id, rule_name, trigger, media_id, matched,
                actions_executed, actions_failed, result, error, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(execution.id)
        .bind(execution.rule_id)
        .bind(&execution.rule_name)
        .bind(&execution.trigger)
        .bind(execution.media_id)
        .bind(execution.matched)
        .bind(&execution.actions_executed)
        .bind(&execution.actions_failed)
        .bind(execution.result.to_string())
        .bind(execution.error.as_deref())
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await
        .context("Failed to record workflow execution")?;
        Ok(())
    }

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<WorkflowExecution>> {
        let rows = sqlx::query_as::<Postgres, ExecutionRow>(
            r#"
            SELECT id, rule_id, rule_name, trigger, media_id, matched,
                actions_executed, actions_failed, result, error, executed_at
            FROM workflow_executions
            WHERE media_id = $1
            ORDER BY executed_at ASC
            "#,
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflow executions")?;

        rows.into_iter().map(WorkflowExecution::try_from).collect()
    }
}
