//! Workflow rule engine
//!
//! Rules are plain data: a trigger, an AND-list of typed conditions and an
//! ordered list of typed actions. The [`RuleRegistry`] maps type names to
//! evaluators and executors; [`WorkflowEngine`] runs every enabled rule for
//! a trigger and records one execution per rule.

pub mod actions;
pub mod conditions;
pub mod context;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod registry;

pub use context::RuleContext;
pub use engine::WorkflowEngine;
pub use error::{RuleError, RuleResult};
pub use notifier::{AdminNotification, AdminNotifier, NotificationLevel, TracingNotifier};
pub use registry::{ActionExecutor, ActionInvocation, ConditionEvaluator, RuleRegistry};
