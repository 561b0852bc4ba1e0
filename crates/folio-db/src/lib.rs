//! Persistence for media assets, workflow rules, rule executions and
//! portfolio entities.
//!
//! Services depend on the traits in [`db::traits`]; Postgres repositories
//! implement them for production and [`memory`] provides in-process
//! implementations for tests and dry runs.

pub mod db;
pub mod memory;

pub use db::traits::{DomainEntityStore, MediaStore, WorkflowExecutionLog, WorkflowRuleStore};
pub use db::{
    connect, run_migrations, EntityRepository, MediaRepository, WorkflowExecutionRepository,
    WorkflowRuleRepository,
};
pub use memory::{
    InMemoryEntityStore, InMemoryExecutionLog, InMemoryMediaStore, InMemoryRuleStore,
};
