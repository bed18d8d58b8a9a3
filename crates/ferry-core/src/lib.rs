//! Core types, configuration and task orchestration for ferry.
//!
//! This crate defines the `ferry.toml` schema ([`FerryConfig`]), the
//! resolved per-invocation [`ProjectInfo`], the [`Task`](task::Task)
//! abstraction with its retry/concurrency wrappers, and the fail-fast
//! [`Workflow`] sequencer.

pub mod backoff;
pub mod config;
pub mod duration;
pub mod error;
pub mod project;
pub mod task;
pub mod version;
pub mod workflow;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff};
pub use config::{
    ApiEndpoints, FerryConfig, Installation, KubernetesConfig, MonitoringConfig, ProjectConfig,
    RegistryConfig, ReleaseConfig,
};
pub use error::{Error, Result};
pub use project::{BuildInfo, ProjectInfo, Registry, TemplateConfiguration};
pub use task::{ConcurrentTask, NoopTask, RetryTask, Task, TaskError};
pub use workflow::Workflow;
