//! Job registry, scheduling and execution.

pub mod controllers;
pub mod error;
pub mod executor;
pub mod registry;
pub mod reports;
pub mod scheduler;
pub mod types;

pub use error::{JobError, JobResult};
pub use executor::{ConcurrencyTracker, JobExecutor, RunGuard, RunReport};
pub use registry::{JobRegistry, JobRegistryBuilder};
pub use reports::{Report, ReportCatalog, ReportDeps, ReportJob};
pub use scheduler::JobScheduler;
pub use types::{ClientSet, ExecutionMode, Job, RunContext, Trigger};
