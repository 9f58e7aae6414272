use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::ScheduleEntry;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::reports::{ReportCatalog, ReportDeps, ReportJob};
use crate::jobs::types::{Job, Trigger};

/// Every job known to the operator, built once at startup.
///
/// `controllers` and `reports` are the names chat commands resolve against;
/// `scheduled` holds one report job per (channel, report) pair of the
/// schedule configuration.
pub struct JobRegistry {
    controllers: BTreeMap<String, Arc<dyn Job>>,
    reports: BTreeMap<String, Arc<dyn Job>>,
    scheduled: Vec<Arc<dyn Job>>,
    unknown_reports: BTreeSet<String>,
}

impl JobRegistry {
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::default()
    }

    pub fn controller(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.controllers.get(name).cloned()
    }

    pub fn report(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.reports.get(name).cloned()
    }

    /// Controllers first, then the debug-invocable reports.
    pub fn debuggable(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.controller(name).or_else(|| self.report(name))
    }

    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.keys().map(String::as_str).collect()
    }

    pub fn report_names(&self) -> Vec<&str> {
        self.reports.keys().map(String::as_str).collect()
    }

    pub fn scheduled(&self) -> &[Arc<dyn Job>] {
        &self.scheduled
    }

    /// Report names in the schedules that the catalog does not know
    pub fn unknown_reports(&self) -> &BTreeSet<String> {
        &self.unknown_reports
    }

    /// Disabled names matching neither a controller nor a scheduled report.
    pub fn unknown_disabled(&self, disabled: &[String]) -> Vec<String> {
        disabled
            .iter()
            .filter(|name| !self.controllers.contains_key(*name) && !self.reports.contains_key(*name))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Jobs that get their own loop: controllers and scheduled reports that
    /// are [active](is_active).
    pub fn recurring(&self, disabled: &[String], enabled: &[String]) -> Vec<Arc<dyn Job>> {
        self.controllers
            .values()
            .chain(self.scheduled.iter())
            .filter(|job| is_active(job.as_ref(), disabled, enabled))
            .cloned()
            .collect()
    }
}

/// True when `job` runs automatically: it is not named in `disabled`, and it
/// is either on by default or named in `enabled`.
pub fn is_active(job: &dyn Job, disabled: &[String], enabled: &[String]) -> bool {
    let named = |names: &[String]| names.iter().any(|n| n == job.name());
    !named(disabled) && (job.enabled_by_default() || named(enabled))
}

#[derive(Default)]
pub struct JobRegistryBuilder {
    controllers: BTreeMap<String, Arc<dyn Job>>,
    reports: BTreeMap<String, Arc<dyn Job>>,
    scheduled: Vec<Arc<dyn Job>>,
    unknown_reports: BTreeSet<String>,
}

impl JobRegistryBuilder {
    pub fn controller(mut self, job: Arc<dyn Job>) -> JobResult<Self> {
        let name = job.name().to_string();
        if self.controllers.contains_key(&name) {
            return Err(JobError::AlreadyExists(name));
        }
        self.controllers.insert(name, job);
        Ok(self)
    }

    pub fn controllers(self, jobs: impl IntoIterator<Item = Arc<dyn Job>>) -> JobResult<Self> {
        jobs.into_iter().try_fold(self, |builder, job| builder.controller(job))
    }

    /// Adds one report job per (entry, report) pair and one debug-invocable
    /// job per distinct report name. Unknown report names are collected,
    /// not rejected; invalid cron expressions are.
    pub fn schedules(
        mut self,
        entries: &[ScheduleEntry],
        catalog: &ReportCatalog,
        deps: &ReportDeps,
    ) -> JobResult<Self> {
        for entry in entries {
            let trigger = Trigger::cron(&entry.when)?;

            for name in &entry.reports {
                let Some(report) = catalog.create(name) else {
                    tracing::warn!(report = %name, channel = %entry.channel, "Unknown report in schedule");
                    self.unknown_reports.insert(name.clone());
                    continue;
                };

                self.scheduled.push(Arc::new(ReportJob::scheduled(
                    Arc::clone(&report),
                    entry,
                    trigger.clone(),
                    deps,
                )));

                if !self.reports.contains_key(name) {
                    self.reports
                        .insert(name.clone(), Arc::new(ReportJob::on_demand(report, deps)));
                }
            }
        }
        Ok(self)
    }

    pub fn build(self) -> JobRegistry {
        tracing::debug!(
            controllers = self.controllers.len(),
            reports = self.reports.len(),
            scheduled = self.scheduled.len(),
            "Built job registry"
        );
        JobRegistry {
            controllers: self.controllers,
            reports: self.reports,
            scheduled: self.scheduled,
            unknown_reports: self.unknown_reports,
        }
    }
}
