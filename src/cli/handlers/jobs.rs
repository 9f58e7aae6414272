//! Jobs command handler
//!
//! Prints the job registry the configuration produces.

use std::fmt::Write;

use crate::config::OperatorConfig;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::registry::{JobRegistry, is_active};

pub struct JobsCommandHandler {
    config: Settings,
}

impl JobsCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> AppResult<()> {
        let operator = super::offline_operator(&self.config)?;
        print!("{}", describe(operator.registry(), &self.config.operator));
        Ok(())
    }
}

/// Human readable listing of `registry`
pub fn describe(registry: &JobRegistry, operator: &OperatorConfig) -> String {
    let disabled = &operator.disabled_jobs;
    let is_disabled = |name: &str| disabled.iter().any(|d| d == name);
    let mut out = String::new();

    let _ = writeln!(out, "Controllers:");
    for name in registry.controller_names() {
        let marker = match registry.controller(name) {
            _ if is_disabled(name) => " (disabled)",
            Some(job) if !is_active(job.as_ref(), disabled, &operator.enabled_jobs) => {
                " (off by default)"
            }
            _ => "",
        };
        let _ = writeln!(out, "  {}{}", name, marker);
    }

    let _ = writeln!(out, "Reports:");
    for name in registry.report_names() {
        let _ = writeln!(out, "  {}", name);
    }

    let _ = writeln!(out, "Scheduled:");
    for job in registry.scheduled() {
        let marker = if is_disabled(job.name()) { " (disabled)" } else { "" };
        let _ = writeln!(
            out,
            "  {} [{}]{}",
            job.instance(),
            job.trigger().describe(),
            marker
        );
    }

    let unknown = registry.unknown_disabled(disabled);
    if !unknown.is_empty() {
        let _ = writeln!(out, "Unknown disabled: {}", unknown.join(", "));
    }
    if !registry.unknown_reports().is_empty() {
        let names: Vec<&str> = registry.unknown_reports().iter().map(String::as_str).collect();
        let _ = writeln!(out, "Unknown reports: {}", names.join(", "));
    }
    out
}
