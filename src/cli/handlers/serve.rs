//! Serve command handler
//!
//! Handles the serve command including dry-run validation and server startup.

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Run the operator, or only validate it when `dry_run` is set.
    ///
    /// # Errors
    /// - Configuration or schedule validation errors
    /// - Server startup errors (if not dry-run)
    pub async fn execute(self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }
        Server::new(self.config).run().await?;
        Ok(())
    }

    /// Validate configuration and schedules without starting anything
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;
        println!("✓ Configuration is valid");

        let operator = super::offline_operator(&self.config)?;
        let registry = operator.registry();
        println!("✓ Listener would bind to: {}", self.config.server.address());
        println!("✓ Tracker endpoint: {}", self.config.tracker.endpoint);
        println!("✓ Admin channel: {}", self.config.chat.admin_channel);
        println!(
            "✓ {} controllers, {} scheduled reports",
            registry.controller_names().len(),
            registry.scheduled().len()
        );

        let unknown = registry.unknown_disabled(&self.config.operator.disabled_jobs);
        if !unknown.is_empty() {
            println!("! Unknown disabled jobs: {}", unknown.join(", "));
        }
        if !registry.unknown_reports().is_empty() {
            let names: Vec<&str> = registry.unknown_reports().iter().map(String::as_str).collect();
            println!("! Unknown reports: {}", names.join(", "));
        }

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
