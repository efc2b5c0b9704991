use std::path::Path;
use std::sync::Arc;
use weave_core::controller::Controller;
use weave_core::error::ConfigError;
use weave_core::metadata::TypeSource;
use weave_core::{SystemConfig, SystemTable};

/// Assembles the system table an instrumented process dispatches through.
///
/// Every system created by the table carries the built-in `default` and
/// `reversed` controllers plus whatever was added with
/// [`RuntimeBuilder::with_controller`].
pub struct RuntimeBuilder {
    config: SystemConfig,
    type_source: Option<Arc<dyn TypeSource>>,
    controllers: Vec<Arc<dyn Controller>>,
}

impl RuntimeBuilder {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            type_source: None,
            controllers: Vec::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(SystemConfig::from_path(path)?))
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn with_type_source(mut self, source: Arc<dyn TypeSource>) -> Self {
        self.type_source = Some(source);
        self
    }

    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn build(self) -> SystemTable {
        let mut table = SystemTable::new(self.config);
        if let Some(source) = self.type_source {
            table = table.with_type_source(source);
        }
        for controller in self.controllers {
            tracing::debug!(controller = controller.name(), "custom controller registered");
            table = table.with_controller(controller);
        }
        table
    }
}

/// Builds a table from `config` with the built-in controllers only.
pub fn build_default_table(config: SystemConfig) -> SystemTable {
    RuntimeBuilder::new(config).build()
}

/// Loads the configuration at `path` and builds a table from it.
pub fn build_table_from_path(path: &Path) -> Result<SystemTable, ConfigError> {
    let table = RuntimeBuilder::from_path(path)?.build();
    tracing::info!(config = %path.display(), "system table ready");
    Ok(table)
}

/// Initializes the logging system for a specific component, using the
/// configured filter when `RUST_LOG` is unset.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, config: &SystemConfig) -> Option<impl Drop> {
    Some(weave_core::logging::init_logging(
        component,
        false,
        config.log_filter.as_deref(),
    ))
}
