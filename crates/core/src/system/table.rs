use super::AspectSystem;
use crate::config::SystemConfig;
use crate::controller::Controller;
use crate::metadata::TypeSource;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// uuid -> system. One logical system per uuid, created on first request
/// from the table's defaults.
///
/// Passed explicitly to whoever needs to look systems up (for instance
/// snapshot restore); there is no process-wide table.
pub struct SystemTable {
    systems: DashMap<String, Arc<AspectSystem>>,
    config: SystemConfig,
    type_source: Option<Arc<dyn TypeSource>>,
    controllers: Vec<Arc<dyn Controller>>,
}

impl SystemTable {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            systems: DashMap::new(),
            config,
            type_source: None,
            controllers: Vec::new(),
        }
    }

    /// Metadata source handed to systems created from now on.
    pub fn with_type_source(mut self, source: Arc<dyn TypeSource>) -> Self {
        self.type_source = Some(source);
        self
    }

    /// Extra controller registered in every system created from now on.
    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn get_system(&self, uuid: &str) -> Arc<AspectSystem> {
        if let Some(system) = self.systems.get(uuid) {
            return system.value().clone();
        }
        self.systems
            .entry(uuid.to_string())
            .or_insert_with(|| {
                let mut builder = AspectSystem::builder(uuid).with_config(self.config.clone());
                if let Some(source) = &self.type_source {
                    builder = builder.with_type_source(source.clone());
                }
                for controller in &self.controllers {
                    builder = builder.with_controller(controller.clone());
                }
                debug!(uuid, "system created on first lookup");
                Arc::new(builder.build())
            })
            .value()
            .clone()
    }

    /// Registers a prebuilt system, replacing any system with the same uuid.
    pub fn insert(&self, system: AspectSystem) -> Arc<AspectSystem> {
        let system = Arc::new(system);
        self.systems
            .insert(system.uuid().to_string(), system.clone());
        system
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.systems.contains_key(uuid)
    }

    pub fn remove(&self, uuid: &str) -> Option<Arc<AspectSystem>> {
        self.systems.remove(uuid).map(|(_, system)| system)
    }

    pub fn uuids(&self) -> Vec<String> {
        let mut uuids: Vec<_> = self.systems.iter().map(|e| e.key().clone()).collect();
        uuids.sort();
        uuids
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for SystemTable {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}
