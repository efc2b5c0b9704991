//! Aspect systems: the unit that owns advice, pointcuts and metadata.

mod table;

pub use table::SystemTable;

use crate::cflow::CflowKey;
use crate::config::SystemConfig;
use crate::controller::{Controller, ControllerRegistry};
use crate::error::{WeaveError, WeaveResult};
use crate::join_point::ThrowsJoinPoint;
use crate::metadata::{MetadataCache, TypeSource};
use crate::pattern::Site;
use crate::pointcut::{Pointcut, PointcutKind, StructuralMatch};
use crate::registry::AdviceRegistry;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use weave_api::{ClassMeta, MethodMeta};
use xxhash_rust::xxh3::Xxh3;

/// A pointcut that structurally matched a site.
#[derive(Debug, Clone)]
pub struct PointcutMatch {
    pub pointcut: Arc<Pointcut>,
    pub found: StructuralMatch,
}

/// Counts logged by [`AspectSystem::initialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub pointcuts: usize,
    pub advice: usize,
    pub stale_bindings: usize,
}

/// One logical aspect system, identified by uuid.
///
/// Pointcuts are kept in registration order behind a copy-on-write handle:
/// readers clone the inner `Arc`, writers swap in a new map.
pub struct AspectSystem {
    uuid: String,

    config: SystemConfig,

    /// Advice name -> index -> instances
    registry: AdviceRegistry,

    /// Class metadata, built on demand from the type source
    metadata: MetadataCache,

    controllers: ControllerRegistry,

    pointcuts: RwLock<Arc<IndexMap<String, Arc<Pointcut>>>>,

    /// (class, method signature, exception class) hash -> throws join point
    throws_cache: DashMap<u64, Arc<ThrowsJoinPoint>>,

    initialized: AtomicBool,
}

pub struct AspectSystemBuilder {
    uuid: String,
    config: SystemConfig,
    metadata: Option<MetadataCache>,
    controllers: Vec<Arc<dyn Controller>>,
}

impl AspectSystemBuilder {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            config: SystemConfig::default(),
            metadata: None,
            controllers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_type_source(mut self, source: Arc<dyn TypeSource>) -> Self {
        self.metadata = Some(MetadataCache::new(source));
        self
    }

    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn build(self) -> AspectSystem {
        let controllers = ControllerRegistry::with_builtins();
        for controller in self.controllers {
            controllers.register(controller);
        }
        debug!(uuid = %self.uuid, "aspect system created");
        AspectSystem {
            uuid: self.uuid,
            config: self.config,
            registry: AdviceRegistry::new(),
            metadata: self.metadata.unwrap_or_else(MetadataCache::empty),
            controllers,
            pointcuts: RwLock::new(Arc::new(IndexMap::new())),
            throws_cache: DashMap::new(),
            initialized: AtomicBool::new(false),
        }
    }
}

impl AspectSystem {
    pub fn builder(uuid: impl Into<String>) -> AspectSystemBuilder {
        AspectSystemBuilder::new(uuid)
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdviceRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Registers a pointcut under `aspect/name`. Join points resolved before
    /// this call keep the advice they already resolved.
    pub fn add_pointcut(&self, pointcut: Pointcut) -> WeaveResult<Arc<Pointcut>> {
        let key = pointcut.qualified_name();
        let mut guard = self.pointcuts.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&key) {
            return Err(WeaveError::definition(format!(
                "pointcut '{key}' is already registered"
            )));
        }
        let pointcut = Arc::new(pointcut);
        let mut next = (**guard).clone();
        next.insert(key.clone(), pointcut.clone());
        *guard = Arc::new(next);
        drop(guard);

        // Cached throws join points were resolved without this pointcut.
        if pointcut.kind() == PointcutKind::Throws {
            self.throws_cache.clear();
        }
        debug!(system = %self.uuid, pointcut = %key, kind = %pointcut.kind(), "pointcut registered");
        Ok(pointcut)
    }

    pub fn pointcut(&self, qualified_name: &str) -> Option<Arc<Pointcut>> {
        self.snapshot().get(qualified_name).cloned()
    }

    /// Pointcuts in registration order.
    pub fn pointcuts(&self) -> Vec<Arc<Pointcut>> {
        self.snapshot().values().cloned().collect()
    }

    fn snapshot(&self) -> Arc<IndexMap<String, Arc<Pointcut>>> {
        self.pointcuts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checks every advice binding once and logs a summary. Later calls
    /// return `None`.
    pub fn initialize(&self) -> Option<InitSummary> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return None;
        }
        let pointcuts = self.pointcuts();
        let mut summary = InitSummary {
            pointcuts: pointcuts.len(),
            advice: self.registry.len(),
            stale_bindings: 0,
        };
        for pointcut in &pointcuts {
            for tuple in pointcut.stale_bindings(&self.registry) {
                warn!(
                    system = %self.uuid,
                    pointcut = %pointcut.qualified_name(),
                    advice = %tuple.name,
                    index = %tuple.index,
                    "stale advice binding"
                );
                summary.stale_bindings += 1;
            }
        }
        info!(
            system = %self.uuid,
            pointcuts = summary.pointcuts,
            advice = summary.advice,
            stale = summary.stale_bindings,
            "aspect system initialized"
        );
        Some(summary)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn matching<F>(&self, site: &Site<'_>, filter: F) -> WeaveResult<Vec<PointcutMatch>>
    where
        F: Fn(PointcutKind) -> bool,
    {
        let mut out = Vec::new();
        for pointcut in self.snapshot().values() {
            if !filter(pointcut.kind()) {
                continue;
            }
            if let Some(found) = pointcut.structural_match(site)? {
                out.push(PointcutMatch {
                    pointcut: pointcut.clone(),
                    found,
                });
            }
        }
        Ok(out)
    }

    pub fn execution_pointcuts(&self, site: &Site<'_>) -> WeaveResult<Vec<PointcutMatch>> {
        self.matching(site, |kind| kind == PointcutKind::Execution)
    }

    pub fn call_pointcuts(&self, site: &Site<'_>) -> WeaveResult<Vec<PointcutMatch>> {
        self.matching(site, |kind| kind == PointcutKind::Call)
    }

    /// `kind` is `Get` or `Set`.
    pub fn field_pointcuts(&self, kind: PointcutKind, site: &Site<'_>) -> WeaveResult<Vec<PointcutMatch>> {
        self.matching(site, |k| k == kind)
    }

    pub fn throws_pointcuts(&self, site: &Site<'_>) -> WeaveResult<Vec<PointcutMatch>> {
        self.matching(site, |kind| kind == PointcutKind::Throws)
    }

    pub fn cflow_key(&self, pattern_source: &str) -> CflowKey {
        CflowKey::new(&self.uuid, pattern_source)
    }

    /// Keys of every cflow definition, across all pointcuts, whose pattern
    /// matches `site`. Executing the site pushes these.
    pub fn cflow_keys_for(&self, site: &Site<'_>) -> Vec<CflowKey> {
        let mut keys: Vec<CflowKey> = Vec::new();
        for pointcut in self.snapshot().values() {
            for definition in pointcut.cflow_definitions() {
                if definition.matches(site) {
                    let key = self.cflow_key(definition.source());
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    /// Cached throws join point for the triple, built on first request.
    pub fn throws_join_point(
        &self,
        class: &Arc<ClassMeta>,
        method: &MethodMeta,
        exception: &Arc<ClassMeta>,
    ) -> WeaveResult<Arc<ThrowsJoinPoint>> {
        let key = throws_key(&class.name, method, &exception.name);
        if let Some(hit) = self.throws_cache.get(&key).map(|e| e.value().clone()) {
            if hit.is_for(&class.name, method, &exception.name) {
                return Ok(hit);
            }
        }

        let join_point = Arc::new(ThrowsJoinPoint::new(
            self,
            class.clone(),
            method.clone(),
            exception.clone(),
        )?);
        if self.throws_cache.len() >= self.config.throws_cache_limit {
            debug!(system = %self.uuid, limit = self.config.throws_cache_limit, "throws cache cleared");
            self.throws_cache.clear();
        }
        self.throws_cache.insert(key, join_point.clone());
        Ok(join_point)
    }

    pub fn throws_cache_len(&self) -> usize {
        self.throws_cache.len()
    }
}

fn throws_key(class: &str, method: &MethodMeta, exception: &str) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(class.as_bytes());
    hasher.update(&[0]);
    hasher.update(method.signature().as_bytes());
    hasher.update(&[0]);
    hasher.update(exception.as_bytes());
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;
    use crate::pointcut::{AdviceSlot, PointcutDefinition};
    use std::sync::Arc;
    use weave_api::{JoinPoint, Value};

    fn noop(_: &mut dyn JoinPoint) -> WeaveResult<Value> {
        Ok(Value::unit())
    }

    fn execution(system: &AspectSystem, name: &str, pattern: &str) -> Arc<Pointcut> {
        let pointcut = Pointcut::new("aspect", name, PointcutKind::Execution, "p").unwrap();
        pointcut
            .add_pointcut_def(PointcutDefinition::new("p", PatternKind::Method, pattern).unwrap())
            .unwrap();
        system.add_pointcut(pointcut).unwrap()
    }

    #[test]
    fn lookups_keep_registration_order() {
        let system = AspectSystem::builder("sys").build();
        execution(&system, "second", "* foo.*.*(..)");
        execution(&system, "first", "* foo.Repo.save(..)");
        execution(&system, "other", "* bar.*.*(..)");

        let class = ClassMeta::new("foo.Repo");
        let method = MethodMeta::new("save", ["int"], "void");
        let site = Site::Method { class: &class, method: &method };
        let names: Vec<_> = system
            .execution_pointcuts(&site)
            .unwrap()
            .iter()
            .map(|m| m.pointcut.name().to_string())
            .collect();
        assert_eq!(names, ["second", "first"]);
        assert!(system.call_pointcuts(&site).unwrap().is_empty());
    }

    #[test]
    fn duplicate_pointcut_is_rejected() {
        let system = AspectSystem::builder("sys").build();
        execution(&system, "pc", "* *.*(..)");
        let again = Pointcut::new("aspect", "pc", PointcutKind::Execution, "p").unwrap();
        assert!(system.add_pointcut(again).unwrap_err().is_fatal());
    }

    #[test]
    fn initialize_runs_once_and_counts_stale_bindings() {
        let system = AspectSystem::builder("sys").build();
        system.registry().register_advice("log", Arc::new(noop)).unwrap();
        let pointcut = execution(&system, "pc", "* *.*(..)");
        pointcut
            .add_advice(AdviceSlot::Around, "log", system.registry())
            .unwrap();
        system.registry().unregister("log").unwrap();

        let summary = system.initialize().expect("first call initializes");
        assert_eq!(summary.pointcuts, 1);
        assert_eq!(summary.stale_bindings, 1);
        assert!(system.is_initialized());
        assert!(system.initialize().is_none());
    }

    #[test]
    fn cflow_keys_are_deduplicated_and_scoped() {
        let system = AspectSystem::builder("sys").build();
        for name in ["a", "b"] {
            let pointcut = Pointcut::new("aspect", name, PointcutKind::Execution, "tx").unwrap();
            pointcut
                .add_pointcut_def(PointcutDefinition::cflow("tx", "* foo.Tx.run(..)").unwrap())
                .unwrap();
            system.add_pointcut(pointcut).unwrap();
        }
        let class = ClassMeta::new("foo.Tx");
        let method = MethodMeta::new("run", Vec::<String>::new(), "void");
        let keys = system.cflow_keys_for(&Site::Method { class: &class, method: &method });
        assert_eq!(keys, vec![CflowKey::new("sys", "* foo.Tx.run(..)")]);
    }

    #[test]
    fn throws_join_points_are_cached_until_limit() {
        let config = SystemConfig {
            throws_cache_limit: 2,
            ..SystemConfig::default()
        };
        let system = AspectSystem::builder("sys").with_config(config).build();
        let class = Arc::new(ClassMeta::new("foo.Repo"));
        let method = MethodMeta::new("save", ["int"], "void");
        let exceptions: Vec<_> = ["a.E1", "a.E2", "a.E3"]
            .into_iter()
            .map(|name| Arc::new(ClassMeta::new(name)))
            .collect();

        let first = system.throws_join_point(&class, &method, &exceptions[0]).unwrap();
        let again = system.throws_join_point(&class, &method, &exceptions[0]).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!first.has_advice());

        system.throws_join_point(&class, &method, &exceptions[1]).unwrap();
        assert_eq!(system.throws_cache_len(), 2);
        system.throws_join_point(&class, &method, &exceptions[2]).unwrap();
        assert_eq!(system.throws_cache_len(), 1);
    }
}
