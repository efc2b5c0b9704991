//! Advice registry: advice name → index → instance, honoring deployment
//! models.

use crate::error::{WeaveError, WeaveResult};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::thread::ThreadId;
use weave_api::{Advice, DeploymentModel};

/// Opaque position of an advice in the registry. Indices are never reused, so
/// an index cached by a join point either resolves to the advice it was
/// created for or to nothing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdviceIndex(pub u32);

impl fmt::Display for AdviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type AdviceFactory = Arc<dyn Fn() -> Arc<dyn Advice> + Send + Sync>;

/// Who is asking for an advice instance.
#[derive(Clone, Copy, Default)]
pub struct AdviceScope<'a> {
    pub class_name: Option<&'a str>,
    pub instance: Option<&'a Arc<dyn Any + Send + Sync>>,
}

/// Per-owner maps are swept of collected owners once they reach this size;
/// the threshold then moves to twice the surviving count.
const SWEEP_FLOOR: usize = 32;

thread_local! {
    /// Dropped when the thread exits, which marks its advice instances dead.
    static THREAD_TOKEN: Arc<()> = Arc::new(());
}

/// Advice instances tied to an owner that can go away: a target object or
/// a thread. Only a `Weak` to the owner is kept.
struct OwnedInstances<K, O: ?Sized> {
    entries: DashMap<K, (Weak<O>, Arc<dyn Advice>)>,
    sweep_at: AtomicUsize,
}

impl<K: Eq + Hash, O: ?Sized> OwnedInstances<K, O> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            sweep_at: AtomicUsize::new(SWEEP_FLOOR),
        }
    }

    fn get_or_create(&self, key: K, owner: &Arc<O>, factory: &AdviceFactory) -> Arc<dyn Advice> {
        let mut created = false;
        let advice = {
            let mut entry = self.entries.entry(key).or_insert_with(|| {
                created = true;
                (Arc::downgrade(owner), factory())
            });
            // A new owner may have been allocated at a dropped owner's address.
            if !created && !entry.0.upgrade().is_some_and(|live| Arc::ptr_eq(&live, owner)) {
                *entry = (Arc::downgrade(owner), factory());
                created = true;
            }
            entry.1.clone()
        };
        if created && self.entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            let removed = self.sweep();
            let next = (self.entries.len() * 2).max(SWEEP_FLOOR);
            self.sweep_at.store(next, Ordering::Relaxed);
            tracing::debug!(removed, next, "swept advice instances of collected owners");
        }
        advice
    }

    /// Drops the instances whose owner is gone. Returns how many.
    fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (owner, _)| owner.strong_count() > 0);
        before.saturating_sub(self.entries.len())
    }
}

struct AdviceContainer {
    name: String,
    model: DeploymentModel,
    factory: AdviceFactory,
    shared: OnceCell<Arc<dyn Advice>>,
    per_class: DashMap<String, Arc<dyn Advice>>,
    per_instance: OwnedInstances<usize, dyn Any + Send + Sync>,
    per_thread: OwnedInstances<ThreadId, ()>,
}

impl AdviceContainer {
    fn new(name: &str, model: DeploymentModel, factory: AdviceFactory) -> Self {
        Self {
            name: name.to_string(),
            model,
            factory,
            shared: OnceCell::new(),
            per_class: DashMap::new(),
            per_instance: OwnedInstances::new(),
            per_thread: OwnedInstances::new(),
        }
    }

    fn instance(&self, scope: AdviceScope<'_>) -> Arc<dyn Advice> {
        match self.model {
            DeploymentModel::PerJvm => self.shared(),
            DeploymentModel::PerClass => match scope.class_name {
                Some(class) => self.per_class_instance(class),
                None => self.shared(),
            },
            DeploymentModel::PerInstance => match scope.instance {
                Some(target) => {
                    let key = Arc::as_ptr(target) as *const () as usize;
                    self.per_instance.get_or_create(key, target, &self.factory)
                }
                None => match scope.class_name {
                    // Static sites have no instance; fall back to the class.
                    Some(class) => self.per_class_instance(class),
                    None => self.shared(),
                },
            },
            DeploymentModel::PerThread => THREAD_TOKEN.with(|token| {
                self.per_thread
                    .get_or_create(std::thread::current().id(), token, &self.factory)
            }),
        }
    }

    fn shared(&self) -> Arc<dyn Advice> {
        self.shared.get_or_init(|| (self.factory)()).clone()
    }

    fn per_class_instance(&self, class: &str) -> Arc<dyn Advice> {
        if let Some(existing) = self.per_class.get(class) {
            return existing.clone();
        }
        self.per_class
            .entry(class.to_string())
            .or_insert_with(|| (self.factory)())
            .clone()
    }

    fn sweep(&self) -> usize {
        self.per_instance.sweep() + self.per_thread.sweep()
    }
}

#[derive(Default)]
pub struct AdviceRegistry {
    slots: RwLock<Vec<Option<Arc<AdviceContainer>>>>,
    by_name: DashMap<String, AdviceIndex>,
}

impl AdviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an advice factory under `name`.
    pub fn register(
        &self,
        name: &str,
        model: DeploymentModel,
        factory: AdviceFactory,
    ) -> WeaveResult<AdviceIndex> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if self.by_name.contains_key(name) {
            return Err(WeaveError::definition(format!(
                "advice '{name}' is already registered"
            )));
        }
        let index = AdviceIndex(slots.len() as u32);
        slots.push(Some(Arc::new(AdviceContainer::new(name, model, factory))));
        self.by_name.insert(name.to_string(), index);
        tracing::debug!("registered advice {} as {} ({})", name, index, model);
        Ok(index)
    }

    /// Registers a single shared instance.
    pub fn register_advice(&self, name: &str, advice: Arc<dyn Advice>) -> WeaveResult<AdviceIndex> {
        self.register(name, DeploymentModel::PerJvm, Arc::new(move || advice.clone()))
    }

    pub fn index_of(&self, name: &str) -> WeaveResult<AdviceIndex> {
        self.by_name
            .get(name)
            .map(|index| *index)
            .ok_or_else(|| WeaveError::definition(format!("advice '{name}' is not registered")))
    }

    /// `None` when the index was never issued or its advice was removed.
    pub fn advice(&self, index: AdviceIndex, scope: AdviceScope<'_>) -> Option<Arc<dyn Advice>> {
        let container = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            slots.get(index.0 as usize)?.clone()?
        };
        Some(container.instance(scope))
    }

    pub fn name_of(&self, index: AdviceIndex) -> Option<String> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(index.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|container| container.name.clone())
    }

    pub fn deployment_model(&self, name: &str) -> WeaveResult<DeploymentModel> {
        let index = self.index_of(name)?;
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(index.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|container| container.model)
            .ok_or_else(|| WeaveError::definition(format!("advice '{name}' is not registered")))
    }

    /// Removes the advice. Its index is tombstoned, so join points still
    /// holding it fail with a definition error at their next dispatch.
    pub fn unregister(&self, name: &str) -> WeaveResult<AdviceIndex> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let (_, index) = self
            .by_name
            .remove(name)
            .ok_or_else(|| WeaveError::definition(format!("advice '{name}' is not registered")))?;
        if let Some(slot) = slots.get_mut(index.0 as usize) {
            *slot = None;
        }
        tracing::debug!("unregistered advice {} ({})", name, index);
        Ok(index)
    }

    /// Releases per-instance and per-thread advice whose target or thread is
    /// gone. Happens on its own as those maps grow; returns how many were
    /// released.
    pub fn sweep_collected(&self) -> usize {
        let containers: Vec<_> = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            slots.iter().flatten().cloned().collect()
        };
        containers.iter().map(|container| container.sweep()).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weave_api::{JoinPoint, Value, WeaveResult};

    struct Noop;
    impl Advice for Noop {
        fn execute(&self, _jp: &mut dyn JoinPoint) -> WeaveResult<Value> {
            Ok(Value::unit())
        }
    }

    fn counting_factory(counter: Arc<AtomicUsize>) -> AdviceFactory {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Noop) as Arc<dyn Advice>
        })
    }

    #[test]
    fn indices_are_stable_and_never_reused() {
        let registry = AdviceRegistry::new();
        let a = registry.register_advice("a", Arc::new(Noop)).unwrap();
        let b = registry.register_advice("b", Arc::new(Noop)).unwrap();
        assert_eq!(registry.index_of("b").unwrap(), b);

        registry.unregister("a").unwrap();
        assert!(registry.advice(a, AdviceScope::default()).is_none());
        let c = registry.register_advice("c", Arc::new(Noop)).unwrap();
        assert_ne!(a, c);
        assert!(registry.index_of("a").unwrap_err().is_fatal());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = AdviceRegistry::new();
        registry.register_advice("a", Arc::new(Noop)).unwrap();
        assert!(registry.register_advice("a", Arc::new(Noop)).is_err());
    }

    #[test]
    fn per_class_creates_one_instance_per_class() {
        let registry = AdviceRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let index = registry
            .register("audit", DeploymentModel::PerClass, counting_factory(created.clone()))
            .unwrap();
        let scope = |class| AdviceScope {
            class_name: Some(class),
            instance: None,
        };
        let a1 = registry.advice(index, scope("foo.A")).unwrap();
        let a2 = registry.advice(index, scope("foo.A")).unwrap();
        let b = registry.advice(index, scope("foo.B")).unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn per_instance_tracks_target_identity() {
        let registry = AdviceRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let index = registry
            .register("cache", DeploymentModel::PerInstance, counting_factory(created.clone()))
            .unwrap();
        let first: Arc<dyn Any + Send + Sync> = Arc::new(1_u8);
        let second: Arc<dyn Any + Send + Sync> = Arc::new(2_u8);
        let scope = |target| AdviceScope {
            class_name: Some("foo.A"),
            instance: Some(target),
        };
        let x = registry.advice(index, scope(&first)).unwrap();
        let y = registry.advice(index, scope(&first)).unwrap();
        let z = registry.advice(index, scope(&second)).unwrap();
        assert!(Arc::ptr_eq(&x, &y));
        assert!(!Arc::ptr_eq(&x, &z));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn per_thread_creates_one_instance_per_thread() {
        let registry = Arc::new(AdviceRegistry::new());
        let created = Arc::new(AtomicUsize::new(0));
        let index = registry
            .register("tx", DeploymentModel::PerThread, counting_factory(created.clone()))
            .unwrap();
        let main = registry.advice(index, AdviceScope::default()).unwrap();
        let again = registry.advice(index, AdviceScope::default()).unwrap();
        assert!(Arc::ptr_eq(&main, &again));

        let remote = registry.clone();
        std::thread::spawn(move || {
            remote.advice(index, AdviceScope::default()).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    struct Counted(Arc<AtomicUsize>);

    impl Advice for Counted {
        fn execute(&self, join_point: &mut dyn JoinPoint) -> WeaveResult<Value> {
            join_point.proceed()
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn per_instance_advice_is_released_with_its_target() {
        let registry = AdviceRegistry::new();
        let dropped = Arc::new(AtomicUsize::new(0));
        let counter = dropped.clone();
        let index = registry
            .register(
                "cache",
                DeploymentModel::PerInstance,
                Arc::new(move || Arc::new(Counted(counter.clone())) as Arc<dyn Advice>),
            )
            .unwrap();

        for i in 0..100_u32 {
            let target: Arc<dyn Any + Send + Sync> = Arc::new(i);
            let scope = AdviceScope {
                class_name: Some("foo.A"),
                instance: Some(&target),
            };
            registry.advice(index, scope).unwrap();
        }
        // Growth alone keeps the map bounded.
        assert!(dropped.load(Ordering::SeqCst) >= 100 - SWEEP_FLOOR);

        registry.sweep_collected();
        assert_eq!(dropped.load(Ordering::SeqCst), 100);
        assert_eq!(registry.sweep_collected(), 0);
    }

    #[test]
    fn per_thread_advice_is_released_after_the_thread_exits() {
        let registry = Arc::new(AdviceRegistry::new());
        let dropped = Arc::new(AtomicUsize::new(0));
        let counter = dropped.clone();
        let index = registry
            .register(
                "tx",
                DeploymentModel::PerThread,
                Arc::new(move || Arc::new(Counted(counter.clone())) as Arc<dyn Advice>),
            )
            .unwrap();
        let main = registry.advice(index, AdviceScope::default()).unwrap();

        let remote = registry.clone();
        std::thread::spawn(move || {
            remote.advice(index, AdviceScope::default()).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(registry.sweep_collected(), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        let again = registry.advice(index, AdviceScope::default()).unwrap();
        assert!(Arc::ptr_eq(&main, &again));
    }
}
