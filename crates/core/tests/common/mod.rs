//! Fluent fixtures shared by the integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, Mutex};
use weave_api::{Advice, DeploymentModel, JoinPoint, Throwable, Value, WeaveResult};
use weave_core::metadata::StaticTypeSource;
use weave_core::pattern::PatternKind;
use weave_core::{
    AdviceSlot, AspectSystem, Operation, Pointcut, PointcutDefinition, PointcutKind, SystemConfig,
};

/// Builds an aspect system with advice, pointcuts and bindings in one chain.
pub struct MockAspects {
    system: Arc<AspectSystem>,
    last_pointcut: Option<Arc<Pointcut>>,
}

impl MockAspects {
    pub fn new(source: StaticTypeSource) -> Self {
        Self::with_config(source, SystemConfig::default())
    }

    pub fn with_config(source: StaticTypeSource, config: SystemConfig) -> Self {
        let system = AspectSystem::builder("test")
            .with_config(config)
            .with_type_source(Arc::new(source))
            .build();
        Self {
            system: Arc::new(system),
            last_pointcut: None,
        }
    }

    pub fn advice<A: Advice + 'static>(self, name: &str, advice: A) -> Self {
        self.system
            .registry()
            .register_advice(name, Arc::new(advice))
            .unwrap();
        self
    }

    pub fn deployed<A, F>(self, name: &str, model: DeploymentModel, factory: F) -> Self
    where
        A: Advice + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.system
            .registry()
            .register(name, model, Arc::new(move || Arc::new(factory()) as Arc<dyn Advice>))
            .unwrap();
        self
    }

    /// Adds a pointcut whose expression is the single identifier `p`.
    pub fn pointcut(self, kind: PointcutKind, name: &str, pattern_kind: PatternKind, pattern: &str) -> Self {
        self.expression(kind, name, "p", &[("p", pattern_kind, pattern)])
    }

    pub fn expression(
        mut self,
        kind: PointcutKind,
        name: &str,
        expression: &str,
        defs: &[(&str, PatternKind, &str)],
    ) -> Self {
        let pointcut = Pointcut::new("mock", name, kind, expression).unwrap();
        for (id, pattern_kind, pattern) in defs {
            pointcut
                .add_pointcut_def(PointcutDefinition::new(id, *pattern_kind, pattern).unwrap())
                .unwrap();
        }
        self.last_pointcut = Some(self.system.add_pointcut(pointcut).unwrap());
        self
    }

    pub fn cflow(self, id: &str, pattern: &str) -> Self {
        self.current()
            .add_pointcut_def(PointcutDefinition::cflow(id, pattern).unwrap())
            .unwrap();
        self
    }

    pub fn non_reentrant(self, id: &str, kind: PatternKind, pattern: &str) -> Self {
        let def = PointcutDefinition::new(id, kind, pattern)
            .unwrap()
            .with_non_reentrant(true);
        self.current().add_pointcut_def(def).unwrap();
        self
    }

    /// Binds advice to the most recently added pointcut.
    pub fn bind(self, slot: AdviceSlot, names: &[&str]) -> Self {
        self.current()
            .add_advices(slot, names, self.system.registry())
            .unwrap();
        self
    }

    fn current(&self) -> &Arc<Pointcut> {
        self.last_pointcut.as_ref().expect("no pointcut added yet")
    }

    pub fn build(self) -> Arc<AspectSystem> {
        self.system
    }
}

/// Shared, ordered log of advice activity.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Advice that records `label` and does nothing else.
    pub fn mark(&self, label: &str) -> impl Advice + 'static {
        let trace = self.clone();
        let label = label.to_string();
        move |_: &mut dyn JoinPoint| -> WeaveResult<Value> {
            trace.push(label.clone());
            Ok(Value::unit())
        }
    }

    /// Around advice that records `label` before and after proceeding.
    pub fn around(&self, label: &str) -> impl Advice + 'static {
        let trace = self.clone();
        let label = label.to_string();
        move |jp: &mut dyn JoinPoint| -> WeaveResult<Value> {
            trace.push(format!("{label}:before"));
            let value = jp.proceed()?;
            trace.push(format!("{label}:after"));
            Ok(value)
        }
    }
}

pub fn returning(value: i64) -> Operation {
    Arc::new(move |_: Option<&Arc<dyn Any + Send + Sync>>, _: &[Value]| -> Result<Value, Throwable> {
        Ok(Value::new(value))
    })
}

pub fn throwing(class_name: &'static str, message: &'static str) -> Operation {
    Arc::new(move |_: Option<&Arc<dyn Any + Send + Sync>>, _: &[Value]| -> Result<Value, Throwable> {
        Err(Throwable::new(class_name, message))
    })
}

/// Sums the `i64` parameters and records "op".
pub fn sum_operation(trace: Trace) -> Operation {
    Arc::new(move |_: Option<&Arc<dyn Any + Send + Sync>>, params: &[Value]| -> Result<Value, Throwable> {
        trace.push("op");
        Ok(Value::new(
            params.iter().filter_map(|p| p.downcast_ref::<i64>()).sum::<i64>(),
        ))
    })
}
