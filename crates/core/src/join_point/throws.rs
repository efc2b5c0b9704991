use super::resolved::{ChainLink, ResolvedAdvice, link_chain};
use super::target::Target;
use crate::error::{WeaveError, WeaveResult};
use crate::pattern::Site;
use crate::pointcut::AdviceSlot;
use crate::system::AspectSystem;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;
use weave_api::{ClassMeta, JoinPoint, JoinPointKind, MethodMeta, Throwable, Value};

/// Handler-side join point for one (class, method, exception class) triple.
/// Built once per triple and cached by the owning system.
pub struct ThrowsJoinPoint {
    class: Arc<ClassMeta>,
    method: MethodMeta,
    exception: Arc<ClassMeta>,
    resolved: ResolvedAdvice,
}

impl ThrowsJoinPoint {
    pub(crate) fn new(
        system: &AspectSystem,
        class: Arc<ClassMeta>,
        method: MethodMeta,
        exception: Arc<ClassMeta>,
    ) -> WeaveResult<Self> {
        let site = Site::Throws {
            class: &class,
            method: &method,
            exception: &exception,
        };
        let matches = system.throws_pointcuts(&site)?;
        debug!(
            class = %class.name,
            method = %method.signature(),
            exception = %exception.name,
            pointcuts = matches.len(),
            "throws join point resolved"
        );
        let resolved = ResolvedAdvice::from_matches(matches, Vec::new())?;
        Ok(Self {
            class,
            method,
            exception,
            resolved,
        })
    }

    pub fn class(&self) -> &Arc<ClassMeta> {
        &self.class
    }

    pub fn method(&self) -> &MethodMeta {
        &self.method
    }

    pub fn exception(&self) -> &Arc<ClassMeta> {
        &self.exception
    }

    pub fn has_advice(&self) -> bool {
        !self.resolved.is_empty()
    }

    pub fn signature(&self) -> String {
        format!(
            "{}.{}#{}",
            self.class.name,
            self.method.signature(),
            self.exception.name
        )
    }

    pub(crate) fn is_for(&self, class: &str, method: &MethodMeta, exception: &str) -> bool {
        self.class.name == class && &self.method == method && self.exception.name == exception
    }

    /// Runs the throws advice for `throwable`. The chain's outcome replaces
    /// the failed call's outcome; proceeding past the last advice rethrows.
    pub fn dispatch(
        &self,
        system: &AspectSystem,
        target: &Target,
        instance: Option<&Arc<dyn Any + Send + Sync>>,
        throwable: Throwable,
    ) -> WeaveResult<Value> {
        let tuples = self.resolved.active(system, AdviceSlot::Around)?;
        let chain = link_chain(system, tuples, target, instance, &self.signature())?;
        let mut handler = ThrowsInvocation {
            join_point: self,
            target,
            instance: instance.cloned(),
            throwable,
            hide_frames: system.config().hide_dispatch_frames,
            chain,
            cursor: 0,
            result: Value::unit(),
        };
        handler.proceed()
    }
}

struct ThrowsInvocation<'a> {
    join_point: &'a ThrowsJoinPoint,
    target: &'a Target,
    instance: Option<Arc<dyn Any + Send + Sync>>,
    throwable: Throwable,
    hide_frames: bool,
    chain: Arc<[ChainLink]>,
    cursor: usize,
    result: Value,
}

impl JoinPoint for ThrowsInvocation<'_> {
    fn kind(&self) -> JoinPointKind {
        JoinPointKind::Throws
    }

    fn signature(&self) -> String {
        self.join_point.signature()
    }

    fn target_class(&self) -> Option<Arc<ClassMeta>> {
        self.target.live_class()
    }

    fn target_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.instance.clone()
    }

    fn method(&self) -> Option<&MethodMeta> {
        Some(&self.join_point.method)
    }

    fn result(&self) -> &Value {
        &self.result
    }

    fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    fn exception(&self) -> Option<&Throwable> {
        Some(&self.throwable)
    }

    fn proceed(&mut self) -> WeaveResult<Value> {
        let cursor = self.cursor;
        let Some(link) = self.chain.get(cursor).cloned() else {
            let mut rethrown = self.throwable.clone();
            if self.hide_frames {
                rethrown.strip_synthetic_frames();
            }
            return Err(WeaveError::Thrown(rethrown));
        };
        self.cursor = cursor + 1;
        let outcome = link.advice.execute(self);
        self.cursor = cursor;
        let value = outcome?;
        self.result = value.clone();
        Ok(value)
    }
}
