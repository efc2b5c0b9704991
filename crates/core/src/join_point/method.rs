use super::invocation::{DetachedInvocation, Frame, Invocation};
use super::resolved::{ResolvedAdvice, link_chain};
use super::snapshot::JoinPointSnapshot;
use super::target::Target;
use crate::cflow;
use crate::controller::Controller;
use crate::error::{WeaveError, WeaveResult};
use crate::pattern::Site;
use crate::pointcut::AdviceSlot;
use crate::system::{AspectSystem, SystemTable};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use tracing::debug;
use weave_api::{JoinPointKind, MethodMeta, StackFrame, Throwable, Value};

/// The intercepted method body, invoked at the end of the advice chain.
pub type Operation = Arc<
    dyn Fn(Option<&Arc<dyn Any + Send + Sync>>, &[Value]) -> Result<Value, Throwable> + Send + Sync,
>;

/// Threads currently inside a non-reentrant join point, plus the value a
/// nested call on one of them gets back.
#[derive(Default)]
struct ReentrancyGuard {
    active: Mutex<HashSet<ThreadId>>,
    last_result: Mutex<Value>,
}

struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    thread: ThreadId,
}

impl ReentrancyGuard {
    fn enter(&self) -> Option<Entered<'_>> {
        let thread = thread::current().id();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.insert(thread).then_some(Entered {
            guard: self,
            thread,
        })
    }

    fn last_result(&self) -> Value {
        self.last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, value: &Value) {
        *self.last_result.lock().unwrap_or_else(PoisonError::into_inner) = value.clone();
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread);
    }
}

/// Execution join point of a method or constructor.
///
/// Shared across threads through `Arc`; every call to [`proceed`] gets its
/// own [`Invocation`] frame.
///
/// [`proceed`]: MethodJoinPoint::proceed
pub struct MethodJoinPoint {
    system: Arc<AspectSystem>,
    target: Target,
    method: MethodMeta,
    operation: Operation,
    controller: Arc<dyn Controller>,
    resolved: OnceCell<ResolvedAdvice>,
    reentrancy: ReentrancyGuard,
}

impl MethodJoinPoint {
    /// Uses the system's configured default controller.
    pub fn new(
        system: Arc<AspectSystem>,
        target: Target,
        method: MethodMeta,
        operation: Operation,
    ) -> WeaveResult<Arc<Self>> {
        let controller = system.config().default_controller.clone();
        Self::with_controller(system, target, method, operation, &controller)
    }

    pub fn with_controller(
        system: Arc<AspectSystem>,
        target: Target,
        method: MethodMeta,
        operation: Operation,
        controller: &str,
    ) -> WeaveResult<Arc<Self>> {
        system.initialize();
        let controller = system.controllers().get(controller)?;
        Ok(Arc::new(Self {
            system,
            target,
            method,
            operation,
            controller,
            resolved: OnceCell::new(),
            reentrancy: ReentrancyGuard::default(),
        }))
    }

    pub fn system(&self) -> &Arc<AspectSystem> {
        &self.system
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn method(&self) -> &MethodMeta {
        &self.method
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.controller
    }

    pub fn signature(&self) -> String {
        format!("{}.{}", self.target.class().name, self.method.signature())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    pub(crate) fn resolved(&self) -> WeaveResult<&ResolvedAdvice> {
        self.resolved.get_or_try_init(|| {
            let class = self.target.class();
            let site = Site::Method {
                class,
                method: &self.method,
            };
            let matches = self.system.execution_pointcuts(&site)?;
            let cflow_keys = self.system.cflow_keys_for(&site);
            debug!(
                site = %self.signature(),
                pointcuts = matches.len(),
                cflow = cflow_keys.len(),
                "method join point resolved"
            );
            ResolvedAdvice::from_matches(matches, cflow_keys)
        })
    }

    /// Advice indices in chain order, ignoring cflow conditions.
    pub fn advice_tuples(&self) -> WeaveResult<Vec<crate::pointcut::AdviceTuple>> {
        Ok(self.resolved()?.all(AdviceSlot::Around))
    }

    /// Runs the advice chain and the operation with `parameters`.
    ///
    /// On a non-reentrant join point a nested call from the same thread
    /// returns the last computed result without running anything.
    pub fn proceed(self: &Arc<Self>, parameters: Vec<Value>) -> WeaveResult<Value> {
        let resolved = self.resolved()?;
        let _entered = if resolved.is_non_reentrant() {
            match self.reentrancy.enter() {
                Some(entered) => Some(entered),
                None => {
                    debug!(site = %self.signature(), "reentrant call short-circuited");
                    return Ok(self.reentrancy.last_result());
                }
            }
        } else {
            None
        };

        let _cflow = cflow::enter(resolved.cflow_keys());
        let mut frame = self.new_frame(resolved, parameters)?;
        let outcome = Invocation::new(self, &mut frame).run();
        if let Ok(value) = &outcome {
            if resolved.is_non_reentrant() {
                self.reentrancy.record(value);
            }
        }
        outcome
    }

    pub(crate) fn new_frame(&self, resolved: &ResolvedAdvice, parameters: Vec<Value>) -> WeaveResult<Frame> {
        let instance = self.target.dispatch_instance()?;
        let tuples = resolved.active(&self.system, AdviceSlot::Around)?;
        let chain = link_chain(
            &self.system,
            tuples,
            &self.target,
            instance.as_ref(),
            &self.signature(),
        )?;
        Ok(Frame::new(chain, self.controller.clone(), parameters, instance))
    }

    /// Calls the operation. A thrown exception is offered to matching
    /// throws pointcuts before it propagates.
    pub(crate) fn invoke_operation(
        &self,
        instance: Option<&Arc<dyn Any + Send + Sync>>,
        parameters: &[Value],
    ) -> WeaveResult<Value> {
        match (self.operation)(instance, parameters) {
            Ok(value) => Ok(value),
            Err(throwable) => self.redirect_throw(throwable, instance),
        }
    }

    fn redirect_throw(
        &self,
        mut throwable: Throwable,
        instance: Option<&Arc<dyn Any + Send + Sync>>,
    ) -> WeaveResult<Value> {
        let exception = self
            .system
            .metadata()
            .create_class_meta(&throwable.class_name)?;
        let throws = self
            .system
            .throws_join_point(self.target.class(), &self.method, &exception)?;
        if throws.has_advice() {
            debug!(site = %self.signature(), exception = %throwable.class_name, "redirecting to throws advice");
            return throws.dispatch(&self.system, &self.target, instance, throwable);
        }
        if self.system.config().hide_dispatch_frames {
            throwable.strip_synthetic_frames();
        }
        Err(WeaveError::Thrown(throwable))
    }

    /// Marks an exception leaving advice `name` with a dispatch frame.
    pub(crate) fn annotate(&self, err: WeaveError, advice: &str) -> WeaveError {
        match err {
            WeaveError::Thrown(mut throwable) => {
                throwable.push_frame(StackFrame::synthetic(
                    self.target.class().name.clone(),
                    format!("{}$advice${advice}", self.method.name),
                ));
                WeaveError::Thrown(throwable)
            }
            other => other,
        }
    }

    /// Final shape of an outcome leaving the join point.
    pub(crate) fn finish(&self, outcome: WeaveResult<Value>) -> WeaveResult<Value> {
        match outcome {
            Err(WeaveError::Thrown(mut throwable)) if self.system.config().hide_dispatch_frames => {
                throwable.strip_synthetic_frames();
                Err(WeaveError::Thrown(throwable))
            }
            other => other,
        }
    }

    pub fn snapshot(&self) -> WeaveResult<JoinPointSnapshot> {
        let resolved = self.resolved()?;
        Ok(JoinPointSnapshot {
            system: self.system.uuid().to_string(),
            kind: JoinPointKind::MethodExecution,
            class_name: self.target.class().name.clone(),
            method: Some(self.method.clone()),
            field: None,
            controller: self.controller.name().to_string(),
            groups: resolved.group_snapshots(AdviceSlot::Around),
            non_reentrant: resolved.is_non_reentrant(),
            cursor: 0,
        })
    }

    /// Rebuilds a join point from `snapshot` against the live system found
    /// in `table`. The target is static; instances are never persisted.
    pub fn restore(
        snapshot: &JoinPointSnapshot,
        table: &SystemTable,
        operation: Operation,
    ) -> WeaveResult<Arc<Self>> {
        if snapshot.kind != JoinPointKind::MethodExecution {
            return Err(WeaveError::definition(format!(
                "cannot restore a {:?} snapshot as a method join point",
                snapshot.kind
            )));
        }
        let method = snapshot.method.clone().ok_or_else(|| {
            WeaveError::definition(format!(
                "snapshot of {} has no method metadata",
                snapshot.class_name
            ))
        })?;
        let system = table.get_system(&snapshot.system);
        let class = system.metadata().create_class_meta(&snapshot.class_name)?;
        let site = Site::Method {
            class: &class,
            method: &method,
        };
        let cflow_keys = system.cflow_keys_for(&site);
        let resolved = ResolvedAdvice::from_snapshot(
            &system,
            &site,
            AdviceSlot::Around,
            &snapshot.groups,
            snapshot.non_reentrant,
            cflow_keys,
        )?;
        let join_point = Self::with_controller(
            system.clone(),
            Target::of_class(class.clone()),
            method.clone(),
            operation,
            &snapshot.controller,
        )?;
        // Freshly built, so the cell is empty.
        let _ = join_point.resolved.set(resolved);
        debug!(site = %join_point.signature(), "method join point restored");
        Ok(join_point)
    }

    /// Detached frame positioned at `cursor`, e.g. after restoring a
    /// snapshot taken mid-chain.
    pub fn detach_at(
        self: &Arc<Self>,
        cursor: usize,
        parameters: Vec<Value>,
    ) -> WeaveResult<DetachedInvocation> {
        let resolved = self.resolved()?;
        let mut frame = self.new_frame(resolved, parameters)?;
        frame.cursor = cursor;
        Ok(DetachedInvocation::new(self.clone(), frame))
    }
}
