use super::method::MethodJoinPoint;
use super::resolved::ChainLink;
use super::snapshot::{AdviceGroupSnapshot, JoinPointSnapshot};
use crate::cflow;
use crate::controller::Controller;
use crate::error::WeaveResult;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use weave_api::{ClassMeta, JoinPoint, JoinPointKind, MethodMeta, Value};

/// Per-execution state: cursor, parameters and result slot, plus the linked
/// chain shared with every copy of this frame.
pub(crate) struct Frame {
    chain: Arc<[ChainLink]>,
    controller: Arc<dyn Controller>,
    pub(crate) cursor: usize,
    parameters: Vec<Value>,
    result: Value,
    instance: Option<Arc<dyn Any + Send + Sync>>,
}

impl Frame {
    pub(crate) fn new(
        chain: Arc<[ChainLink]>,
        controller: Arc<dyn Controller>,
        parameters: Vec<Value>,
        instance: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Self {
        Self {
            chain,
            controller,
            cursor: 0,
            parameters,
            result: Value::unit(),
            instance,
        }
    }

    fn deep_copy(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            controller: self.controller.deep_copy(),
            cursor: self.cursor,
            parameters: self.parameters.clone(),
            result: self.result.clone(),
            instance: self.instance.clone(),
        }
    }
}

/// The continuation handed to around advice.
///
/// Borrows its join point and stays on the thread that created it; use
/// [`Invocation::deep_copy`] or [`JoinPoint::proceed_in_new_thread`] to get
/// something that can move:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use weave_api::JoinPoint;
/// # use weave_core::join_point::Invocation;
/// fn hand_off(invocation: &mut Invocation<'_>) {
///     std::thread::scope(|s| {
///         s.spawn(move || invocation.proceed());
///     });
/// }
/// ```
pub struct Invocation<'a> {
    join_point: &'a Arc<MethodJoinPoint>,
    frame: &'a mut Frame,
    _not_send: PhantomData<*const ()>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(join_point: &'a Arc<MethodJoinPoint>, frame: &'a mut Frame) -> Self {
        Self {
            join_point,
            frame,
            _not_send: PhantomData,
        }
    }

    /// Top-level entry: drives the chain and shapes the outcome.
    pub(crate) fn run(mut self) -> WeaveResult<Value> {
        let outcome = self.proceed();
        self.join_point.finish(outcome)
    }

    pub fn join_point(&self) -> &Arc<MethodJoinPoint> {
        self.join_point
    }

    /// Number of chain positions already entered.
    pub fn cursor(&self) -> usize {
        self.frame.cursor
    }

    pub fn chain_len(&self) -> usize {
        self.frame.chain.len()
    }

    /// Names of the advice in this execution's chain.
    pub fn advice_names(&self) -> Vec<String> {
        self.frame
            .chain
            .iter()
            .map(|link| link.tuple.name.clone())
            .collect()
    }

    /// Runs the advice at `position`, or the operation when `position` is past
    /// the end of the chain, with the cursor advanced by one. The cursor is
    /// restored afterwards so advice may proceed more than once.
    pub fn step_to(&mut self, position: usize) -> WeaveResult<Value> {
        let cursor = self.frame.cursor;
        self.frame.cursor = cursor + 1;
        let outcome = match self.frame.chain.get(position).cloned() {
            Some(link) => link
                .advice
                .execute(self)
                .map_err(|err| self.join_point.annotate(err, &link.tuple.name)),
            None => {
                let instance = self.frame.instance.clone();
                self.join_point
                    .invoke_operation(instance.as_ref(), &self.frame.parameters)
            }
        };
        self.frame.cursor = cursor;
        outcome
    }

    /// Independent copy with its own cursor, parameters and result slot.
    pub fn deep_copy(&self) -> DetachedInvocation {
        DetachedInvocation::new(self.join_point.clone(), self.frame.deep_copy())
    }

    pub fn snapshot(&self) -> WeaveResult<JoinPointSnapshot> {
        snapshot_at(self.join_point, &self.frame)
    }
}

fn snapshot_at(join_point: &MethodJoinPoint, frame: &Frame) -> WeaveResult<JoinPointSnapshot> {
    let mut snapshot = join_point.snapshot()?;
    snapshot.groups = vec![AdviceGroupSnapshot {
        pointcut: None,
        advice: frame.chain.iter().map(|link| link.tuple.clone()).collect(),
    }];
    snapshot.cursor = frame.cursor;
    Ok(snapshot)
}

impl JoinPoint for Invocation<'_> {
    fn kind(&self) -> JoinPointKind {
        JoinPointKind::MethodExecution
    }

    fn signature(&self) -> String {
        self.join_point.signature()
    }

    fn target_class(&self) -> Option<Arc<ClassMeta>> {
        self.join_point.target().live_class()
    }

    fn target_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.frame.instance.clone()
    }

    fn method(&self) -> Option<&MethodMeta> {
        Some(self.join_point.method())
    }

    fn parameters(&self) -> &[Value] {
        &self.frame.parameters
    }

    fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.frame.parameters = parameters;
    }

    fn result(&self) -> &Value {
        &self.frame.result
    }

    fn set_result(&mut self, value: Value) {
        self.frame.result = value;
    }

    fn detach(&self) -> Option<Box<dyn JoinPoint + Send>> {
        Some(Box::new(self.deep_copy()))
    }

    fn proceed(&mut self) -> WeaveResult<Value> {
        let controller = self.frame.controller.clone();
        let value = controller.proceed(self)?;
        self.frame.result = value.clone();
        Ok(value)
    }
}

/// An owned, `Send + 'static` copy of an invocation.
///
/// Shares the join point, metadata, chain and operation with the original;
/// cursor, parameters and result are its own.
pub struct DetachedInvocation {
    join_point: Arc<MethodJoinPoint>,
    frame: Frame,
}

impl DetachedInvocation {
    pub(crate) fn new(join_point: Arc<MethodJoinPoint>, frame: Frame) -> Self {
        Self { join_point, frame }
    }

    pub fn join_point(&self) -> &Arc<MethodJoinPoint> {
        &self.join_point
    }

    pub fn cursor(&self) -> usize {
        self.frame.cursor
    }

    pub fn deep_copy(&self) -> DetachedInvocation {
        DetachedInvocation::new(self.join_point.clone(), self.frame.deep_copy())
    }

    pub fn snapshot(&self) -> WeaveResult<JoinPointSnapshot> {
        snapshot_at(&self.join_point, &self.frame)
    }
}

impl JoinPoint for DetachedInvocation {
    fn kind(&self) -> JoinPointKind {
        JoinPointKind::MethodExecution
    }

    fn signature(&self) -> String {
        self.join_point.signature()
    }

    fn target_class(&self) -> Option<Arc<ClassMeta>> {
        self.join_point.target().live_class()
    }

    fn target_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.frame.instance.clone()
    }

    fn method(&self) -> Option<&MethodMeta> {
        Some(self.join_point.method())
    }

    fn parameters(&self) -> &[Value] {
        &self.frame.parameters
    }

    fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.frame.parameters = parameters;
    }

    fn result(&self) -> &Value {
        &self.frame.result
    }

    fn set_result(&mut self, value: Value) {
        self.frame.result = value;
    }

    fn detach(&self) -> Option<Box<dyn JoinPoint + Send>> {
        Some(Box::new(self.deep_copy()))
    }

    /// Continues from the copied cursor. The join point's cflow keys are
    /// active for the duration, on whichever thread this runs.
    fn proceed(&mut self) -> WeaveResult<Value> {
        let keys = self.join_point.resolved()?.cflow_keys().to_vec();
        let _cflow = cflow::enter(&keys);
        let join_point = self.join_point.clone();
        Invocation::new(&join_point, &mut self.frame).run()
    }
}
