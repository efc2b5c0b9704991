use super::access::{Access, AccessSite, PrePostDispatch};
use super::resolved::ResolvedAdvice;
use super::target::Target;
use crate::error::WeaveResult;
use crate::pattern::Site;
use crate::system::AspectSystem;
use std::sync::Arc;
use tracing::debug;
use weave_api::{ClassMeta, JoinPointKind, MethodMeta, Throwable, Value};

/// Call join point, seen from the calling class.
pub struct CallerSideJoinPoint {
    caller: Arc<ClassMeta>,
    method: MethodMeta,
    dispatch: PrePostDispatch,
}

impl CallerSideJoinPoint {
    /// `callee` is the class (or instance) declaring `method`.
    pub fn new(
        system: Arc<AspectSystem>,
        caller: Arc<ClassMeta>,
        callee: Target,
        method: MethodMeta,
    ) -> Self {
        Self {
            caller,
            method,
            dispatch: PrePostDispatch::new(system, callee),
        }
    }

    pub fn kind(&self) -> JoinPointKind {
        JoinPointKind::CallerSide
    }

    pub fn caller(&self) -> &Arc<ClassMeta> {
        &self.caller
    }

    pub fn method(&self) -> &MethodMeta {
        &self.method
    }

    pub fn signature(&self) -> String {
        format!(
            "{}->{}.{}",
            self.caller.name,
            self.dispatch.target.class().name,
            self.method.signature()
        )
    }

    pub fn is_resolved(&self) -> bool {
        self.dispatch.is_resolved()
    }

    fn resolved(&self) -> WeaveResult<&ResolvedAdvice> {
        self.dispatch.resolved(|system| {
            let site = Site::CallerSide {
                caller: &self.caller,
                callee: self.dispatch.target.class(),
                method: &self.method,
            };
            let matches = system.call_pointcuts(&site)?;
            debug!(site = %self.signature(), pointcuts = matches.len(), "caller side join point resolved");
            ResolvedAdvice::from_matches(matches, Vec::new())
        })
    }

    pub fn pre(&self, parameters: Vec<Value>) -> WeaveResult<Access<'_>> {
        let resolved = self.resolved()?;
        let site = AccessSite {
            kind: JoinPointKind::CallerSide,
            signature: self.signature(),
            method: Some(&self.method),
            field: None,
        };
        self.dispatch.pre(resolved, site, parameters)
    }

    /// Runs post advice in reverse binding order and returns the result.
    /// `access` must come from this join point's `pre`.
    pub fn post(&self, access: Access<'_>) -> WeaveResult<Value> {
        self.dispatch.post(access)
    }

    pub fn around<F>(&self, parameters: Vec<Value>, op: F) -> WeaveResult<Value>
    where
        F: FnOnce(&[Value]) -> Result<Value, Throwable>,
    {
        self.pre(parameters)?.complete(op)
    }
}
