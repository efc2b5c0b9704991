use super::resolved::{ChainLink, ResolvedAdvice, link_chain};
use super::target::Target;
use crate::error::{WeaveError, WeaveResult};
use crate::pointcut::AdviceSlot;
use crate::system::AspectSystem;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;
use weave_api::{ClassMeta, FieldMeta, JoinPoint, JoinPointKind, MethodMeta, Throwable, Value};

/// Lazily resolved pre/post advice shared by field and caller-side join
/// points.
pub(crate) struct PrePostDispatch {
    pub(crate) system: Arc<AspectSystem>,
    pub(crate) target: Target,
    resolved: OnceCell<ResolvedAdvice>,
}

/// Site description borrowed from the owning join point.
pub(crate) struct AccessSite<'a> {
    pub(crate) kind: JoinPointKind,
    pub(crate) signature: String,
    pub(crate) method: Option<&'a MethodMeta>,
    pub(crate) field: Option<&'a FieldMeta>,
}

impl PrePostDispatch {
    pub(crate) fn new(system: Arc<AspectSystem>, target: Target) -> Self {
        system.initialize();
        Self {
            system,
            target,
            resolved: OnceCell::new(),
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    pub(crate) fn resolved<F>(&self, resolve: F) -> WeaveResult<&ResolvedAdvice>
    where
        F: FnOnce(&AspectSystem) -> WeaveResult<ResolvedAdvice>,
    {
        self.resolved.get_or_try_init(|| resolve(&self.system))
    }

    /// Links both chains for one access and runs the pre advice.
    pub(crate) fn pre<'a>(
        &'a self,
        resolved: &ResolvedAdvice,
        site: AccessSite<'a>,
        parameters: Vec<Value>,
    ) -> WeaveResult<Access<'a>> {
        let instance = self.target.dispatch_instance()?;
        let link = |slot| -> WeaveResult<Arc<[ChainLink]>> {
            link_chain(
                &self.system,
                resolved.active(&self.system, slot)?,
                &self.target,
                instance.as_ref(),
                &site.signature,
            )
        };
        let pre = link(AdviceSlot::Pre)?;
        let post = link(AdviceSlot::Post)?;
        let mut access = Access {
            site,
            target: &self.target,
            instance,
            parameters,
            result: Value::unit(),
            post,
        };
        for advice in pre.iter() {
            advice.advice.execute(&mut access)?;
        }
        Ok(access)
    }

    /// Ends an access begun by [`PrePostDispatch::pre`] on this dispatcher.
    pub(crate) fn post(&self, access: Access<'_>) -> WeaveResult<Value> {
        if !access.started_by(self) {
            return Err(WeaveError::definition(format!(
                "access to {} was not started by this join point",
                access.site.signature
            )));
        }
        access.post()
    }
}

/// One field access or call in progress between its pre and post advice.
pub struct Access<'a> {
    site: AccessSite<'a>,
    target: &'a Target,
    instance: Option<Arc<dyn Any + Send + Sync>>,
    parameters: Vec<Value>,
    result: Value,
    post: Arc<[ChainLink]>,
}

impl Access<'_> {
    /// Runs post advice in reverse binding order and ends the access,
    /// returning the (possibly replaced) result.
    pub fn post(mut self) -> WeaveResult<Value> {
        let post = self.post.clone();
        for advice in post.iter().rev() {
            advice.advice.execute(&mut self)?;
        }
        Ok(self.result)
    }

    pub(crate) fn started_by(&self, dispatch: &PrePostDispatch) -> bool {
        std::ptr::eq(self.target, &dispatch.target)
    }

    /// `pre`, `op`, `post`. An exception from `op` skips the post advice.
    pub(crate) fn complete<F>(mut self, op: F) -> WeaveResult<Value>
    where
        F: FnOnce(&[Value]) -> Result<Value, Throwable>,
    {
        self.result = op(&self.parameters).map_err(WeaveError::Thrown)?;
        self.post()
    }
}

impl JoinPoint for Access<'_> {
    fn kind(&self) -> JoinPointKind {
        self.site.kind
    }

    fn signature(&self) -> String {
        self.site.signature.clone()
    }

    fn target_class(&self) -> Option<Arc<ClassMeta>> {
        self.target.live_class()
    }

    fn target_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.instance.clone()
    }

    fn method(&self) -> Option<&MethodMeta> {
        self.site.method
    }

    fn field(&self) -> Option<&FieldMeta> {
        self.site.field
    }

    fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.parameters = parameters;
    }

    fn result(&self) -> &Value {
        &self.result
    }

    fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    /// Pre and post advice have nothing to continue to.
    fn proceed(&mut self) -> WeaveResult<Value> {
        Ok(self.result.clone())
    }
}
