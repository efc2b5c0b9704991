use super::access::{Access, AccessSite, PrePostDispatch};
use super::resolved::ResolvedAdvice;
use super::target::Target;
use crate::error::{WeaveError, WeaveResult};
use crate::pattern::Site;
use crate::pointcut::PointcutKind;
use crate::system::AspectSystem;
use std::sync::Arc;
use tracing::debug;
use weave_api::{FieldMeta, JoinPointKind, Throwable, Value};

/// Get or set join point of a field.
pub struct FieldJoinPoint {
    kind: PointcutKind,
    field: FieldMeta,
    dispatch: PrePostDispatch,
}

impl FieldJoinPoint {
    /// `kind` is [`PointcutKind::Get`] or [`PointcutKind::Set`].
    pub fn new(
        system: Arc<AspectSystem>,
        kind: PointcutKind,
        target: Target,
        field: FieldMeta,
    ) -> WeaveResult<Self> {
        if !matches!(kind, PointcutKind::Get | PointcutKind::Set) {
            return Err(WeaveError::definition(format!(
                "field join point cannot be a {kind} join point"
            )));
        }
        Ok(Self {
            kind,
            field,
            dispatch: PrePostDispatch::new(system, target),
        })
    }

    pub fn kind(&self) -> JoinPointKind {
        match self.kind {
            PointcutKind::Set => JoinPointKind::FieldSet,
            _ => JoinPointKind::FieldGet,
        }
    }

    pub fn field(&self) -> &FieldMeta {
        &self.field
    }

    pub fn target(&self) -> &Target {
        &self.dispatch.target
    }

    pub fn signature(&self) -> String {
        format!("{}.{}", self.dispatch.target.class().name, self.field.name)
    }

    pub fn is_resolved(&self) -> bool {
        self.dispatch.is_resolved()
    }

    fn resolved(&self) -> WeaveResult<&ResolvedAdvice> {
        self.dispatch.resolved(|system| {
            let site = Site::Field {
                class: self.dispatch.target.class(),
                field: &self.field,
            };
            let matches = system.field_pointcuts(self.kind, &site)?;
            debug!(site = %self.signature(), pointcuts = matches.len(), "field join point resolved");
            ResolvedAdvice::from_matches(matches, Vec::new())
        })
    }

    /// Runs pre advice in binding order. For a set, `parameters` holds the
    /// value being assigned.
    pub fn pre(&self, parameters: Vec<Value>) -> WeaveResult<Access<'_>> {
        let resolved = self.resolved()?;
        let site = AccessSite {
            kind: self.kind(),
            signature: self.signature(),
            method: None,
            field: Some(&self.field),
        };
        self.dispatch.pre(resolved, site, parameters)
    }

    /// Runs post advice in reverse binding order and returns the result.
    /// `access` must come from this join point's `pre`.
    pub fn post(&self, access: Access<'_>) -> WeaveResult<Value> {
        self.dispatch.post(access)
    }

    /// `pre`, the access itself, then `post`; returns the (possibly
    /// replaced) result.
    pub fn around<F>(&self, parameters: Vec<Value>, op: F) -> WeaveResult<Value>
    where
        F: FnOnce(&[Value]) -> Result<Value, Throwable>,
    {
        self.pre(parameters)?.complete(op)
    }
}
