use crate::error::WeaveResult;
use crate::models::{ClassMeta, FieldMeta, MethodMeta, Throwable, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinPointKind {
    MethodExecution,
    CallerSide,
    FieldGet,
    FieldSet,
    Throws,
}

/// The view of an interception site handed to advice.
pub trait JoinPoint {
    fn kind(&self) -> JoinPointKind;

    /// Human readable site signature, e.g. `foo.Bar.save(java.lang.String)`.
    fn signature(&self) -> String;

    /// `None` once a weakly held target has been dropped.
    fn target_class(&self) -> Option<Arc<ClassMeta>>;

    /// `None` for static sites or once the target has been dropped.
    fn target_instance(&self) -> Option<Arc<dyn Any + Send + Sync>>;

    fn method(&self) -> Option<&MethodMeta> {
        None
    }

    fn field(&self) -> Option<&FieldMeta> {
        None
    }

    fn parameters(&self) -> &[Value] {
        &[]
    }

    fn set_parameters(&mut self, _parameters: Vec<Value>) {}

    fn result(&self) -> &Value;

    fn set_result(&mut self, value: Value);

    fn exception(&self) -> Option<&Throwable> {
        None
    }

    /// Continues to the next advice, or to the intercepted operation at the
    /// end of the chain.
    fn proceed(&mut self) -> WeaveResult<Value>;

    /// An owned copy with its own position, parameters and result that may
    /// be moved to another thread. `None` when the join point cannot be
    /// detached.
    fn detach(&self) -> Option<Box<dyn JoinPoint + Send>> {
        None
    }

    /// Proceeds with a detached copy on a new thread. Plain `proceed` must
    /// never be called from another thread; this is the supported way.
    fn proceed_in_new_thread(&self) -> Option<JoinHandle<WeaveResult<Value>>> {
        let mut copy = self.detach()?;
        Some(std::thread::spawn(move || copy.proceed()))
    }
}
