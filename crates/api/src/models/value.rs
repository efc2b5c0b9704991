use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased value passed through advice chains: invocation parameters,
/// results and field values.
///
/// Cloning is cheap; the payload is shared.
#[derive(Clone, Default)]
pub struct Value(Option<Arc<dyn Any + Send + Sync>>);

impl Value {
    /// The empty value, used for `void` results and unset slots.
    pub fn unit() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(Some(value))
    }

    pub fn is_unit(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }

    pub fn as_arc(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.0.clone()
    }

    /// Identity comparison of the shared payload.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("Value(unit)"),
            Some(_) => f.write_str("Value(..)"),
        }
    }
}
