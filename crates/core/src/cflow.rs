//! Per-thread control-flow tracking.
//!
//! Executing a method join point pushes the cflow keys its site matches and
//! pops them when the returned guard drops, so `is_active` answers "is this
//! thread currently inside a matching method".

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A cflow pattern scoped to one aspect system.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CflowKey(Arc<str>);

impl CflowKey {
    pub fn new(system: &str, pattern_source: &str) -> Self {
        Self(Arc::from(format!("{system}|{pattern_source}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CflowKey({})", self.0)
    }
}

thread_local! {
    static STACK: RefCell<Vec<CflowKey>> = const { RefCell::new(Vec::new()) };
}

/// Pops what `enter` pushed. Bound to the thread that created it.
#[must_use = "the keys are popped as soon as the guard is dropped"]
pub struct CflowGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CflowGuard {
    fn drop(&mut self) {
        STACK.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

pub fn enter(keys: &[CflowKey]) -> CflowGuard {
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.extend(keys.iter().cloned());
        depth
    });
    CflowGuard {
        depth,
        _not_send: PhantomData,
    }
}

pub fn is_active(key: &CflowKey) -> bool {
    STACK.with(|stack| stack.borrow().iter().any(|k| k == key))
}

pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}
