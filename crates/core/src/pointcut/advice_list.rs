use crate::error::{WeaveError, WeaveResult};
use crate::registry::AdviceIndex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// An advice name paired with its registry index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdviceTuple {
    pub name: String,
    pub index: AdviceIndex,
}

impl AdviceTuple {
    pub fn new(name: impl Into<String>, index: AdviceIndex) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Ordered advice bindings, replaced wholesale on every mutation.
///
/// Readers take a snapshot `Arc` and never observe a partially applied
/// update; writers copy, edit and swap under the write lock.
#[derive(Debug, Default)]
pub struct AdviceList {
    tuples: RwLock<Arc<[AdviceTuple]>>,
}

impl AdviceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<[AdviceTuple]> {
        self.tuples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, tuples: Vec<AdviceTuple>) {
        let mut guard = self.tuples.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::from(tuples);
    }

    /// Applies `edit` to a private copy and publishes it only on success.
    pub fn update<F>(&self, edit: F) -> WeaveResult<()>
    where
        F: FnOnce(&mut Vec<AdviceTuple>) -> WeaveResult<()>,
    {
        let mut guard = self.tuples.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.to_vec();
        edit(&mut next)?;
        *guard = Arc::from(next);
        Ok(())
    }

    pub fn push(&self, tuple: AdviceTuple) -> WeaveResult<()> {
        self.update(|tuples| {
            if tuples.iter().any(|t| t.name == tuple.name) {
                return Err(WeaveError::definition(format!(
                    "advice '{}' is already bound",
                    tuple.name
                )));
            }
            tuples.push(tuple);
            Ok(())
        })
    }

    pub fn remove(&self, name: &str) -> WeaveResult<AdviceTuple> {
        let mut removed = None;
        self.update(|tuples| {
            let position = tuples.iter().position(|t| t.name == name).ok_or_else(|| {
                WeaveError::definition(format!("advice '{name}' is not bound"))
            })?;
            removed = Some(tuples.remove(position));
            Ok(())
        })?;
        removed.ok_or_else(|| WeaveError::definition(format!("advice '{name}' is not bound")))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
