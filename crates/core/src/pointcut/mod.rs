//! Pointcuts: a boolean expression over named pattern definitions plus the
//! advice bound to it.

mod advice_list;
mod definition;

pub use advice_list::{AdviceList, AdviceTuple};
pub use definition::PointcutDefinition;

use crate::error::{WeaveError, WeaveResult};
use crate::expression::Expression;
use crate::pattern::{PatternKind, Site};
use crate::registry::{AdviceIndex, AdviceRegistry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Above this many cflow identifiers structural matching stops enumerating
/// assignments and keeps the pointcut, leaving the decision to dispatch time.
const MAX_ENUMERATED_CFLOW: usize = 12;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PointcutKind {
    Execution,
    Call,
    Get,
    Set,
    Throws,
}

impl PointcutKind {
    pub fn slots(&self) -> &'static [AdviceSlot] {
        match self {
            PointcutKind::Execution | PointcutKind::Throws => &[AdviceSlot::Around],
            PointcutKind::Call | PointcutKind::Get | PointcutKind::Set => {
                &[AdviceSlot::Pre, AdviceSlot::Post]
            }
        }
    }

    pub fn has_slot(&self, slot: AdviceSlot) -> bool {
        self.slots().contains(&slot)
    }

    fn accepts(&self, pattern: PatternKind) -> bool {
        match (self, pattern) {
            (_, PatternKind::Class) => true,
            (PointcutKind::Execution, PatternKind::Method | PatternKind::Constructor) => true,
            (PointcutKind::Call, PatternKind::CallerSide) => true,
            (PointcutKind::Get | PointcutKind::Set, PatternKind::Field) => true,
            (PointcutKind::Throws, PatternKind::Throws) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PointcutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PointcutKind::Execution => "execution",
            PointcutKind::Call => "call",
            PointcutKind::Get => "get",
            PointcutKind::Set => "set",
            PointcutKind::Throws => "throws",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AdviceSlot {
    Around,
    Pre,
    Post,
}

/// Result of structural matching against one site.
///
/// Static identifiers are already decided. Cflow identifiers are kept by
/// pattern source and looked up against the live call stack per execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralMatch {
    bindings: HashMap<String, bool>,
    cflow: Vec<(String, String)>,
}

impl StructuralMatch {
    pub fn is_dynamic(&self) -> bool {
        !self.cflow.is_empty()
    }

    /// `(identifier, pattern source)` of every cflow definition involved.
    pub fn cflow_sources(&self) -> impl Iterator<Item = &str> {
        self.cflow.iter().map(|(_, source)| source.as_str())
    }

    fn evaluate_with(
        &self,
        expression: &Expression,
        cflow_value: &dyn Fn(&str) -> bool,
    ) -> WeaveResult<bool> {
        let lookup = |id: &str| {
            if let Some(value) = self.bindings.get(id) {
                return Some(*value);
            }
            self.cflow
                .iter()
                .find(|(ident, _)| ident == id)
                .map(|(_, source)| cflow_value(source))
        };
        Ok(expression.evaluate(&lookup)?)
    }
}

pub struct Pointcut {
    aspect: String,
    name: String,
    kind: PointcutKind,
    expression: Expression,
    definitions: RwLock<IndexMap<String, Arc<PointcutDefinition>>>,
    around: AdviceList,
    pre: AdviceList,
    post: AdviceList,
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("aspect", &self.aspect)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("expression", &self.expression.source())
            .finish()
    }
}

impl Pointcut {
    pub fn new(aspect: &str, name: &str, kind: PointcutKind, expression: &str) -> WeaveResult<Self> {
        let expression = Expression::compile(expression)?;
        Ok(Self {
            aspect: aspect.to_string(),
            name: name.to_string(),
            kind,
            expression,
            definitions: RwLock::new(IndexMap::new()),
            around: AdviceList::new(),
            pre: AdviceList::new(),
            post: AdviceList::new(),
        })
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `aspect/name`.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.aspect, self.name)
    }

    pub fn kind(&self) -> PointcutKind {
        self.kind
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn add_pointcut_def(&self, definition: PointcutDefinition) -> WeaveResult<()> {
        let kind = definition.pattern().kind();
        if !definition.is_cflow() && !self.kind.accepts(kind) {
            return Err(WeaveError::definition(format!(
                "{kind:?} pattern '{}' cannot be used in {} pointcut '{}'",
                definition.source(),
                self.kind,
                self.qualified_name()
            )));
        }
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if definitions.contains_key(definition.name()) {
            return Err(WeaveError::definition(format!(
                "pointcut '{}' already defines '{}'",
                self.qualified_name(),
                definition.name()
            )));
        }
        definitions.insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    pub fn definitions(&self) -> Vec<Arc<PointcutDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn cflow_definitions(&self) -> Vec<Arc<PointcutDefinition>> {
        self.definitions()
            .into_iter()
            .filter(|d| d.is_cflow())
            .collect()
    }

    pub fn is_non_reentrant(&self) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|d| d.is_non_reentrant())
    }

    pub fn matches(&self, site: &Site<'_>) -> WeaveResult<bool> {
        Ok(self.structural_match(site)?.is_some())
    }

    /// Binds every static definition against `site`. Returns `None` when no
    /// assignment of the cflow identifiers can satisfy the expression.
    pub fn structural_match(&self, site: &Site<'_>) -> WeaveResult<Option<StructuralMatch>> {
        let mut found = StructuralMatch::default();
        for (id, definition) in self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            if definition.is_cflow() {
                found
                    .cflow
                    .push((id.clone(), definition.source().to_string()));
            } else {
                found.bindings.insert(id.clone(), definition.matches(site));
            }
        }

        let possible = if found.cflow.len() > MAX_ENUMERATED_CFLOW {
            // Still surfaces unbound identifiers.
            found.evaluate_with(&self.expression, &|_| true)?;
            true
        } else {
            let mut possible = false;
            for assignment in 0u32..(1 << found.cflow.len()) {
                let value = found.evaluate_with(&self.expression, &|source| {
                    let position = found
                        .cflow
                        .iter()
                        .position(|(_, s)| s == source)
                        .unwrap_or(0);
                    assignment & (1 << position) != 0
                })?;
                if value {
                    possible = true;
                    break;
                }
            }
            possible
        };

        debug!(
            pointcut = %self.qualified_name(),
            class = %site.declaring_class().name,
            matched = possible,
            "structural match"
        );
        Ok(possible.then_some(found))
    }

    /// Dispatch-time evaluation with `active` reporting whether the current
    /// thread is inside the control flow of a cflow pattern source.
    pub fn evaluate_dynamic(
        &self,
        found: &StructuralMatch,
        active: &dyn Fn(&str) -> bool,
    ) -> WeaveResult<bool> {
        if !found.is_dynamic() {
            return Ok(true);
        }
        found.evaluate_with(&self.expression, active)
    }

    fn list(&self, slot: AdviceSlot) -> WeaveResult<&AdviceList> {
        if !self.kind.has_slot(slot) {
            return Err(WeaveError::definition(format!(
                "{} pointcut '{}' has no {slot:?} advice",
                self.kind,
                self.qualified_name()
            )));
        }
        Ok(match slot {
            AdviceSlot::Around => &self.around,
            AdviceSlot::Pre => &self.pre,
            AdviceSlot::Post => &self.post,
        })
    }

    pub fn add_advice(&self, slot: AdviceSlot, name: &str, registry: &AdviceRegistry) -> WeaveResult<()> {
        let index = registry.index_of(name)?;
        self.list(slot)?.push(AdviceTuple::new(name, index))?;
        debug!(pointcut = %self.qualified_name(), advice = name, ?slot, "advice added");
        Ok(())
    }

    /// Adds all of `names` or none of them.
    pub fn add_advices(&self, slot: AdviceSlot, names: &[&str], registry: &AdviceRegistry) -> WeaveResult<()> {
        let tuples = names
            .iter()
            .map(|name| registry.index_of(name).map(|index| AdviceTuple::new(*name, index)))
            .collect::<WeaveResult<Vec<_>>>()?;
        self.list(slot)?.update(|current| {
            for tuple in tuples {
                if current.iter().any(|t| t.name == tuple.name) {
                    return Err(WeaveError::definition(format!(
                        "advice '{}' is already bound",
                        tuple.name
                    )));
                }
                current.push(tuple);
            }
            Ok(())
        })
    }

    pub fn remove_advice(&self, slot: AdviceSlot, name: &str) -> WeaveResult<()> {
        self.list(slot)?.remove(name)?;
        debug!(pointcut = %self.qualified_name(), advice = name, ?slot, "advice removed");
        Ok(())
    }

    pub fn advice_index_tuples(&self, slot: AdviceSlot) -> WeaveResult<Arc<[AdviceTuple]>> {
        Ok(self.list(slot)?.snapshot())
    }

    /// Replaces the whole list. Every tuple must name a distinct advice
    /// registered at exactly that index.
    pub fn set_advice_index_tuples(
        &self,
        slot: AdviceSlot,
        tuples: Vec<AdviceTuple>,
        registry: &AdviceRegistry,
    ) -> WeaveResult<()> {
        let list = self.list(slot)?;
        let mut seen = HashSet::with_capacity(tuples.len());
        for tuple in &tuples {
            if !seen.insert(tuple.name.as_str()) {
                return Err(WeaveError::definition(format!(
                    "advice '{}' is bound twice to '{}'",
                    tuple.name,
                    self.qualified_name()
                )));
            }
            let index = registry.index_of(&tuple.name)?;
            if index != tuple.index {
                return Err(WeaveError::definition(format!(
                    "advice '{}' is registered as {index}, not {}",
                    tuple.name, tuple.index
                )));
            }
        }
        list.replace(tuples);
        debug!(pointcut = %self.qualified_name(), ?slot, "advice list replaced");
        Ok(())
    }

    /// Moves `name` to `position`, clamped to the end of the list.
    pub fn move_advice(&self, slot: AdviceSlot, name: &str, position: usize) -> WeaveResult<()> {
        self.list(slot)?.update(|tuples| {
            let from = tuples.iter().position(|t| t.name == name).ok_or_else(|| {
                WeaveError::definition(format!("advice '{name}' is not bound"))
            })?;
            let tuple = tuples.remove(from);
            let to = position.min(tuples.len());
            tuples.insert(to, tuple);
            Ok(())
        })
    }

    pub fn advice_indices(&self, slot: AdviceSlot) -> WeaveResult<Vec<AdviceIndex>> {
        Ok(self
            .advice_index_tuples(slot)?
            .iter()
            .map(|t| t.index)
            .collect())
    }

    /// Bindings whose name no longer maps to the cached index.
    pub fn stale_bindings(&self, registry: &AdviceRegistry) -> Vec<AdviceTuple> {
        self.kind
            .slots()
            .iter()
            .filter_map(|slot| self.list(*slot).ok())
            .flat_map(|list| list.snapshot().to_vec())
            .filter(|tuple| registry.index_of(&tuple.name).ok() != Some(tuple.index))
            .collect()
    }
}
