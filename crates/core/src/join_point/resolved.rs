use super::snapshot::AdviceGroupSnapshot;
use super::target::Target;
use crate::cflow::{self, CflowKey};
use crate::error::{WeaveError, WeaveResult};
use crate::pattern::Site;
use crate::pointcut::{AdviceSlot, AdviceTuple, Pointcut, StructuralMatch};
use crate::registry::AdviceScope;
use crate::system::{AspectSystem, PointcutMatch};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, warn};
use weave_api::Advice;

/// Advice bindings of one pointcut, captured at resolution time.
struct AdviceGroup {
    pointcut: Option<Arc<Pointcut>>,
    found: StructuralMatch,
    around: Arc<[AdviceTuple]>,
    pre: Arc<[AdviceTuple]>,
    post: Arc<[AdviceTuple]>,
}

impl AdviceGroup {
    fn slot(&self, slot: AdviceSlot) -> &Arc<[AdviceTuple]> {
        match slot {
            AdviceSlot::Around => &self.around,
            AdviceSlot::Pre => &self.pre,
            AdviceSlot::Post => &self.post,
        }
    }
}

/// Everything a join point needs to dispatch, computed once.
pub(crate) struct ResolvedAdvice {
    groups: Vec<AdviceGroup>,
    non_reentrant: bool,
    cflow_keys: Vec<CflowKey>,
}

impl ResolvedAdvice {
    pub(crate) fn from_matches(
        matches: Vec<PointcutMatch>,
        cflow_keys: Vec<CflowKey>,
    ) -> WeaveResult<Self> {
        let mut groups = Vec::with_capacity(matches.len());
        let mut non_reentrant = false;
        for PointcutMatch { pointcut, found } in matches {
            non_reentrant |= pointcut.is_non_reentrant();
            let tuples = |slot: AdviceSlot| -> WeaveResult<Arc<[AdviceTuple]>> {
                if pointcut.kind().has_slot(slot) {
                    pointcut.advice_index_tuples(slot)
                } else {
                    Ok(Arc::from(Vec::new()))
                }
            };
            groups.push(AdviceGroup {
                around: tuples(AdviceSlot::Around)?,
                pre: tuples(AdviceSlot::Pre)?,
                post: tuples(AdviceSlot::Post)?,
                found,
                pointcut: Some(pointcut),
            });
        }
        Ok(Self {
            groups,
            non_reentrant,
            cflow_keys,
        })
    }

    /// Rebuilds the groups recorded in a snapshot against the live system.
    ///
    /// A named group gets its pointcut back, so cflow conditions are checked
    /// per execution again; an unnamed group is a fixed chain. Groups whose
    /// pointcut no longer matches `site` are dropped.
    pub(crate) fn from_snapshot(
        system: &AspectSystem,
        site: &Site<'_>,
        slot: AdviceSlot,
        snapshots: &[AdviceGroupSnapshot],
        non_reentrant: bool,
        cflow_keys: Vec<CflowKey>,
    ) -> WeaveResult<Self> {
        let mut groups = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let (pointcut, found) = match &snapshot.pointcut {
                Some(name) => {
                    let pointcut = system.pointcut(name).ok_or_else(|| {
                        WeaveError::definition(format!(
                            "pointcut '{name}' is not registered in system '{}'",
                            system.uuid()
                        ))
                    })?;
                    let Some(found) = pointcut.structural_match(site)? else {
                        debug!(pointcut = %name, "restored pointcut no longer matches");
                        continue;
                    };
                    (Some(pointcut), found)
                }
                None => (None, StructuralMatch::default()),
            };
            let empty: Arc<[AdviceTuple]> = Arc::from(Vec::new());
            let tuples: Arc<[AdviceTuple]> = Arc::from(snapshot.advice.clone());
            let mut group = AdviceGroup {
                pointcut,
                found,
                around: empty.clone(),
                pre: empty.clone(),
                post: empty,
            };
            match slot {
                AdviceSlot::Around => group.around = tuples,
                AdviceSlot::Pre => group.pre = tuples,
                AdviceSlot::Post => group.post = tuples,
            }
            groups.push(group);
        }
        Ok(Self {
            groups,
            non_reentrant,
            cflow_keys,
        })
    }

    /// Per-pointcut bindings of `slot`, cflow conditions left undecided.
    pub(crate) fn group_snapshots(&self, slot: AdviceSlot) -> Vec<AdviceGroupSnapshot> {
        self.groups
            .iter()
            .map(|group| AdviceGroupSnapshot {
                pointcut: group.pointcut.as_ref().map(|p| p.qualified_name()),
                advice: group.slot(slot).to_vec(),
            })
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn is_non_reentrant(&self) -> bool {
        self.non_reentrant
    }

    pub(crate) fn cflow_keys(&self) -> &[CflowKey] {
        &self.cflow_keys
    }

    /// Every bound tuple regardless of cflow, in pointcut order.
    pub(crate) fn all(&self, slot: AdviceSlot) -> Vec<AdviceTuple> {
        self.groups
            .iter()
            .flat_map(|group| group.slot(slot).iter().cloned())
            .collect()
    }

    /// Tuples of the pointcuts whose cflow conditions hold on this thread.
    pub(crate) fn active(&self, system: &AspectSystem, slot: AdviceSlot) -> WeaveResult<Vec<AdviceTuple>> {
        let mut out = Vec::new();
        for group in &self.groups {
            if let Some(pointcut) = &group.pointcut {
                let applies = pointcut.evaluate_dynamic(&group.found, &|source| {
                    cflow::is_active(&system.cflow_key(source))
                })?;
                if !applies {
                    continue;
                }
            }
            out.extend(group.slot(slot).iter().cloned());
        }
        Ok(out)
    }
}

/// One advice instance in an executing chain.
#[derive(Clone)]
pub(crate) struct ChainLink {
    pub(crate) tuple: AdviceTuple,
    pub(crate) advice: Arc<dyn Advice>,
}

/// Looks every index up in the registry for `target`'s deployment scope.
/// An index that no longer resolves is a definition error naming the site.
pub(crate) fn link_chain(
    system: &AspectSystem,
    tuples: Vec<AdviceTuple>,
    target: &Target,
    instance: Option<&Arc<dyn Any + Send + Sync>>,
    site: &str,
) -> WeaveResult<Arc<[ChainLink]>> {
    let scope = AdviceScope {
        class_name: Some(&target.class().name),
        instance,
    };
    let mut links = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let Some(advice) = system.registry().advice(tuple.index, scope) else {
            warn!(advice = %tuple.name, index = %tuple.index, site, "stale advice binding");
            return Err(WeaveError::definition(format!(
                "advice '{}' ({}) bound at {site} is no longer registered",
                tuple.name, tuple.index
            )));
        };
        links.push(ChainLink { tuple, advice });
    }
    debug!(site, len = links.len(), "advice chain linked");
    Ok(Arc::from(links))
}
