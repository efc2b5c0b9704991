use crate::error::{WeaveError, WeaveResult};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use weave_api::ClassMeta;

/// What a join point intercepts: a class (static sites) or a weakly held
/// instance of it.
#[derive(Clone)]
pub enum Target {
    Static(Arc<ClassMeta>),
    Instance {
        class: Arc<ClassMeta>,
        instance: Weak<dyn Any + Send + Sync>,
    },
}

impl Target {
    pub fn of_class(class: Arc<ClassMeta>) -> Self {
        Target::Static(class)
    }

    pub fn of_instance(class: Arc<ClassMeta>, instance: &Arc<dyn Any + Send + Sync>) -> Self {
        Target::Instance {
            class,
            instance: Arc::downgrade(instance),
        }
    }

    pub fn class(&self) -> &Arc<ClassMeta> {
        match self {
            Target::Static(class) | Target::Instance { class, .. } => class,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Target::Static(_))
    }

    pub fn instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        match self {
            Target::Static(_) => None,
            Target::Instance { instance, .. } => instance.upgrade(),
        }
    }

    /// `None` only after collection of an instance target.
    pub fn live_class(&self) -> Option<Arc<ClassMeta>> {
        match self {
            Target::Static(class) => Some(class.clone()),
            Target::Instance { class, instance } => {
                (instance.strong_count() > 0).then(|| class.clone())
            }
        }
    }

    /// Upgrades the instance for the duration of a dispatch.
    pub(crate) fn dispatch_instance(&self) -> WeaveResult<Option<Arc<dyn Any + Send + Sync>>> {
        match self {
            Target::Static(_) => Ok(None),
            Target::Instance { class, instance } => instance
                .upgrade()
                .map(Some)
                .ok_or_else(|| WeaveError::TargetCollected(class.name.clone())),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Static(class) => write!(f, "Static({})", class.name),
            Target::Instance { class, instance } => write!(
                f,
                "Instance({}, alive: {})",
                class.name,
                instance.strong_count() > 0
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_instance_reports_target_collected() {
        let class = Arc::new(ClassMeta::new("foo.Bean"));
        let bean: Arc<dyn Any + Send + Sync> = Arc::new(7_u8);
        let target = Target::of_instance(class, &bean);
        assert!(target.instance().is_some());
        assert!(target.dispatch_instance().unwrap().is_some());

        drop(bean);
        assert!(target.instance().is_none());
        assert!(target.live_class().is_none());
        assert!(matches!(
            target.dispatch_instance(),
            Err(WeaveError::TargetCollected(name)) if name == "foo.Bean"
        ));
    }

    #[test]
    fn static_target_never_collects() {
        let target = Target::of_class(Arc::new(ClassMeta::new("foo.Util")));
        assert!(target.is_static());
        assert!(target.instance().is_none());
        assert_eq!(target.live_class().unwrap().name, "foo.Util");
    }
}
