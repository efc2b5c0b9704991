//! Structural metadata cache.
//!
//! Class metadata is built once per class name from a [`TypeSource`] and
//! shared read-only by every pointcut that matches against it.

mod source;

pub use source::{StaticTypeSource, TypeDescriptor, TypeSource};

use crate::error::{WeaveError, WeaveResult};
use dashmap::DashMap;
use std::sync::Arc;
use weave_api::{ClassMeta, FieldMeta, InterfaceMeta, MethodMeta};

pub struct MetadataCache {
    source: Arc<dyn TypeSource>,
    classes: DashMap<String, Arc<ClassMeta>>,
    interfaces: DashMap<String, Arc<InterfaceMeta>>,
}

impl MetadataCache {
    pub fn new(source: Arc<dyn TypeSource>) -> Self {
        Self {
            source,
            classes: DashMap::new(),
            interfaces: DashMap::new(),
        }
    }

    /// A cache with no backing source; every class resolves to a bare
    /// descriptor unless registered with [`MetadataCache::insert_class`].
    pub fn empty() -> Self {
        Self::new(Arc::new(StaticTypeSource::new()))
    }

    /// Registers prebuilt metadata, replacing nothing that is already cached.
    pub fn insert_class(&self, class: Arc<ClassMeta>) -> Arc<ClassMeta> {
        self.classes
            .entry(class.name.clone())
            .or_insert(class)
            .clone()
    }

    /// Returns the memoized metadata for `name`, building it on first use.
    ///
    /// Names the source does not know become bare descriptors without
    /// ancestors. Cyclic inheritance is a definition error.
    pub fn create_class_meta(&self, name: &str) -> WeaveResult<Arc<ClassMeta>> {
        let mut visiting = Vec::new();
        self.class_meta_inner(name, &mut visiting)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassMeta>> {
        self.classes.get(name).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn class_meta_inner(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> WeaveResult<Arc<ClassMeta>> {
        if let Some(cached) = self.classes.get(name) {
            return Ok(cached.clone());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(cycle_error(name, visiting));
        }

        let Some(descriptor) = self.source.describe(name) else {
            tracing::debug!("no type information for {}, using bare metadata", name);
            return Ok(self.insert_class(Arc::new(ClassMeta::new(name))));
        };

        visiting.push(name.to_string());
        let superclass = match descriptor.superclass.as_deref() {
            Some(parent) => Some(self.class_meta_inner(parent, visiting)?),
            None => None,
        };
        let mut interfaces = Vec::with_capacity(descriptor.interfaces.len());
        for interface in &descriptor.interfaces {
            interfaces.push(self.interface_meta_inner(interface, visiting)?);
        }
        visiting.pop();

        let class = ClassMeta {
            name: descriptor.name,
            superclass,
            interfaces,
            methods: descriptor.methods,
            fields: descriptor.fields,
        };
        Ok(self.insert_class(Arc::new(class)))
    }

    fn interface_meta_inner(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> WeaveResult<Arc<InterfaceMeta>> {
        if let Some(cached) = self.interfaces.get(name) {
            return Ok(cached.clone());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(cycle_error(name, visiting));
        }

        let parents = self
            .source
            .describe(name)
            .map(|d| d.interfaces)
            .unwrap_or_default();

        visiting.push(name.to_string());
        let mut resolved = Vec::with_capacity(parents.len());
        for parent in &parents {
            resolved.push(self.interface_meta_inner(parent, visiting)?);
        }
        visiting.pop();

        let interface = Arc::new(InterfaceMeta {
            name: name.to_string(),
            interfaces: resolved,
        });
        Ok(self
            .interfaces
            .entry(name.to_string())
            .or_insert(interface)
            .clone())
    }
}

fn cycle_error(name: &str, visiting: &[String]) -> WeaveError {
    WeaveError::definition(format!(
        "cyclic type hierarchy: {} -> {}",
        visiting.join(" -> "),
        name
    ))
}

pub fn create_method_meta<P, S>(name: &str, parameter_types: P, return_type: &str) -> MethodMeta
where
    P: IntoIterator<Item = S>,
    S: Into<String>,
{
    MethodMeta::new(name, parameter_types, return_type)
}

pub fn create_field_meta(name: &str, type_name: &str) -> FieldMeta {
    FieldMeta::new(name, type_name)
}
