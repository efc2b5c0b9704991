use std::collections::HashMap;
use weave_api::{FieldMeta, MethodMeta};

/// Raw description of a type as reported by the class-loading environment.
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub methods: Vec<MethodMeta>,
    pub fields: Vec<FieldMeta>,
}

/// Provides type information by fully qualified name.
pub trait TypeSource: Send + Sync {
    /// Returns `None` if the type is not known to this source.
    fn describe(&self, name: &str) -> Option<TypeDescriptor>;
}

/// In-memory type source built with a fluent API.
#[derive(Debug, Default, Clone)]
pub struct StaticTypeSource {
    types: HashMap<String, TypeDescriptor>,
}

impl StaticTypeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(mut self, name: &str, superclass: Option<&str>, interfaces: &[&str]) -> Self {
        self.types.insert(
            name.to_string(),
            TypeDescriptor {
                name: name.to_string(),
                superclass: superclass.map(|s| s.to_string()),
                interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    pub fn add_interface(mut self, name: &str, extends: &[&str]) -> Self {
        self.types.insert(
            name.to_string(),
            TypeDescriptor {
                name: name.to_string(),
                interfaces: extends.iter().map(|s| s.to_string()).collect(),
                is_interface: true,
                ..Default::default()
            },
        );
        self
    }

    /// Declares a method on a type previously added.
    pub fn add_method(mut self, owner: &str, method: MethodMeta) -> Self {
        if let Some(descriptor) = self.types.get_mut(owner) {
            descriptor.methods.push(method);
        }
        self
    }

    pub fn add_field(mut self, owner: &str, field: FieldMeta) -> Self {
        if let Some(descriptor) = self.types.get_mut(owner) {
            descriptor.fields.push(field);
        }
        self
    }
}

impl TypeSource for StaticTypeSource {
    fn describe(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.get(name).cloned()
    }
}
