use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JVM-internal name of constructors.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Immutable snapshot of a method or constructor signature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodMeta {
    pub name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    #[serde(default)]
    pub exception_types: Vec<String>,
}

impl MethodMeta {
    pub fn new<P, S>(name: impl Into<String>, parameter_types: P, return_type: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
            return_type: return_type.into(),
            exception_types: Vec::new(),
        }
    }

    pub fn constructor<P, S>(parameter_types: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CONSTRUCTOR_NAME, parameter_types, "void")
    }

    pub fn with_exceptions<E, S>(mut self, exception_types: E) -> Self
    where
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exception_types = exception_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// `name(type1,type2)`, stable across runs.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(","))
    }
}

/// Immutable snapshot of a field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMeta {
    pub name: String,
    pub type_name: String,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// An interface and the interfaces it extends.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMeta {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<Arc<InterfaceMeta>>,
}

impl InterfaceMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interfaces: Vec::new(),
        }
    }

    pub fn extending(mut self, parent: Arc<InterfaceMeta>) -> Self {
        self.interfaces.push(parent);
        self
    }

    /// Depth-first search over this interface and its super-interfaces.
    pub fn any_in_hierarchy(&self, predicate: &mut dyn FnMut(&str) -> bool) -> bool {
        if predicate(&self.name) {
            return true;
        }
        self.interfaces
            .iter()
            .any(|parent| parent.any_in_hierarchy(predicate))
    }
}

/// Immutable snapshot of a class: its name, superclass chain, implemented
/// interfaces and declared members.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClassMeta {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<Arc<ClassMeta>>,
    #[serde(default)]
    pub interfaces: Vec<Arc<InterfaceMeta>>,
    #[serde(default)]
    pub methods: Vec<MethodMeta>,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

impl ClassMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_superclass(mut self, superclass: Arc<ClassMeta>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_interface(mut self, interface: Arc<InterfaceMeta>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(&self, name: &str, parameter_types: &[&str]) -> Option<&MethodMeta> {
        self.methods.iter().find(|m| {
            m.name == name
                && m.parameter_types.len() == parameter_types.len()
                && m.parameter_types
                    .iter()
                    .zip(parameter_types)
                    .all(|(a, b)| a == b)
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Walks this class, its interfaces (depth-first), then the superclass
    /// chain. Stops at the first name accepted by `predicate`.
    pub fn any_in_hierarchy(&self, predicate: &mut dyn FnMut(&str) -> bool) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if predicate(&class.name) {
                return true;
            }
            if class
                .interfaces
                .iter()
                .any(|interface| interface.any_in_hierarchy(predicate))
            {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }

    pub fn is_subtype_of(&self, type_name: &str) -> bool {
        self.any_in_hierarchy(&mut |name| name == type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassMeta {
        let closeable = Arc::new(InterfaceMeta::new("java.io.Closeable"));
        let auto = Arc::new(InterfaceMeta::new("java.lang.AutoCloseable").extending(closeable));
        let base = Arc::new(ClassMeta::new("foo.Base").with_interface(auto));
        ClassMeta::new("foo.Impl").with_superclass(base)
    }

    #[test]
    fn subtype_walks_superclass_and_nested_interfaces() {
        let class = sample();
        assert!(class.is_subtype_of("foo.Impl"));
        assert!(class.is_subtype_of("foo.Base"));
        assert!(class.is_subtype_of("java.io.Closeable"));
        assert!(!class.is_subtype_of("java.util.List"));
    }

    #[test]
    fn hierarchy_walk_stops_at_first_match() {
        let class = sample();
        let mut visited = Vec::new();
        let found = class.any_in_hierarchy(&mut |name| {
            visited.push(name.to_string());
            name == "foo.Base"
        });
        assert!(found);
        assert_eq!(visited, vec!["foo.Impl", "foo.Base"]);
    }

    #[test]
    fn method_signature_is_stable() {
        let method = MethodMeta::new("save", ["java.lang.String", "int"], "void");
        assert_eq!(method.signature(), "save(java.lang.String,int)");
        assert!(MethodMeta::constructor(Vec::<String>::new()).is_constructor());
    }

    #[test]
    fn class_hierarchy_survives_json() {
        let class = sample().with_method(MethodMeta::new("close", Vec::<String>::new(), "void"));
        let json = serde_json::to_string(&class).unwrap();
        let back: ClassMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, class);
        assert!(back.is_subtype_of("java.io.Closeable"));
    }

    #[test]
    fn missing_members_default_to_empty() {
        let class: ClassMeta = serde_json::from_str(r#"{"name": "foo.Bare"}"#).unwrap();
        assert!(class.superclass.is_none());
        assert!(class.methods.is_empty());
        let method: MethodMeta =
            serde_json::from_str(r#"{"name": "run", "parameter_types": [], "return_type": "void"}"#).unwrap();
        assert!(method.exception_types.is_empty());
    }
}

