use weave_api::{ClassMeta, FieldMeta, MethodMeta};

/// A join-point site as seen by pointcut matching.
#[derive(Debug, Clone, Copy)]
pub enum Site<'a> {
    Class(&'a ClassMeta),
    Method {
        class: &'a ClassMeta,
        method: &'a MethodMeta,
    },
    Field {
        class: &'a ClassMeta,
        field: &'a FieldMeta,
    },
    CallerSide {
        caller: &'a ClassMeta,
        callee: &'a ClassMeta,
        method: &'a MethodMeta,
    },
    Throws {
        class: &'a ClassMeta,
        method: &'a MethodMeta,
        exception: &'a ClassMeta,
    },
}

impl<'a> Site<'a> {
    /// The class whose hierarchy is walked for hierarchical definitions.
    /// For caller-side sites this is the callee.
    pub fn declaring_class(&self) -> &'a ClassMeta {
        match *self {
            Site::Class(class) => class,
            Site::Method { class, .. } => class,
            Site::Field { class, .. } => class,
            Site::CallerSide { callee, .. } => callee,
            Site::Throws { class, .. } => class,
        }
    }

    pub fn method(&self) -> Option<&'a MethodMeta> {
        match *self {
            Site::Method { method, .. }
            | Site::CallerSide { method, .. }
            | Site::Throws { method, .. } => Some(method),
            _ => None,
        }
    }
}
