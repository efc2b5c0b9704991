use super::name::NamePattern;
use super::types::{ParameterPattern, TypePattern};
use crate::error::PatternError;
use weave_api::{ClassMeta, FieldMeta, MethodMeta};

/// Class dimension of a member pattern. A trailing `+` requests matching
/// against every ancestor class and interface.
#[derive(Debug, Clone)]
pub struct ClassPattern {
    name: NamePattern,
    hierarchical: bool,
}

impl ClassPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        let (name, hierarchical) = match pattern.strip_suffix('+') {
            Some(stripped) => (stripped, true),
            None => (pattern, false),
        };
        Ok(Self {
            name: NamePattern::class(name)?,
            hierarchical,
        })
    }

    pub fn any() -> Self {
        Self {
            name: NamePattern::any(),
            hierarchical: false,
        }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        self.name.matches(class_name)
    }

    /// Honors the `+` suffix by walking the class hierarchy.
    pub fn matches_class(&self, class: &ClassMeta) -> bool {
        if self.hierarchical {
            class.any_in_hierarchy(&mut |name| self.name.matches(name))
        } else {
            self.name.matches(&class.name)
        }
    }

    pub fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    pub fn as_str(&self) -> &str {
        self.name.as_str()
    }
}

/// `RETURN CLASS.NAME(PARAMS)`
#[derive(Debug, Clone)]
pub struct MethodPattern {
    return_type: TypePattern,
    class: ClassPattern,
    name: NamePattern,
    parameters: ParameterPattern,
}

impl MethodPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (head, parameters) = split_parameters(pattern)?;
        let mut parts = head.split_whitespace();
        let (Some(return_type), Some(qualified), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PatternError::invalid(
                pattern,
                "expected '<return type> <class>.<method>(<parameters>)'",
            ));
        };
        let (class, name) = split_qualified(pattern, qualified)?;
        if name == "new" {
            return Err(PatternError::invalid(pattern, "use a constructor pattern for 'new'"));
        }
        Ok(Self {
            return_type: TypePattern::parse(return_type)?,
            class,
            name: NamePattern::identifier(name)?,
            parameters,
        })
    }

    pub fn class(&self) -> &ClassPattern {
        &self.class
    }

    /// Matches the signature only; the class dimension is checked separately.
    pub fn matches_method(&self, method: &MethodMeta) -> bool {
        !method.is_constructor()
            && self.name.matches(&method.name)
            && self.parameters.matches(&method.parameter_types)
            && self.return_type.matches(&method.return_type)
    }

    pub fn matches(&self, class_name: &str, method: &MethodMeta) -> bool {
        self.class.matches(class_name) && self.matches_method(method)
    }
}

/// `CLASS.new(PARAMS)` or `new(PARAMS)` for any class.
#[derive(Debug, Clone)]
pub struct ConstructorPattern {
    class: ClassPattern,
    parameters: ParameterPattern,
}

impl ConstructorPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (head, parameters) = split_parameters(pattern)?;
        let head = head.trim();
        let class = if head == "new" {
            ClassPattern::any()
        } else {
            let (class, name) = split_qualified(pattern, head)?;
            if name != "new" {
                return Err(PatternError::invalid(pattern, "constructor patterns end in 'new'"));
            }
            class
        };
        Ok(Self { class, parameters })
    }

    pub fn class(&self) -> &ClassPattern {
        &self.class
    }

    pub fn matches_method(&self, method: &MethodMeta) -> bool {
        method.is_constructor() && self.parameters.matches(&method.parameter_types)
    }

    pub fn matches(&self, class_name: &str, method: &MethodMeta) -> bool {
        self.class.matches(class_name) && self.matches_method(method)
    }
}

/// Method or constructor: the callee side of caller-side and throws patterns.
#[derive(Debug, Clone)]
pub enum MemberPattern {
    Method(MethodPattern),
    Constructor(ConstructorPattern),
}

impl MemberPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if is_constructor_pattern(pattern) {
            Ok(MemberPattern::Constructor(ConstructorPattern::parse(pattern)?))
        } else {
            Ok(MemberPattern::Method(MethodPattern::parse(pattern)?))
        }
    }

    pub fn class(&self) -> &ClassPattern {
        match self {
            MemberPattern::Method(p) => p.class(),
            MemberPattern::Constructor(p) => p.class(),
        }
    }

    pub fn matches(&self, class_name: &str, method: &MethodMeta) -> bool {
        match self {
            MemberPattern::Method(p) => p.matches(class_name, method),
            MemberPattern::Constructor(p) => p.matches(class_name, method),
        }
    }
}

/// `TYPE CLASS.NAME`
#[derive(Debug, Clone)]
pub struct FieldPattern {
    field_type: TypePattern,
    class: ClassPattern,
    name: NamePattern,
}

impl FieldPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut parts = pattern.split_whitespace();
        let (Some(field_type), Some(qualified), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PatternError::invalid(pattern, "expected '<type> <class>.<field>'"));
        };
        let (class, name) = split_qualified(pattern, qualified)?;
        Ok(Self {
            field_type: TypePattern::parse(field_type)?,
            class,
            name: NamePattern::identifier(name)?,
        })
    }

    pub fn class(&self) -> &ClassPattern {
        &self.class
    }

    pub fn matches(&self, class_name: &str, field: &FieldMeta) -> bool {
        self.class.matches(class_name)
            && self.name.matches(&field.name)
            && self.field_type.matches(&field.type_name)
    }
}

/// `CALLER->CALLEE-MEMBER`
#[derive(Debug, Clone)]
pub struct CallerSidePattern {
    caller: ClassPattern,
    callee: MemberPattern,
}

impl CallerSidePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some((caller, callee)) = pattern.split_once("->") else {
            return Err(PatternError::invalid(pattern, "expected '<caller>-><member pattern>'"));
        };
        Ok(Self {
            caller: ClassPattern::parse(caller)?,
            callee: MemberPattern::parse(callee)?,
        })
    }

    pub fn callee(&self) -> &MemberPattern {
        &self.callee
    }

    pub fn matches(
        &self,
        caller: &ClassMeta,
        callee_class_name: &str,
        method: &MethodMeta,
    ) -> bool {
        self.caller.matches_class(caller) && self.callee.matches(callee_class_name, method)
    }
}

/// `MEMBER#EXCEPTION-CLASS`
#[derive(Debug, Clone)]
pub struct ThrowsPattern {
    member: MemberPattern,
    exception: ClassPattern,
}

impl ThrowsPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some((member, exception)) = pattern.rsplit_once('#') else {
            return Err(PatternError::invalid(
                pattern,
                "expected '<member pattern>#<exception class>'",
            ));
        };
        let exception = exception.trim();
        let exception = if exception.contains('.') || exception.contains('*') {
            ClassPattern::parse(exception)?
        } else {
            let (base, suffix) = match exception.strip_suffix('+') {
                Some(base) => (base, "+"),
                None => (exception, ""),
            };
            ClassPattern::parse(&format!("{}{}", super::types::expand_abbreviation(base), suffix))?
        };
        Ok(Self {
            member: MemberPattern::parse(member)?,
            exception,
        })
    }

    pub fn member(&self) -> &MemberPattern {
        &self.member
    }

    pub fn matches(
        &self,
        class_name: &str,
        method: &MethodMeta,
        exception: &ClassMeta,
    ) -> bool {
        self.member.matches(class_name, method) && self.exception.matches_class(exception)
    }
}

pub(crate) fn is_constructor_pattern(pattern: &str) -> bool {
    let Some(open) = pattern.find('(') else {
        return false;
    };
    let head = pattern[..open].trim();
    head == "new" || head.ends_with(".new")
}

/// Splits `head(params)` and compiles the parameter list.
fn split_parameters(pattern: &str) -> Result<(&str, ParameterPattern), PatternError> {
    let pattern = pattern.trim();
    let open = pattern
        .find('(')
        .ok_or_else(|| PatternError::invalid(pattern, "missing '('"))?;
    let inner = pattern[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| PatternError::invalid(pattern, "missing closing ')'"))?;
    if inner.contains('(') || inner.contains(')') {
        return Err(PatternError::invalid(pattern, "nested parentheses"));
    }
    Ok((&pattern[..open], ParameterPattern::parse(inner)?))
}

/// Splits `pkg.Class.member` at the last dot. A bare `member` applies to any
/// class.
fn split_qualified<'a>(
    pattern: &str,
    qualified: &'a str,
) -> Result<(ClassPattern, &'a str), PatternError> {
    match qualified.rfind('.') {
        Some(0) => Err(PatternError::invalid(pattern, "missing class name")),
        Some(dot) => {
            let name = &qualified[dot + 1..];
            if name.is_empty() {
                return Err(PatternError::invalid(pattern, "missing member name"));
            }
            Ok((ClassPattern::parse(&qualified[..dot])?, name))
        }
        None => Ok((ClassPattern::any(), qualified)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save() -> MethodMeta {
        MethodMeta::new("save", ["java.lang.String", "int"], "void")
    }

    #[test]
    fn method_pattern_checks_every_dimension() {
        let p = MethodPattern::parse("void foo.Repo.save(String, ..)").unwrap();
        assert!(p.matches("foo.Repo", &save()));
        assert!(!p.matches("foo.Other", &save()));
        assert!(!p.matches("foo.Repo", &MethodMeta::new("save", ["int"], "void")));
        assert!(!p.matches("foo.Repo", &MethodMeta::new("save", ["java.lang.String"], "int")));
    }

    #[test]
    fn method_pattern_marks_hierarchical_class() {
        let p = MethodPattern::parse("* foo.Repo+.*(..)").unwrap();
        assert!(p.class().is_hierarchical());
        assert!(p.matches("foo.Repo", &save()));
    }

    #[test]
    fn constructor_pattern_without_class_matches_any_class() {
        let p = ConstructorPattern::parse("new(String, ..)").unwrap();
        let ctor = MethodMeta::constructor(["java.lang.String", "java.util.List"]);
        assert!(p.matches("any.Class", &ctor));
        assert!(p.matches("x.Y", &MethodMeta::constructor(["java.lang.String"])));
        assert!(!p.matches("x.Y", &MethodMeta::new("create", ["java.lang.String"], "void")));

        let scoped = ConstructorPattern::parse("foo.*.new()").unwrap();
        assert!(scoped.matches("foo.Bar", &MethodMeta::constructor(Vec::<String>::new())));
        assert!(!scoped.matches("bar.Bar", &MethodMeta::constructor(Vec::<String>::new())));
    }

    #[test]
    fn field_pattern() {
        let p = FieldPattern::parse("int foo.Counter.count*").unwrap();
        assert!(p.matches("foo.Counter", &FieldMeta::new("countA", "int")));
        assert!(!p.matches("foo.Counter", &FieldMeta::new("countA", "long")));
        assert!(!p.matches("foo.Counter", &FieldMeta::new("total", "int")));
    }

    #[test]
    fn caller_side_pattern() {
        let p = CallerSidePattern::parse("foo.web.*->* foo.Repo.save(..)").unwrap();
        let controller = ClassMeta::new("foo.web.Controller");
        let batch = ClassMeta::new("foo.batch.Job");
        assert!(p.matches(&controller, "foo.Repo", &save()));
        assert!(!p.matches(&batch, "foo.Repo", &save()));
    }

    #[test]
    fn throws_pattern_expands_exception_abbreviation() {
        let p = ThrowsPattern::parse("* foo.Repo.save(..)#Exception").unwrap();
        let exception = ClassMeta::new("java.lang.Exception");
        assert!(p.matches("foo.Repo", &save(), &exception));
        assert!(!p.matches("foo.Repo", &save(), &ClassMeta::new("java.io.IOException")));
    }

    #[test]
    fn throws_pattern_with_hierarchical_exception() {
        let p = ThrowsPattern::parse("* *.*(..)#java.lang.Exception+").unwrap();
        let base = std::sync::Arc::new(ClassMeta::new("java.lang.Exception"));
        let io = ClassMeta::new("java.io.IOException").with_superclass(base);
        assert!(p.matches("foo.Repo", &save(), &io));
    }

    #[test]
    fn malformed_member_patterns() {
        assert!(MethodPattern::parse("foo.Repo.save(..)").is_err());
        assert!(MethodPattern::parse("* foo.Repo.save(..").is_err());
        assert!(MethodPattern::parse("* .save()").is_err());
        assert!(FieldPattern::parse("foo.Bar.x").is_err());
        assert!(ThrowsPattern::parse("* foo.Bar.x(..)").is_err());
        assert!(CallerSidePattern::parse("foo.Bar").is_err());
    }
}
