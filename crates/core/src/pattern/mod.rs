//! Compiled structural matchers.
//!
//! Patterns are parsed once when a pointcut definition is registered and are
//! immutable afterwards. Matching is a pure function of the pattern and the
//! candidate.

mod member;
mod name;
mod site;
mod types;

pub use member::{
    CallerSidePattern, ClassPattern, ConstructorPattern, FieldPattern, MemberPattern,
    MethodPattern, ThrowsPattern,
};
pub use name::NamePattern;
pub use site::Site;
pub use types::{ParameterPattern, TypePattern, expand_abbreviation, split_array_type};

use crate::error::PatternError;
use serde::{Deserialize, Serialize};

/// Which structural dimension a pattern source describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    Class,
    Method,
    Constructor,
    Field,
    CallerSide,
    Throws,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Class(ClassPattern),
    Method(MethodPattern),
    Constructor(ConstructorPattern),
    Field(FieldPattern),
    CallerSide(CallerSidePattern),
    Throws(ThrowsPattern),
}

impl Pattern {
    pub fn compile(kind: PatternKind, source: &str) -> Result<Self, PatternError> {
        if source.trim().is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(match kind {
            PatternKind::Class => Pattern::Class(ClassPattern::parse(source)?),
            PatternKind::Method => Pattern::Method(MethodPattern::parse(source)?),
            PatternKind::Constructor => Pattern::Constructor(ConstructorPattern::parse(source)?),
            PatternKind::Field => Pattern::Field(FieldPattern::parse(source)?),
            PatternKind::CallerSide => Pattern::CallerSide(CallerSidePattern::parse(source)?),
            PatternKind::Throws => Pattern::Throws(ThrowsPattern::parse(source)?),
        })
    }

    /// Compiles a method or constructor pattern, picking the flavor from the
    /// source text.
    pub fn compile_member(source: &str) -> Result<Self, PatternError> {
        if member::is_constructor_pattern(source) {
            Self::compile(PatternKind::Constructor, source)
        } else {
            Self::compile(PatternKind::Method, source)
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Class(_) => PatternKind::Class,
            Pattern::Method(_) => PatternKind::Method,
            Pattern::Constructor(_) => PatternKind::Constructor,
            Pattern::Field(_) => PatternKind::Field,
            Pattern::CallerSide(_) => PatternKind::CallerSide,
            Pattern::Throws(_) => PatternKind::Throws,
        }
    }

    /// The class pattern walked against the site's declaring class.
    pub fn class_pattern(&self) -> &ClassPattern {
        match self {
            Pattern::Class(p) => p,
            Pattern::Method(p) => p.class(),
            Pattern::Constructor(p) => p.class(),
            Pattern::Field(p) => p.class(),
            Pattern::CallerSide(p) => p.callee().class(),
            Pattern::Throws(p) => p.member().class(),
        }
    }

    /// Whether the declaring-class dimension carries a `+` suffix.
    pub fn is_hierarchical(&self) -> bool {
        self.class_pattern().is_hierarchical()
    }

    /// Matches `site`, substituting `class_name` for the declaring class so
    /// callers can test ancestors one by one. Patterns of a dimension the
    /// site does not have never match; class patterns apply to every site.
    pub fn matches_at(&self, class_name: &str, site: &Site<'_>) -> bool {
        match (self, site) {
            (Pattern::Class(p), _) => p.matches(class_name),
            (Pattern::Method(p), Site::Method { method, .. }) => p.matches(class_name, method),
            (Pattern::Constructor(p), Site::Method { method, .. }) => p.matches(class_name, method),
            (Pattern::Field(p), Site::Field { field, .. }) => p.matches(class_name, field),
            (Pattern::CallerSide(p), Site::CallerSide { caller, method, .. }) => {
                p.matches(caller, class_name, method)
            }
            (Pattern::Throws(p), Site::Throws { method, exception, .. }) => {
                p.matches(class_name, method, exception)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_api::{ClassMeta, FieldMeta, MethodMeta};

    #[test]
    fn patterns_do_not_cross_dimensions() {
        let class = ClassMeta::new("foo.Repo");
        let method = MethodMeta::new("save", ["int"], "void");
        let field = FieldMeta::new("save", "int");
        let method_site = Site::Method { class: &class, method: &method };
        let field_site = Site::Field { class: &class, field: &field };

        let method_pattern = Pattern::compile(PatternKind::Method, "* foo.Repo.save(..)").unwrap();
        assert!(method_pattern.matches_at("foo.Repo", &method_site));
        assert!(!method_pattern.matches_at("foo.Repo", &field_site));

        let class_pattern = Pattern::compile(PatternKind::Class, "foo.*").unwrap();
        assert!(class_pattern.matches_at("foo.Repo", &method_site));
        assert!(class_pattern.matches_at("foo.Repo", &field_site));
    }

    #[test]
    fn compile_member_picks_constructor_flavor() {
        assert_eq!(
            Pattern::compile_member("foo.Bar.new(..)").unwrap().kind(),
            PatternKind::Constructor
        );
        assert_eq!(
            Pattern::compile_member("* foo.Bar.renew(..)").unwrap().kind(),
            PatternKind::Method
        );
    }
}
