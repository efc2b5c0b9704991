use crate::error::PatternError;
use crate::pattern::{Pattern, PatternKind, Site};

/// A named pattern referenced by identifier from a pointcut expression.
#[derive(Debug, Clone)]
pub struct PointcutDefinition {
    name: String,
    source: String,
    pattern: Pattern,
    hierarchical: bool,
    non_reentrant: bool,
    cflow: bool,
}

impl PointcutDefinition {
    /// Compiles `source` as a pattern of `kind`. A `+` on the class part
    /// makes the definition hierarchical.
    pub fn new(name: &str, kind: PatternKind, source: &str) -> Result<Self, PatternError> {
        let pattern = Pattern::compile(kind, source)?;
        Ok(Self::from_pattern(name, source, pattern))
    }

    /// A control-flow definition: true while the current thread is executing
    /// inside a method matching `source`.
    pub fn cflow(name: &str, source: &str) -> Result<Self, PatternError> {
        let pattern = Pattern::compile_member(source)?;
        let mut definition = Self::from_pattern(name, source, pattern);
        definition.cflow = true;
        Ok(definition)
    }

    fn from_pattern(name: &str, source: &str, pattern: Pattern) -> Self {
        Self {
            name: name.to_string(),
            source: source.trim().to_string(),
            hierarchical: pattern.is_hierarchical(),
            pattern,
            non_reentrant: false,
            cflow: false,
        }
    }

    pub fn with_hierarchical(mut self, hierarchical: bool) -> Self {
        self.hierarchical = hierarchical;
        self
    }

    pub fn with_non_reentrant(mut self, non_reentrant: bool) -> Self {
        self.non_reentrant = non_reentrant;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    pub fn is_non_reentrant(&self) -> bool {
        self.non_reentrant
    }

    pub fn is_cflow(&self) -> bool {
        self.cflow
    }

    /// Structural match. Hierarchical definitions try the declaring class,
    /// its interfaces depth-first, then each superclass in turn; the first
    /// matching ancestor wins.
    pub fn matches(&self, site: &Site<'_>) -> bool {
        let class = site.declaring_class();
        if self.hierarchical {
            class.any_in_hierarchy(&mut |name| self.pattern.matches_at(name, site))
        } else {
            self.pattern.matches_at(&class.name, site)
        }
    }
}
