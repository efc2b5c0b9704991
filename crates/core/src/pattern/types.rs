use super::name::NamePattern;
use crate::error::PatternError;

/// `java.lang` types that may be written by their simple name.
const JAVA_LANG_ABBREVIATIONS: &[&str] = &[
    "Boolean",
    "Byte",
    "CharSequence",
    "Character",
    "Class",
    "Comparable",
    "Double",
    "Enum",
    "Error",
    "Exception",
    "Float",
    "Integer",
    "Iterable",
    "Long",
    "Number",
    "Object",
    "Runnable",
    "RuntimeException",
    "Short",
    "String",
    "StringBuffer",
    "StringBuilder",
    "Thread",
    "Throwable",
    "Void",
];

/// Expands `String` to `java.lang.String`; leaves everything else untouched.
pub fn expand_abbreviation(name: &str) -> String {
    if JAVA_LANG_ABBREVIATIONS.contains(&name) {
        format!("java.lang.{name}")
    } else {
        name.to_string()
    }
}

/// Splits `java.lang.String[][]` into (`java.lang.String`, 2).
pub fn split_array_type(type_name: &str) -> (&str, usize) {
    let mut base = type_name.trim();
    let mut dimensions = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
        dimensions += 1;
    }
    (base, dimensions)
}

/// Matcher over a single type name. Array dimensions are compared exactly and
/// independently of the base type.
#[derive(Debug, Clone)]
pub enum TypePattern {
    /// `*`: any one type, arrays included.
    Any,
    Typed {
        base: NamePattern,
        dimensions: usize,
    },
}

impl TypePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (base, dimensions) = split_array_type(pattern);
        if base.is_empty() {
            return Err(PatternError::invalid(pattern, "missing type name"));
        }
        if base == "*" && dimensions == 0 {
            return Ok(TypePattern::Any);
        }
        let base = if base.contains('.') || base.contains('*') {
            NamePattern::class(base)?
        } else {
            NamePattern::class(&expand_abbreviation(base))?
        };
        Ok(TypePattern::Typed { base, dimensions })
    }

    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            TypePattern::Any => true,
            TypePattern::Typed { base, dimensions } => {
                let (candidate, candidate_dimensions) = split_array_type(type_name);
                candidate_dimensions == *dimensions && base.matches(candidate)
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ParameterToken {
    /// `..`: zero or more parameters.
    Rest,
    Type(TypePattern),
}

/// Matcher over a parameter type list, e.g. `(String, .., int[])`.
#[derive(Debug, Clone)]
pub struct ParameterPattern {
    tokens: Vec<ParameterToken>,
}

impl ParameterPattern {
    /// Parses the text between the parentheses.
    pub fn parse(list: &str) -> Result<Self, PatternError> {
        let list = list.trim();
        if list.is_empty() {
            return Ok(Self { tokens: Vec::new() });
        }
        let mut tokens = Vec::new();
        for part in list.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(PatternError::invalid(list, "empty parameter type"));
            }
            if part == ".." {
                // Adjacent `..` tokens are equivalent to one.
                if !matches!(tokens.last(), Some(ParameterToken::Rest)) {
                    tokens.push(ParameterToken::Rest);
                }
            } else {
                tokens.push(ParameterToken::Type(TypePattern::parse(part)?));
            }
        }
        Ok(Self { tokens })
    }

    pub fn any() -> Self {
        Self {
            tokens: vec![ParameterToken::Rest],
        }
    }

    pub fn matches<S: AsRef<str>>(&self, parameter_types: &[S]) -> bool {
        match_tokens(&self.tokens, parameter_types)
    }
}

fn match_tokens<S: AsRef<str>>(tokens: &[ParameterToken], params: &[S]) -> bool {
    match tokens.split_first() {
        None => params.is_empty(),
        Some((ParameterToken::Rest, rest)) => {
            (0..=params.len()).any(|skip| match_tokens(rest, &params[skip..]))
        }
        Some((ParameterToken::Type(pattern), rest)) => match params.split_first() {
            Some((param, tail)) => pattern.matches(param.as_ref()) && match_tokens(rest, tail),
            None => false,
        },
    }
}
