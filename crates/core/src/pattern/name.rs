use crate::error::PatternError;
use regex::Regex;

/// Compiled wildcard matcher over dotted names.
///
/// `*` matches within one segment, `..` spans any number of segments. A lone
/// `*` or `..` matches every name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Option<Regex>,
}

impl NamePattern {
    /// Pattern over fully qualified class names; supports `*` and `..`.
    pub fn class(pattern: &str) -> Result<Self, PatternError> {
        Self::compile(pattern, true)
    }

    /// Pattern over simple member names; supports `*` only.
    pub fn identifier(pattern: &str) -> Result<Self, PatternError> {
        Self::compile(pattern, false)
    }

    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            regex: None,
        }
    }

    fn compile(pattern: &str, allow_segments: bool) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern == "*" || (allow_segments && pattern == "..") {
            return Ok(Self::any());
        }

        let regex = to_regex(pattern, allow_segments)?;
        Ok(Self {
            source: pattern.to_string(),
            regex: Some(Regex::new(&regex)?),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            None => true,
            Some(regex) => regex.is_match(name),
        }
    }

    pub fn is_any(&self) -> bool {
        self.regex.is_none()
    }

    /// True when the pattern contains no wildcard at all.
    pub fn is_literal(&self) -> bool {
        self.regex.is_some() && !self.source.contains('*') && !self.source.contains("..")
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn to_regex(pattern: &str, allow_segments: bool) -> Result<String, PatternError> {
    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '.' && bytes.get(i + 1) == Some(&b'.') {
            if !allow_segments {
                return Err(PatternError::invalid(pattern, "'..' is not allowed in member names"));
            }
            if bytes.get(i + 2) == Some(&b'.') {
                return Err(PatternError::invalid(pattern, "'...' is not a valid wildcard"));
            }
            i += 2;
            if i == 2 && out.len() == 1 {
                // Leading `..` also admits the default package.
                out.push_str(r"(?:[\w$]+\.)*");
            } else if i == bytes.len() {
                out.push_str(r"(?:\.[\w$]+)+");
            } else {
                out.push_str(r"(?:\.[\w$]+)*\.");
            }
            continue;
        }
        match c {
            // A segment that is only `*` still needs one character.
            '*' if (i == 0 || bytes[i - 1] == b'.')
                && (i + 1 == bytes.len() || bytes[i + 1] == b'.') =>
            {
                out.push_str(r"[\w$]+")
            }
            '*' => out.push_str(r"[\w$]*"),
            '.' if allow_segments => out.push_str(r"\."),
            '$' => out.push_str(r"\$"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            c if !c.is_ascii() => {
                // Multi-byte identifier characters are copied verbatim.
                let rest = &pattern[i..];
                let ch = rest.chars().next().unwrap_or(c);
                out.push_str(&regex::escape(&ch.to_string()));
                i += ch.len_utf8();
                continue;
            }
            other => {
                return Err(PatternError::invalid(
                    pattern,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
        i += 1;
    }
    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_wildcard_stays_within_segment() {
        let p = NamePattern::class("foo.bar.*").unwrap();
        assert!(p.matches("foo.bar.SomeClass"));
        assert!(!p.matches("foo.barbaz.SomeClass"));
        assert!(!p.matches("foo.bar.sub.SomeClass"));
        assert!(!p.matches("foo.bar."));
        assert!(!NamePattern::class("foo.*.Dao").unwrap().matches("foo..Dao"));
        assert!(NamePattern::class("foo.*.Dao").unwrap().matches("foo.x.Dao"));
    }

    #[test]
    fn trailing_multi_wildcard_requires_a_segment() {
        let p = NamePattern::class("foo..").unwrap();
        assert!(p.matches("foo.a.b.SomeClass"));
        assert!(p.matches("foo.X"));
        assert!(!p.matches("foo"));
        assert!(!p.matches("foobar.X"));
    }

    #[test]
    fn inner_multi_wildcard_spans_zero_or_more_segments() {
        let p = NamePattern::class("foo..Bar").unwrap();
        assert!(p.matches("foo.Bar"));
        assert!(p.matches("foo.x.y.Bar"));
        assert!(!p.matches("foo.x.Baz"));

        let leading = NamePattern::class("..Service").unwrap();
        assert!(leading.matches("Service"));
        assert!(leading.matches("a.b.Service"));
        assert!(!leading.matches("a.b.MyService"));
    }

    #[test]
    fn prefix_and_suffix_wildcards() {
        let p = NamePattern::class("com.acme.*Service").unwrap();
        assert!(p.matches("com.acme.OrderService"));
        assert!(!p.matches("com.acme.OrderServiceImpl"));
        assert!(NamePattern::identifier("get*").unwrap().matches("getName"));
        assert!(NamePattern::identifier("get*").unwrap().matches("get"));
        assert!(NamePattern::class("*").unwrap().matches("any.thing.At.All"));
    }

    #[test]
    fn malformed_patterns_fail_at_compile_time() {
        assert!(matches!(NamePattern::class(""), Err(PatternError::Empty)));
        assert!(NamePattern::class("foo...Bar").is_err());
        assert!(NamePattern::class("foo(bar").is_err());
        assert!(NamePattern::identifier("a..b").is_err());
    }
}
