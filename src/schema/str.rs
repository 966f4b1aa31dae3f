use regex::Regex;
use serde_json::Value;

use crate::error::{DefinitionError, ErrorKind, ValidationError};

#[derive(Clone, Debug, Default)]
pub struct StrRules {
    pub pattern: Option<Pattern>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

/// A regular expression that must match the whole value.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, DefinitionError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            DefinitionError::InvalidPattern { pattern: source.to_string(), source: e }
        })?;
        Ok(Pattern { source: source.to_string(), regex })
    }

    pub fn source(&self) -> &str { &self.source }

    pub fn is_full_match(&self, s: &str) -> bool { self.regex.is_match(s) }
}

/// Numbers and booleans are accepted and stringified.
pub(crate) fn coerce(raw: &Value) -> Result<String, ValidationError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ValidationError::invalid("Not a valid string.")),
    }
}

impl StrRules {
    /// Collects every violated rule, pattern before length.
    pub(crate) fn check(&self, s: &str, err: &mut ValidationError) {
        if let Some(p) = &self.pattern {
            if !p.is_full_match(s) {
                err.push_msg(ErrorKind::Pattern, format!("'{s}' does not match pattern {}.", p.source()));
            }
        }
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                err.push_msg(ErrorKind::MinLength, format!("The length must be greater than or equal to {min}."));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                err.push_msg(ErrorKind::MaxLength, format!("The length must be less than or equal to {max}."));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(err: &ValidationError) -> Vec<String> {
        err.messages().map(|m| m.text.clone()).collect()
    }

    #[test]
    fn pattern_is_full_match() {
        let p = Pattern::new(r"\d+").unwrap();
        assert!(p.is_full_match("123"));
        assert!(!p.is_full_match("a123"));
        assert!(!p.is_full_match("123a"));
    }

    #[test]
    fn all_violations_are_collected_in_order() {
        let rules = StrRules {
            pattern: Some(Pattern::new(r"^\d+$").unwrap()),
            min_length: Some(5),
            max_length: None,
        };
        let mut err = ValidationError::new();
        rules.check("a123", &mut err);
        assert_eq!(
            messages(&err),
            vec![
                r"'a123' does not match pattern ^\d+$.".to_string(),
                "The length must be greater than or equal to 5.".to_string(),
            ]
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let rules = StrRules { max_length: Some(3), ..StrRules::default() };
        let mut err = ValidationError::new();
        rules.check("äöü", &mut err);
        assert!(err.is_empty());
    }

    #[test]
    fn scalars_are_stringified() {
        assert_eq!(coerce(&serde_json::json!(12)).unwrap(), "12");
        assert_eq!(coerce(&serde_json::json!(true)).unwrap(), "true");
        assert!(coerce(&serde_json::json!([1])).is_err());
    }
}
