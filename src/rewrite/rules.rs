//! Compiled rewrite rules.
//!
//! # Responsibilities
//! - Compile `(regex, replacement)` pairs once, at construction
//! - Apply rules in configured order, each to the output of the previous one
//! - Record every substitution for the observer
//!
//! # Design Decisions
//! - Order is preserved exactly; duplicates are legal and applied twice
//! - A rule that matches replaces all non-overlapping matches
//! - Never mutated after construction, shared via `Arc` across requests

use regex::Regex;

use crate::config::RedirectConfig;
use crate::rewrite::error::ConfigurationError;

/// One compiled `(pattern, replacement)` pair.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Compile a rule. The replacement supports `$1` / `${name}` references.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Replace every match in `input`, or `None` when the pattern does not match.
    pub fn rewrite(&self, input: &str) -> Option<String> {
        if !self.pattern.is_match(input) {
            return None;
        }
        Some(
            self.pattern
                .replace_all(input, self.replacement.as_str())
                .into_owned(),
        )
    }
}

/// A single applied substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Position of the rule in the configured list.
    pub rule: usize,
    pub before: String,
    pub after: String,
}

/// Result of running a location through the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub location: String,
    pub substitutions: Vec<Substitution>,
}

impl RewriteOutcome {
    /// True when the final value differs from `original`.
    pub fn changed(&self, original: &str) -> bool {
        self.location != original
    }
}

/// The default-handling flag plus the ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    default_handling: bool,
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    pub fn new(default_handling: bool, rules: Vec<RewriteRule>) -> Self {
        Self {
            default_handling,
            rules,
        }
    }

    /// Compile every configured rewrite, failing on the first bad pattern.
    pub fn from_config(config: &RedirectConfig) -> Result<Self, ConfigurationError> {
        let rules = config
            .rewrites
            .iter()
            .enumerate()
            .map(|(index, rewrite)| {
                RewriteRule::new(&rewrite.regex, rewrite.replacement.clone()).map_err(|source| {
                    ConfigurationError::InvalidPattern {
                        index,
                        pattern: rewrite.regex.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(config.default, rules))
    }

    pub fn default_handling(&self) -> bool {
        self.default_handling
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Run `location` through every rule in order.
    ///
    /// Each rule sees the cumulative result of the rules before it.
    pub fn apply(&self, location: &str) -> RewriteOutcome {
        let mut current = location.to_string();
        let mut substitutions = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(rewritten) = rule.rewrite(&current) {
                let before = std::mem::replace(&mut current, rewritten);
                substitutions.push(Substitution {
                    rule: index,
                    before,
                    after: current.clone(),
                });
            }
        }

        RewriteOutcome {
            location: current,
            substitutions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;

    fn rule_set(rules: &[(&str, &str)]) -> RuleSet {
        RuleSet::new(
            false,
            rules
                .iter()
                .map(|(p, r)| RewriteRule::new(p, *r).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_empty_rule_set_is_identity() {
        let rules = RuleSet::default();
        for location in ["", "somevalue", "http://host:815/path", "/a?b=c#d"] {
            let outcome = rules.apply(location);
            assert_eq!(outcome.location, location);
            assert!(outcome.substitutions.is_empty());
            assert!(!outcome.changed(location));
        }
    }

    #[test]
    fn test_no_match_leaves_location_untouched() {
        let rules = rule_set(&[("^https://nowhere/", "http://x/")]);
        let outcome = rules.apply("http://old.example/foo");
        assert_eq!(outcome.location, "http://old.example/foo");
        assert!(outcome.substitutions.is_empty());
    }

    #[test]
    fn test_backreferences_are_expanded() {
        let rules = rule_set(&[(r"^http://old\.example/(.*)$", "http://new.example/$1")]);
        let outcome = rules.apply("http://old.example/foo?x=1");
        assert_eq!(outcome.location, "http://new.example/foo?x=1");
        assert_eq!(
            outcome.substitutions,
            vec![Substitution {
                rule: 0,
                before: "http://old.example/foo?x=1".into(),
                after: "http://new.example/foo?x=1".into(),
            }]
        );
    }

    #[test]
    fn test_all_matches_are_replaced() {
        let rules = rule_set(&[("a", "b")]);
        assert_eq!(rules.apply("banana").location, "bbnbnb");
    }

    #[test]
    fn test_rules_chain_in_order() {
        let a = (r"^http://a/(.*)$", "http://b/$1");
        let b = (r"^http://b/(.*)$", "http://c/$1");

        let forward = rule_set(&[a, b]).apply("http://a/x");
        assert_eq!(forward.location, "http://c/x");
        assert_eq!(forward.substitutions.len(), 2);

        // B never matches the original input, so running it first does nothing.
        let reverse = rule_set(&[b, a]).apply("http://a/x");
        assert_eq!(reverse.location, "http://b/x");
        assert_eq!(reverse.substitutions.len(), 1);
        assert_eq!(reverse.substitutions[0].rule, 1);
    }

    #[test]
    fn test_duplicate_rules_apply_twice() {
        let rules = rule_set(&[("x", "xx"), ("x", "xx")]);
        let outcome = rules.apply("x");
        assert_eq!(outcome.location, "xxxx");
        assert_eq!(outcome.substitutions.len(), 2);
    }

    #[test]
    fn test_from_config_rejects_bad_pattern() {
        let config = RedirectConfig {
            rewrites: vec![
                RewriteConfig::new("^ok$", "fine"),
                RewriteConfig::new("(unclosed", "x"),
            ],
            ..Default::default()
        };

        match RuleSet::from_config(&config) {
            Err(ConfigurationError::InvalidPattern { index, pattern, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected invalid pattern, got {other:?}"),
        }
    }

    #[test]
    fn test_from_config_keeps_flag_and_order() {
        let config = RedirectConfig {
            default: true,
            rewrites: vec![
                RewriteConfig::new("one", "1"),
                RewriteConfig::new("two", "2"),
            ],
            ..Default::default()
        };

        let rules = RuleSet::from_config(&config).unwrap();
        assert!(rules.default_handling());
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].pattern().as_str(), "one");
        assert_eq!(rules.rules()[1].replacement(), "2");
    }
}
